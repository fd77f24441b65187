//! Parameters from SSM Parameter Store, Secrets Manager or a custom store.
//!
//! A [`ParamStore`] fetches raw values; a [`ParamProvider`] wraps one with a
//! cache and optional [`Transformer`]s. [`ParamBindings`] wires parameters to
//! named fields once, when a handler is built.

mod bindings;
mod cache;
mod error;
mod provider;
mod secrets;
mod ssm;
mod store;
mod transform;

pub use self::bindings::{Param, ParamBindings, ParamProviders, ProviderKind, ResolvedParams};
pub use self::error::{ParameterError, TransformError};
pub use self::provider::{GetOptions, ParamProvider, DEFAULT_MAX_AGE};
pub use self::secrets::SecretsStore;
pub use self::ssm::SsmStore;
pub use self::store::{FetchOptions, ParamStore};
pub use self::transform::{Base64Transformer, JsonTransformer, Transformer};
