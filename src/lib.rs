//! Helpers for AWS Lambda functions.
//!
//! - [`cloudformation`]: implement a custom resource and have its outcome
//!   signaled back to CloudFormation.
//! - [`parameters`]: read SSM parameters and Secrets Manager secrets through a
//!   short-lived cache.

#[macro_use]
extern crate log;

pub use lambda_runtime::{Context, LambdaEvent};

pub type Error = Box<dyn std::error::Error + Send + Sync>;

mod map;
pub mod cloudformation;
pub mod config;
pub mod parameters;

pub use map::Map;

/// Initializes `env_logger` from `RUST_LOG`. Does nothing if a logger is
/// already installed.
#[cfg(feature = "env_logger")]
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env().try_init();
}
