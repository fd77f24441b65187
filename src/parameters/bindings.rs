use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{GetOptions, ParamProvider, ParameterError, SecretsStore, SsmStore, Transformer};
use crate::config::ParamsConfig;

/// Which registered provider a [`Param`] is read from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    #[default]
    Ssm,
    SecretsManager,
    Custom(String),
}

/// One parameter bound to a field.
#[derive(Clone, Debug)]
pub struct Param {
    pub key: String,
    pub provider: ProviderKind,
    pub options: GetOptions,
}

impl Param {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Param {
            key: key.into(),
            provider: ProviderKind::Ssm,
            options: GetOptions::new(),
        }
    }

    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    pub fn transformer<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.options = self.options.transformer(transformer);
        self
    }

    pub fn options(mut self, options: GetOptions) -> Self {
        self.options = options;
        self
    }
}

/// The providers bindings can be resolved against.
#[derive(Clone, Debug, Default)]
pub struct ParamProviders {
    ssm: Option<ParamProvider>,
    secrets: Option<ParamProvider>,
    custom: HashMap<String, ParamProvider>,
}

impl ParamProviders {
    pub fn new() -> Self {
        Default::default()
    }

    /// SSM and Secrets Manager providers using the default AWS configuration.
    pub async fn from_env(config: &ParamsConfig) -> Self {
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        ParamProviders::new()
            .with_ssm(
                ParamProvider::new(SsmStore::new(aws_sdk_ssm::Client::new(&aws)))
                    .with_max_age(config.max_age)
                    .with_decryption(config.ssm_decrypt),
            )
            .with_secrets(
                ParamProvider::new(SecretsStore::new(aws_sdk_secretsmanager::Client::new(&aws)))
                    .with_max_age(config.max_age),
            )
    }

    pub fn with_ssm(mut self, provider: ParamProvider) -> Self {
        self.ssm = Some(provider);
        self
    }

    pub fn with_secrets(mut self, provider: ParamProvider) -> Self {
        self.secrets = Some(provider);
        self
    }

    pub fn with_custom<S: Into<String>>(mut self, name: S, provider: ParamProvider) -> Self {
        self.custom.insert(name.into(), provider);
        self
    }

    pub fn get(&self, kind: &ProviderKind) -> Result<&ParamProvider, ParameterError> {
        let provider = match *kind {
            ProviderKind::Ssm => self.ssm.as_ref(),
            ProviderKind::SecretsManager => self.secrets.as_ref(),
            ProviderKind::Custom(ref name) => self.custom.get(name),
        };
        provider.ok_or_else(|| ParameterError::UnknownProvider {
            name: match *kind {
                ProviderKind::Ssm => "ssm".into(),
                ProviderKind::SecretsManager => "secretsmanager".into(),
                ProviderKind::Custom(ref name) => name.clone(),
            },
        })
    }
}

/// Field name to parameter wiring, resolved once when a handler is built.
///
/// ```no_run
/// # async fn example() -> Result<(), lambda_toolkit::parameters::ParameterError> {
/// use lambda_toolkit::config::ParamsConfig;
/// use lambda_toolkit::parameters::{JsonTransformer, Param, ParamBindings, ParamProviders, ProviderKind};
///
/// let providers = ParamProviders::from_env(&ParamsConfig::default()).await;
/// let params = ParamBindings::new()
///     .bind("table", Param::new("/orders/table"))
///     .bind(
///         "database",
///         Param::new("orders/db").provider(ProviderKind::SecretsManager).transformer(JsonTransformer),
///     )
///     .resolve(&providers)
///     .await?;
/// let table = params.get_str("table")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ParamBindings {
    bindings: Vec<(String, Param)>,
}

impl ParamBindings {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn bind<S: Into<String>>(mut self, field: S, param: Param) -> Self {
        self.bindings.push((field.into(), param));
        self
    }

    /// Fetches every bound parameter. Fails on the first error.
    pub async fn resolve(&self, providers: &ParamProviders) -> Result<ResolvedParams, ParameterError> {
        let mut values = HashMap::with_capacity(self.bindings.len());
        for (field, param) in &self.bindings {
            let provider = providers.get(&param.provider)?;
            let value = provider.get_value(&param.key, &param.options).await?;
            values.insert(field.clone(), Resolved { key: param.key.clone(), value });
        }
        Ok(ResolvedParams { values: Arc::new(values) })
    }
}

#[derive(Debug)]
struct Resolved {
    key: String,
    value: Value,
}

/// Values produced by [`ParamBindings::resolve`].
#[derive(Clone, Debug)]
pub struct ResolvedParams {
    values: Arc<HashMap<String, Resolved>>,
}

impl ResolvedParams {
    pub fn get_str(&self, field: &str) -> Result<&str, ParameterError> {
        let resolved = self.resolved(field)?;
        resolved.value.as_str().ok_or_else(|| ParameterError::Deserialize {
            key: resolved.key.clone(),
            source: <serde_json::Error as serde::de::Error>::custom("value is not a string"),
        })
    }

    pub fn get<T: DeserializeOwned>(&self, field: &str) -> Result<T, ParameterError> {
        let resolved = self.resolved(field)?;
        serde_json::from_value(resolved.value.clone()).map_err(|source| ParameterError::Deserialize {
            key: resolved.key.clone(),
            source,
        })
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field).map(|resolved| &resolved.value)
    }

    fn resolved(&self, field: &str) -> Result<&Resolved, ParameterError> {
        self.values.get(field).ok_or_else(|| ParameterError::UnknownField { field: field.to_owned() })
    }
}
