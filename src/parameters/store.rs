use std::collections::HashMap;

use async_trait::async_trait;

use super::ParameterError;

/// Options passed through to the backing store.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchOptions {
    pub decrypt: bool,
    pub recursive: bool,
    pub version_stage: Option<String>,
    pub version_id: Option<String>,
}

/// A source of raw parameter values.
///
/// Implement this to plug a custom backend into a
/// [`ParamProvider`](super::ParamProvider).
#[async_trait]
pub trait ParamStore: Send + Sync {
    async fn get_value(&self, key: &str, options: &FetchOptions) -> Result<String, ParameterError>;

    async fn get_values(&self, keys: &[String], options: &FetchOptions) -> Result<HashMap<String, String>, ParameterError> {
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            values.insert(key.clone(), self.get_value(key, options).await?);
        }
        Ok(values)
    }

    /// All values under `path`, keyed relative to it.
    async fn get_multiple_values(&self, _path: &str, _options: &FetchOptions) -> Result<HashMap<String, String>, ParameterError> {
        Err(ParameterError::Unsupported {
            operation: "get_multiple_values",
        })
    }
}

/// Strips `path` and the separator following it from a parameter name.
pub(crate) fn relative_name<'a>(path: &str, name: &'a str) -> &'a str {
    let path = path.trim_end_matches('/');
    name.strip_prefix(path)
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or(name)
}
