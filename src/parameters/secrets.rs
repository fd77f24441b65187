use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;

use super::{FetchOptions, ParamStore, ParameterError};

/// AWS Secrets Manager.
///
/// `decrypt` has no effect here, secrets always come back decrypted.
#[derive(Clone, Debug)]
pub struct SecretsStore {
    client: Client,
}

impl SecretsStore {
    pub fn new(client: Client) -> Self {
        SecretsStore { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl ParamStore for SecretsStore {
    async fn get_value(&self, key: &str, options: &FetchOptions) -> Result<String, ParameterError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(key)
            .set_version_stage(options.version_stage.clone())
            .set_version_id(options.version_id.clone())
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().map_or(false, |err| err.is_resource_not_found_exception()) {
                    ParameterError::not_found(key)
                } else {
                    ParameterError::provider(key, DisplayErrorContext(&err).to_string(), err)
                }
            })?;

        if let Some(secret) = output.secret_string() {
            return Ok(secret.to_owned());
        }
        match output.secret_binary() {
            Some(blob) => String::from_utf8(blob.as_ref().to_vec())
                .map_err(|err| ParameterError::provider(key, "secret binary is not UTF-8".into(), err)),
            None => Err(ParameterError::not_found(key)),
        }
    }
}
