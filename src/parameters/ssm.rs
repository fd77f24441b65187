use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::Client;

use super::store::relative_name;
use super::{FetchOptions, ParamStore, ParameterError};

// GetParameters accepts at most this many names per call
const MAX_NAMES_PER_CALL: usize = 10;

/// AWS Systems Manager Parameter Store.
#[derive(Clone, Debug)]
pub struct SsmStore {
    client: Client,
}

impl SsmStore {
    pub fn new(client: Client) -> Self {
        SsmStore { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl ParamStore for SsmStore {
    async fn get_value(&self, key: &str, options: &FetchOptions) -> Result<String, ParameterError> {
        let output = self
            .client
            .get_parameter()
            .name(key)
            .with_decryption(options.decrypt)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().map_or(false, |err| err.is_parameter_not_found()) {
                    ParameterError::not_found(key)
                } else {
                    ParameterError::provider(key, DisplayErrorContext(&err).to_string(), err)
                }
            })?;

        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_owned)
            .ok_or_else(|| ParameterError::not_found(key))
    }

    async fn get_values(&self, keys: &[String], options: &FetchOptions) -> Result<HashMap<String, String>, ParameterError> {
        let mut values = HashMap::with_capacity(keys.len());
        for names in keys.chunks(MAX_NAMES_PER_CALL) {
            let output = self
                .client
                .get_parameters()
                .set_names(Some(names.to_vec()))
                .with_decryption(options.decrypt)
                .send()
                .await
                .map_err(|err| ParameterError::provider(&names.join(","), DisplayErrorContext(&err).to_string(), err))?;

            if let Some(invalid) = output.invalid_parameters().first() {
                return Err(ParameterError::not_found(invalid));
            }
            for parameter in output.parameters() {
                if let (Some(name), Some(value)) = (parameter.name(), parameter.value()) {
                    values.insert(name.to_owned(), value.to_owned());
                }
            }
        }
        Ok(values)
    }

    async fn get_multiple_values(&self, path: &str, options: &FetchOptions) -> Result<HashMap<String, String>, ParameterError> {
        let mut pages = self
            .client
            .get_parameters_by_path()
            .path(path)
            .recursive(options.recursive)
            .with_decryption(options.decrypt)
            .into_paginator()
            .send();

        let mut values = HashMap::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| ParameterError::provider(path, DisplayErrorContext(&err).to_string(), err))?;
            for parameter in page.parameters() {
                if let (Some(name), Some(value)) = (parameter.name(), parameter.value()) {
                    values.insert(relative_name(path, name).to_owned(), value.to_owned());
                }
            }
        }
        Ok(values)
    }
}
