use std::error::Error as StdError;

use thiserror::Error;

/// Errors from retrieving a parameter.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("parameter not found: {key}")]
    NotFound { key: String },

    #[error("failed to retrieve {key}: {message}")]
    Provider {
        key: String,
        message: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{operation} is not supported by this store")]
    Unsupported { operation: &'static str },

    #[error("no provider registered as {name}")]
    UnknownProvider { name: String },

    #[error("no parameter bound to field {field}")]
    UnknownField { field: String },

    #[error("failed to transform {key}: {source}")]
    Transform {
        key: String,
        #[source]
        source: TransformError,
    },

    #[error("failed to deserialize {key}: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ParameterError {
    pub fn provider<E>(key: &str, message: String, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ParameterError::Provider {
            key: key.to_owned(),
            message,
            source: Box::new(source),
        }
    }

    pub fn not_found(key: &str) -> Self {
        ParameterError::NotFound { key: key.to_owned() }
    }
}

/// Errors from decoding a raw parameter value.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded value is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
