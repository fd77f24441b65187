use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use super::TransformError;

/// Decodes a raw parameter value after it is fetched.
pub trait Transformer: fmt::Debug + Send + Sync {
    fn transform(&self, value: &str) -> Result<Value, TransformError>;
}

/// Parses the value as JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonTransformer;

impl Transformer for JsonTransformer {
    fn transform(&self, value: &str) -> Result<Value, TransformError> {
        Ok(serde_json::from_str(value)?)
    }
}

/// Decodes standard base64 into a UTF-8 string.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64Transformer;

impl Transformer for Base64Transformer {
    fn transform(&self, value: &str) -> Result<Value, TransformError> {
        let bytes = STANDARD.decode(value.trim())?;
        Ok(Value::String(String::from_utf8(bytes)?))
    }
}
