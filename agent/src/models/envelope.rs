//! Vendor response envelope

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::EnvelopeError;

/// Every vendor response wraps its payload as `{success, result, msg, code}`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub result: Option<serde_json::Value>,

    #[serde(default)]
    pub msg: Option<String>,

    #[serde(default)]
    pub code: Option<i64>,
}

impl Envelope {
    /// Parse a raw response body
    pub fn parse(body: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Unwrap the payload, turning vendor-side rejections into errors
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, EnvelopeError> {
        if !self.success {
            return Err(EnvelopeError::Rejected {
                code: self.code,
                msg: self.msg.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        match self.result {
            None | Some(serde_json::Value::Null) => Err(EnvelopeError::MissingResult),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }
}
