//! Uniform HTTP response envelope returned by the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CorrelationError;

/// `{time, message[], url, data, status_code}`, the body of every gateway
/// response, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub time: DateTime<Utc>,
    pub message: Vec<String>,
    pub url: String,
    pub data: Value,
    pub status_code: u16,
}

impl ApiResponse {
    /// A successful response wrapping the handler's result.
    #[must_use]
    pub fn ok(url: impl Into<String>, status_code: u16, data: Value) -> Self {
        Self {
            time: Utc::now(),
            message: vec!["success".to_string()],
            url: url.into(),
            data,
            status_code,
        }
    }

    /// A failure response with one or more messages and no data.
    #[must_use]
    pub fn failure(url: impl Into<String>, status_code: u16, message: Vec<String>) -> Self {
        Self {
            time: Utc::now(),
            message,
            url: url.into(),
            data: Value::Null,
            status_code,
        }
    }

    /// Maps a correlation failure through the status table.
    #[must_use]
    pub fn from_error(url: impl Into<String>, err: &CorrelationError) -> Self {
        let message = match err {
            CorrelationError::Handler { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self::failure(url, err.status_code(), vec![message])
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
