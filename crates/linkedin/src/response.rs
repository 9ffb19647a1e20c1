//! Normalized business result of one API call.
//!
//! Non-success responses are not errors at this layer: they are wrapped with
//! their status, an `ok` flag and a diagnostic message, and callers branch on
//! `ok`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ApiResponse;
use crate::error::{LinkedinError, Result};
use crate::retry::HasStatus;
use crate::utils::truncate_text;

/// Non-JSON bodies are cut to this many bytes.
pub const MAX_TEXT_DATA_LEN: usize = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult<T = Value> {
    pub message: String,
    pub status: u16,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// `200..400` counts as ok.
pub fn is_ok_status(status: u16) -> bool {
    (200..400).contains(&status)
}

/// "Successfully called X for ID y" / "Failed to call X".
pub fn result_message(api_name: &str, user_id: Option<&str>, ok: bool) -> String {
    let mut message = if ok {
        format!("Successfully called {api_name}")
    } else {
        format!("Failed to call {api_name}")
    };
    if let Some(id) = user_id.filter(|id| !id.is_empty()) {
        message.push_str(" for ID ");
        message.push_str(id);
    }
    message
}

impl<T> ApiResult<T> {
    pub fn new(api_name: &str, user_id: Option<&str>, status: u16, data: Option<T>) -> Self {
        let ok = is_ok_status(status);
        Self {
            message: result_message(api_name, user_id, ok),
            status,
            ok,
            data,
            error: None,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_error(mut self, error: Value) -> Self {
        self.error = Some(error);
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        ApiResult {
            message: self.message,
            status: self.status,
            ok: self.ok,
            data: self.data.map(f),
            error: self.error,
            notes: self.notes,
        }
    }

    /// The payload of a successful result.
    ///
    /// A failed result, or one without data, becomes
    /// [`LinkedinError::NotFound`] carrying the message.
    pub fn into_result(self) -> Result<T> {
        match (self.ok, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(LinkedinError::NotFound(self.message)),
        }
    }
}

impl ApiResult<Value> {
    /// Wrap a raw response: JSON bodies are parsed, anything else is kept as
    /// (truncated) text.
    pub fn from_response(api_name: &str, user_id: Option<&str>, response: &ApiResponse) -> Self {
        let data = response
            .json_value()
            .unwrap_or_else(|_| Value::String(truncate_text(&response.body, MAX_TEXT_DATA_LEN)));
        Self::new(api_name, user_id, response.status, Some(data))
    }
}

impl<T> HasStatus for ApiResult<T> {
    fn status(&self) -> u16 {
        self.status
    }
}
