//! Error types for the Moy Nalog client.
//!
//! # Design
//! Every public operation returns exactly one `NalogError` describing the
//! first cause. `Api` is the only variant produced from an HTTP response; the
//! rest are raised locally before or around the transport call. Validation
//! errors always fire before any request is sent.

use std::fmt;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NalogError>;

/// Errors returned by `NalogClient` and its services.
#[derive(Debug, Error)]
pub enum NalogError {
    /// The client configuration is unusable, e.g. a base URL without a
    /// trailing slash.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No cancellation context was supplied to the dispatcher.
    #[error("context must be non-nil")]
    Context,

    /// The caller's context was cancelled or its deadline passed.
    #[error("request cancelled: {0}")]
    Cancelled(CancelReason),

    /// Network level failure (DNS, connect, TLS, timeout) with a sanitized URL.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-2xx status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A business rule was violated before the request was built.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An operation needed an access token and none was available.
    #[error("access token cannot be null")]
    TokenEmpty,

    /// The refresh token itself has expired; a new login is required.
    #[error("refresh token is expired")]
    RefreshExpired,

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a context stopped a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("context canceled"),
            CancelReason::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Structured error returned by the API for any non-2xx response.
///
/// `code`, `message` and `additional_info` come from the response body when
/// it is a JSON error object. When it is not, the whole body becomes
/// `message`. `method`, `url` and `status` describe the failed request.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{method} {url}: {status} {code} {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub additional_info: Option<serde_json::Value>,
    pub method: String,
    pub url: String,
    pub status: u16,
}

impl ApiError {
    /// Build an `ApiError` from a failed response body.
    ///
    /// Tries the `{code, message, additionalInfo}` shape first, then a bare
    /// JSON string, then the raw text.
    pub fn from_body(method: &str, url: &str, status: u16, body: &[u8]) -> Self {
        let (code, message, additional_info) = match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => (parsed.code, parsed.message, parsed.additional_info),
            Err(_) => {
                tracing::debug!(status, "error body is not a JSON error object, using it as message");
                let message = serde_json::from_slice::<String>(body)
                    .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());
                (String::new(), message, None)
            }
        };
        Self {
            code,
            message,
            additional_info,
            method: method.to_string(),
            url: url.to_string(),
            status,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default, deserialize_with = "string_or_number")]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "additionalInfo")]
    additional_info: Option<serde_json::Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A business rule violation found while assembling a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `services.amount`.
    pub field: &'static str,
    /// Position of the offending line item, if the rule is per item.
    pub index: Option<usize>,
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            index: None,
            message: message.into(),
        }
    }

    pub(crate) fn at(field: &'static str, index: usize, message: impl Into<String>) -> Self {
        Self {
            field,
            index: Some(index),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_error_body_is_decoded() {
        let err = ApiError::from_body(
            "POST",
            "https://lknpd.nalog.ru/api/v1/income",
            404,
            br#"{"code":"income.not.found","message":"not found"}"#,
        );
        assert_eq!(err.code, "income.not.found");
        assert_eq!(err.message, "not found");
        assert_eq!(err.status, 404);
        assert_eq!(err.method, "POST");
        assert!(err.additional_info.is_none());
    }

    #[test]
    fn plain_text_body_becomes_message() {
        let err = ApiError::from_body("GET", "https://x.test/user", 500, b"plain text");
        assert_eq!(err.message, "plain text");
        assert!(err.code.is_empty());
        assert_eq!(err.status, 500);
    }

    #[test]
    fn json_string_body_becomes_message() {
        let err = ApiError::from_body("GET", "https://x.test/user", 500, br#""plain text""#);
        assert_eq!(err.message, "plain text");
    }

    #[test]
    fn numeric_code_and_details_are_kept() {
        let err = ApiError::from_body(
            "POST",
            "https://x.test/auth/lkfl",
            401,
            r#"{"code":401,"message":"Неверный пароль","additionalInfo":{"attempts":2}}"#.as_bytes(),
        );
        assert_eq!(err.code, "401");
        assert_eq!(err.message, "Неверный пароль");
        assert_eq!(err.additional_info.unwrap()["attempts"], 2);
    }

    #[test]
    fn api_error_display_includes_request() {
        let err = ApiError::from_body("GET", "https://x.test/user", 403, br#"{"code":"forbidden","message":"no"}"#);
        let text = NalogError::from(err).to_string();
        assert_eq!(text, "GET https://x.test/user: 403 forbidden no");
    }
}
