//! Error types shared by every layer of the SDK.
//!
//! Errors are split by where they can surface:
//! - [`ConfigError`] and [`ValidationError`] are returned as `Err` before any
//!   network activity happens.
//! - [`TransportError`] never escapes the executor; it is folded into the
//!   `error` field of an [`Envelope`](crate::executor::Envelope).
//! - [`DecodeError`] only appears as an item of an event stream.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Invalid or unusable client configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("API key must be in format {{api_id}}.{{api_secret}}")]
    InvalidApiKey,

    #[error("Algorithm: {0} not supported")]
    UnsupportedAlgorithm(String),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// A request failed on its way to or from the remote API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network failure or a non-2xx response.
    #[error("{message}")]
    Http {
        status: Option<StatusCode>,
        code: Option<i64>,
        message: String,
    },

    #[error("Request timed out")]
    Timeout,

    #[error("{0}")]
    Unknown(String),
}

impl TransportError {
    /// Build a transport error from a non-2xx response body.
    ///
    /// Bodies shaped like `{"error": {"code": "1211", "message": "..."}}` keep the
    /// remote message and numeric business code; anything else falls back to
    /// the HTTP status.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<RemoteErrorBody>(body) {
            Ok(RemoteErrorBody {
                error: Some(detail),
            }) => Self::Http {
                status: Some(status),
                code: detail
                    .code
                    .as_deref()
                    .and_then(|c| c.trim().parse().ok())
                    .or(Some(i64::from(status.as_u16()))),
                message: detail
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            },
            _ => Self::Http {
                status: Some(status),
                code: Some(i64::from(status.as_u16())),
                message: format!("HTTP {}: {}", status, body),
            },
        }
    }

    /// Remote HTTP status, if the failure carried one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Timeout | Self::Unknown(_) => None,
        }
    }

    /// Numeric error code reported to callers.
    ///
    /// Timeouts and unknown failures carry only a synthetic marker (see
    /// [`TransportError::marker`]) and therefore no numeric code.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Http { code, .. } => *code,
            Self::Timeout | Self::Unknown(_) => None,
        }
    }

    /// Diagnostic marker distinguishing the failure cause.
    pub fn marker(&self) -> String {
        match self {
            Self::Http {
                status: Some(status),
                ..
            } => status.as_u16().to_string(),
            Self::Http { status: None, .. } => "HttpError".to_string(),
            Self::Timeout => "Timeout".to_string(),
            Self::Unknown(_) => "UnknownError".to_string(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_status() || err.is_connect() || err.is_request() || err.is_body() {
            Self::Http {
                status: err.status(),
                code: err.status().map(|s| i64::from(s.as_u16())),
                message: err.to_string(),
            }
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: Option<RemoteErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct RemoteErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// A single stream event whose payload could not be decoded.
#[derive(Error, Debug)]
#[error("Failed to decode stream event: {source} | payload: {payload}")]
pub struct DecodeError {
    pub payload: String,
    #[source]
    pub source: serde_json::Error,
}

/// A request is missing a field the endpoint requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl ValidationError {
    pub fn required(field: &'static str) -> Self {
        Self {
            field,
            reason: "cannot be null or empty",
        }
    }
}

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<ClientError> for TransportError {
    /// Collapse any failure of a remote call into one of the three transport causes.
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport(t) => t,
            ClientError::Http(e) => e.into(),
            other => TransportError::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_parses_business_error() {
        let body = r#"{"error":{"code":"1211","message":"Model not found"}}"#;
        let err = TransportError::from_response(StatusCode::BAD_REQUEST, body);

        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.code(), Some(1211));
        assert_eq!(err.to_string(), "Model not found");
    }

    #[test]
    fn test_from_response_falls_back_to_status() {
        let err = TransportError::from_response(StatusCode::NOT_FOUND, "no such route");

        assert_eq!(err.code(), Some(404));
        assert_eq!(err.marker(), "404");
        assert!(err.to_string().contains("no such route"));
    }

    #[test]
    fn test_non_numeric_business_code_uses_status() {
        let body = r#"{"error":{"code":"quota","message":"Too many requests"}}"#;
        let err = TransportError::from_response(StatusCode::TOO_MANY_REQUESTS, body);

        assert_eq!(err.code(), Some(429));
        assert_eq!(err.to_string(), "Too many requests");
    }

    #[test]
    fn test_synthetic_markers() {
        assert_eq!(TransportError::Timeout.marker(), "Timeout");
        assert_eq!(TransportError::Timeout.code(), None);
        assert_eq!(TransportError::Unknown("boom".into()).marker(), "UnknownError");
        assert_eq!(TransportError::Unknown("boom".into()).status(), None);
    }

    #[test]
    fn test_client_error_collapses_to_unknown() {
        let err: TransportError = ClientError::Validation(ValidationError::required("model")).into();
        assert!(matches!(err, TransportError::Unknown(ref m) if m.contains("model")));

        let err: TransportError = ClientError::Transport(TransportError::Timeout).into();
        assert_eq!(err, TransportError::Timeout);
    }
}
