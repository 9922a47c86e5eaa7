use serde::{ser::Serializer, Serialize};
use thiserror::Error;

use crate::event::Reply;
use crate::facade::ApiResponse;

/// A specialized `Result` type for the WrangleBot client crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for the WrangleBot client crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered a REST call with anything other than 200.
    #[error("HTTP error: status {}", .0.status)]
    Http(Box<ApiResponse>),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Username is required")]
    MissingUsername,

    #[error("No token provided and none found in the credential store")]
    NoCredential,

    #[error("Connection timed out after {0}ms")]
    Timeout(u64),

    /// The server answered the `auth` handshake with a non-success status.
    #[error("Handshake rejected with status {}", .0.status)]
    Handshake(Reply),

    #[error("Not connected")]
    NotConnected,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Client closed")]
    Closed,
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_display_timeout() {
        assert_eq!(Error::Timeout(60000).to_string(), "Connection timed out after 60000ms");
    }

    #[test]
    fn test_error_display_no_credential() {
        assert_eq!(
            Error::NoCredential.to_string(),
            "No token provided and none found in the credential store"
        );
    }

    #[test]
    fn test_error_display_http_carries_status() {
        let err = Error::Http(Box::new(ApiResponse {
            status: 404,
            body: json!({"error": "not found"}),
        }));
        assert_eq!(err.to_string(), "HTTP error: status 404");
    }

    #[test]
    fn test_error_display_handshake() {
        let err = Error::Handshake(Reply {
            status: 401,
            data: json!("bad token"),
        });
        assert_eq!(err.to_string(), "Handshake rejected with status 401");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("not valid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::SerdeJson(_)));
    }

    #[test]
    fn test_error_serializes_as_string() {
        let value = serde_json::to_value(Error::MissingUsername).unwrap();
        assert_eq!(value, json!("Username is required"));
    }
}
