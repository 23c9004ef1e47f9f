// Error taxonomy
// Display strings are what ends up in `{success:false, error}` replies

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to encode value for '{key}': {reason}")]
    Encode { key: String, reason: String },

    #[error("Failed to decode value for '{key}': {reason}")]
    Decode { key: String, reason: String },
}

/// Failure classes of the backend client. Each renders a differently worded
/// message so a misconfigured origin is distinguishable from a dead server.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: Could not connect to API at {base_url}. Is the server running?")]
    Network { base_url: String },

    #[error("Server returned HTML instead of JSON. Check if API is running on {base_url}")]
    HtmlBody { base_url: String },

    #[error("Server returned non-JSON response: {preview}...")]
    NonJson { preview: String },

    /// Non-2xx status; `message` is already the best text the body offered
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        code: Option<String>,
    },

    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

impl ApiError {
    /// Structured error code supplied by the backend, when it sent one
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid message format - missing type")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid payload for {kind}: {reason}")]
    BadPayload { kind: String, reason: String },

    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("No user found")]
    NoUser,

    /// Rejected before any network call
    #[error("{0}")]
    Validation(String),

    /// Backend-reported failure, already rewritten for the user
    #[error("{0}")]
    Backend(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0}")]
    Timeout(String),

    /// The extension answered with `success:false`
    #[error("{0}")]
    Rejected(String),

    #[error("Wallet not connected. Call connect() first.")]
    NotConnected,

    #[error("Unexpected response data: {0}")]
    Decode(String),

    #[error("Provider dropped before the response arrived")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Extension channel error: {0}")]
    Channel(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("User not authenticated. Please login to the extension.")]
    NotAuthenticated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_messages() {
        let err = ApiError::Network {
            base_url: "http://localhost:3001".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Network error: Could not connect to API at http://localhost:3001. Is the server running?"
        );

        let err = ApiError::Status {
            status: 400,
            message: "bad".to_string(),
            code: Some("INSUFFICIENT_FUNDS".to_string()),
        };
        assert_eq!(err.to_string(), "bad");
        assert_eq!(err.code(), Some("INSUFFICIENT_FUNDS"));
    }

    #[test]
    fn test_relay_error_messages() {
        assert_eq!(
            RelayError::MissingType.to_string(),
            "Invalid message format - missing type"
        );
        assert_eq!(
            RelayError::UnknownType("FOO".to_string()).to_string(),
            "Unknown message type: FOO"
        );
    }
}
