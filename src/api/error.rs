//! API error types

use thiserror::Error;

/// Errors that can occur when calling the study-platform API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Get the HTTP status code if the server answered with a non-2xx status
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check whether this error originated on the server side
    pub fn is_server_error(&self) -> bool {
        matches!(self, ApiError::Api { status, .. } if *status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let err = ApiError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.status(), Some(500));

        let err = ApiError::InvalidResponse("bad".to_string());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_is_server_error() {
        assert!(
            ApiError::Api {
                status: 503,
                message: String::new()
            }
            .is_server_error()
        );

        assert!(
            !ApiError::Api {
                status: 400,
                message: String::new()
            }
            .is_server_error()
        );

        assert!(!ApiError::InvalidResponse("nope".to_string()).is_server_error());
    }

    #[test]
    fn test_display_includes_status_and_message() {
        let err = ApiError::Api {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error 404: not found");
    }
}
