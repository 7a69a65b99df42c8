//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and the mapping
//! of port errors onto HTTP responses.

use crate::config::ConfigError;
use axum::http::StatusCode;
use image_enhancer_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports,
    /// e.g. an unreadable account document at startup.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts a port error into the status and user-visible message returned by
/// a handler. Internal details of storage and unexpected failures are not
/// echoed back to the client.
pub fn port_error_response(err: PortError) -> (StatusCode, String) {
    match err {
        PortError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Decode(msg) => (
            StatusCode::BAD_REQUEST,
            format!("Error loading image: {}", msg),
        ),
        PortError::UnsupportedFormat(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        PortError::Encode(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Could not export image: {}", msg),
        ),
        PortError::Enhancement(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error during enhancement: {}", msg),
        ),
        PortError::Storage(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Account storage is unavailable".to_string(),
        ),
        PortError::Unexpected(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_details_stay_out_of_responses() {
        let (status, body) =
            port_error_response(PortError::Storage("/srv/users.json: permission denied".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("/srv"));
    }

    #[test]
    fn user_errors_map_to_client_statuses() {
        assert_eq!(
            port_error_response(PortError::Decode("bad header".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            port_error_response(PortError::Encode("no encoder".into())).0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(port_error_response(PortError::Unauthorized).0, StatusCode::UNAUTHORIZED);
    }
}
