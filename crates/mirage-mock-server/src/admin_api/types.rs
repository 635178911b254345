//! Request and response types for the control API.

use crate::expectation::{Expectation, ExpectationError};
use crate::response::ResponseDescriptor;
use crate::server::ServerState;
use hyper::StatusCode;
use serde::Serialize;

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

/// Individual error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Body of `GET /mockserver/status`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ports: Vec<u16>,
    pub expectations: usize,
    pub state: ServerState,
}

/// Parse a control request body holding one expectation record or an
/// array of them.
pub fn parse_expectations(body: &str) -> Result<Vec<Expectation>, ExpectationError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

// =============================================================================
// Response helper functions
// =============================================================================

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> ResponseDescriptor {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    ResponseDescriptor::json(status, json)
}

/// Create an error response
pub fn error_response(status: StatusCode, message: &str) -> ResponseDescriptor {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: status.as_str().to_string(),
            message: message.to_string(),
        }],
    };
    json_response(status, &error)
}

/// Map an expectation error to its control API response
pub fn expectation_error_response(error: &ExpectationError) -> ResponseDescriptor {
    match error {
        ExpectationError::Validation(_) => {
            error_response(StatusCode::BAD_REQUEST, &error.to_string())
        }
        ExpectationError::NotFound(_) => error_response(StatusCode::NOT_FOUND, &error.to_string()),
    }
}
