//! Control API for managing expectations at runtime.
//!
//! This module provides:
//! - Registering, fetching, deleting and listing expectations
//! - Resetting the expectation set
//! - Status and Prometheus metrics endpoints
//!
//! The routes are served on the mock port alongside mocked traffic.

mod handlers;
mod router;
mod types;

use crate::expectation::ExpectationStore;
use crate::server::ServerState;

pub use router::{route_request, ControlRoute};
pub use types::{error_response, ErrorDetail, ErrorResponse, StatusResponse};

/// What a control handler may read or change.
pub struct ControlContext<'a> {
    pub store: &'a ExpectationStore,
    pub port: u16,
    pub state: ServerState,
}
