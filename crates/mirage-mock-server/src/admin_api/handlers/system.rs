//! System handlers: status, metrics.

use crate::admin_api::types::{json_response, StatusResponse};
use crate::admin_api::ControlContext;
use crate::metrics;
use crate::response::ResponseDescriptor;
use hyper::StatusCode;

/// GET /mockserver/status
pub fn handle_status(ctx: &ControlContext<'_>) -> ResponseDescriptor {
    json_response(
        StatusCode::OK,
        &StatusResponse {
            ports: vec![ctx.port],
            expectations: ctx.store.len(),
            state: ctx.state,
        },
    )
}

/// GET /mockserver/metrics - Prometheus metrics
pub fn handle_metrics() -> ResponseDescriptor {
    ResponseDescriptor::new(StatusCode::OK)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(metrics::collect_metrics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectation::ExpectationStore;
    use crate::server::ServerState;

    #[test]
    fn test_handle_status() {
        let store = ExpectationStore::new();
        let ctx = ControlContext {
            store: &store,
            port: 1080,
            state: ServerState::Running,
        };

        let resp = handle_status(&ctx);
        assert_eq!(resp.status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"ports": [1080], "expectations": 0, "state": "running"})
        );
    }

    #[test]
    fn test_handle_metrics() {
        let resp = handle_metrics();
        assert_eq!(resp.status, StatusCode::OK);
    }
}
