//! Per-request handling: control routes, expectation matching, fallback.

use super::lifecycle::Lifecycle;
use crate::admin_api::{self, ControlContext, ControlRoute};
use crate::expectation::{ExpectationStore, Matcher};
use crate::metrics::{self, Outcome};
use crate::request::RequestDescriptor;
use crate::response::{ResponseDescriptor, ResponseDispatcher};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

/// The service behind every connection.
pub struct MockService {
    store: Arc<ExpectationStore>,
    matcher: Matcher,
    dispatcher: ResponseDispatcher,
    lifecycle: Arc<Lifecycle>,
    port: u16,
}

impl MockService {
    pub fn new(
        store: Arc<ExpectationStore>,
        dispatcher: ResponseDispatcher,
        lifecycle: Arc<Lifecycle>,
        port: u16,
    ) -> Self {
        Self {
            store,
            matcher: Matcher::new(),
            dispatcher,
            lifecycle,
            port,
        }
    }

    /// Produce the response for a request. Never blocks on I/O.
    pub fn handle(&self, request: &RequestDescriptor) -> ResponseDescriptor {
        if let Some(route) = ControlRoute::parse(&request.method, &request.path) {
            metrics::record_request(&request.method, Outcome::Control);
            let ctx = ControlContext {
                store: &self.store,
                port: self.port,
                state: self.lifecycle.state(),
            };
            let response = admin_api::route_request(route, request, &ctx);
            return self.dispatcher.decorate(response);
        }

        if let Some(entry) = self.matcher.find_and_claim(&self.store, request) {
            metrics::record_request(&request.method, Outcome::Matched);
            return self.dispatcher.dispatch(&entry.expectation().http_response);
        }

        if self.dispatcher.is_preflight(request) {
            metrics::record_request(&request.method, Outcome::Preflight);
            debug!(path = %request.path, "Answering CORS preflight");
            return self.dispatcher.preflight();
        }

        metrics::record_request(&request.method, Outcome::Unmatched);
        self.dispatcher.fallback(request)
    }

    /// Hyper entry point: collect the request, handle it, apply any delay.
    pub async fn serve(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let request = match RequestDescriptor::from_hyper(req).await {
            Ok(request) => request,
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                let response = admin_api::error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("failed to read request body: {e}"),
                );
                return Ok(self.dispatcher.decorate(response).build_full());
            }
        };

        let mut response = self.handle(&request);

        if let Some(delay) = response.delay.take() {
            debug!(delay_ms = delay.as_millis() as u64, "Delaying response");
            tokio::time::sleep(delay).await;
        }

        Ok(response.build_full())
    }
}
