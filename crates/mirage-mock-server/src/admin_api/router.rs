//! Route dispatch logic for the control API.
//!
//! Control routes share the port with mocked traffic. Each route is also
//! reachable under the `/mockserver` prefix; status and metrics only there.

use crate::admin_api::handlers::{expectations, system};
use crate::admin_api::ControlContext;
use crate::request::RequestDescriptor;
use crate::response::ResponseDescriptor;
use hyper::Method;
use tracing::debug;

const PREFIX: &str = "/mockserver";

/// Parsed control route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRoute {
    /// PUT /expectation
    Create,
    /// GET /expectation/:id
    Get(String),
    /// DELETE /expectation/:id
    Delete(String),
    /// PUT /reset
    Reset,
    /// GET /expectations
    List,
    /// GET /mockserver/status
    Status,
    /// GET /mockserver/metrics
    Metrics,
}

impl ControlRoute {
    /// Recognize a control request. Anything else is mocked traffic.
    pub fn parse(method: &str, path: &str) -> Option<Self> {
        let method: Method = method.parse().ok()?;
        let (prefixed, path) = match path.strip_prefix(PREFIX) {
            Some(rest) if rest.starts_with('/') => (true, rest),
            _ => (false, path),
        };

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            (Method::PUT, ["expectation"]) => Some(ControlRoute::Create),
            (Method::GET, ["expectation", id]) if !id.is_empty() => {
                Some(ControlRoute::Get(decode_id(id)))
            }
            (Method::DELETE, ["expectation", id]) if !id.is_empty() => {
                Some(ControlRoute::Delete(decode_id(id)))
            }
            (Method::PUT, ["reset"]) => Some(ControlRoute::Reset),
            (Method::GET, ["expectations"]) => Some(ControlRoute::List),
            (Method::GET, ["status"]) if prefixed => Some(ControlRoute::Status),
            (Method::GET, ["metrics"]) if prefixed => Some(ControlRoute::Metrics),
            _ => None,
        }
    }
}

fn decode_id(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|id| id.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Main request router
pub fn route_request(
    route: ControlRoute,
    request: &RequestDescriptor,
    ctx: &ControlContext<'_>,
) -> ResponseDescriptor {
    debug!("Control API: {} {}", request.method, request.path);

    match route {
        ControlRoute::Create => expectations::handle_create(&request.body, ctx.store),
        ControlRoute::Get(id) => expectations::handle_get(&id, ctx.store),
        ControlRoute::Delete(id) => expectations::handle_delete(&id, ctx.store),
        ControlRoute::Reset => expectations::handle_reset(ctx.store),
        ControlRoute::List => expectations::handle_list(ctx.store),
        ControlRoute::Status => system::handle_status(ctx),
        ControlRoute::Metrics => system::handle_metrics(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_route_parse() {
        assert_eq!(
            ControlRoute::parse("PUT", "/expectation"),
            Some(ControlRoute::Create)
        );
        assert_eq!(
            ControlRoute::parse("GET", "/expectation/abc"),
            Some(ControlRoute::Get("abc".to_string()))
        );
        assert_eq!(
            ControlRoute::parse("DELETE", "/expectation/abc"),
            Some(ControlRoute::Delete("abc".to_string()))
        );
        assert_eq!(ControlRoute::parse("PUT", "/reset"), Some(ControlRoute::Reset));
        assert_eq!(
            ControlRoute::parse("GET", "/expectations"),
            Some(ControlRoute::List)
        );
    }

    #[test]
    fn test_prefixed_routes() {
        assert_eq!(
            ControlRoute::parse("PUT", "/mockserver/expectation"),
            Some(ControlRoute::Create)
        );
        assert_eq!(
            ControlRoute::parse("PUT", "/mockserver/reset"),
            Some(ControlRoute::Reset)
        );
        assert_eq!(
            ControlRoute::parse("GET", "/mockserver/status"),
            Some(ControlRoute::Status)
        );
        assert_eq!(
            ControlRoute::parse("GET", "/mockserver/metrics"),
            Some(ControlRoute::Metrics)
        );
    }

    #[test]
    fn test_mocked_traffic_not_captured() {
        assert_eq!(ControlRoute::parse("GET", "/status"), None);
        assert_eq!(ControlRoute::parse("GET", "/metrics"), None);
        assert_eq!(ControlRoute::parse("GET", "/expectation"), None);
        assert_eq!(ControlRoute::parse("POST", "/expectation"), None);
        assert_eq!(ControlRoute::parse("DELETE", "/expectation/"), None);
        assert_eq!(ControlRoute::parse("GET", "/mockserverstatus"), None);
        assert_eq!(ControlRoute::parse("GET", "/buses"), None);
    }

    #[test]
    fn test_id_is_percent_decoded() {
        assert_eq!(
            ControlRoute::parse("DELETE", "/expectation/bus%20stop"),
            Some(ControlRoute::Delete("bus stop".to_string()))
        );
    }
}
