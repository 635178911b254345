//! Turns response templates into concrete responses.

use super::builder::ResponseDescriptor;
use super::cors::CorsHeaders;
use crate::config::{FallbackConfig, ServerConfig};
use crate::expectation::ResponseTemplate;
use crate::request::RequestDescriptor;
use hyper::header::{InvalidHeaderValue, CONTENT_TYPE};
use hyper::http::HeaderValue;
use hyper::{Method, StatusCode};
use tracing::warn;

/// Builds matched, fallback and preflight responses, applying CORS headers
/// when enabled.
#[derive(Debug, Clone)]
pub struct ResponseDispatcher {
    cors: Option<CorsHeaders>,
    fallback: FallbackConfig,
}

impl ResponseDispatcher {
    pub fn new(config: &ServerConfig) -> Result<Self, InvalidHeaderValue> {
        let cors = if config.cors.enabled {
            Some(CorsHeaders::new(&config.cors)?)
        } else {
            None
        };

        Ok(Self {
            cors,
            fallback: config.fallback.clone(),
        })
    }

    pub fn cors_enabled(&self) -> bool {
        self.cors.is_some()
    }

    /// Render a matched expectation's response template.
    pub fn dispatch(&self, template: &ResponseTemplate) -> ResponseDescriptor {
        let status = StatusCode::from_u16(template.status_code).unwrap_or_else(|_| {
            warn!(status = template.status_code, "Invalid status code in template");
            StatusCode::INTERNAL_SERVER_ERROR
        });

        let mut response = ResponseDescriptor::new(status);
        response.reason = template.reason_phrase.clone();
        response.delay = template.delay.as_ref().map(|delay| delay.duration());

        for (name, values) in &template.headers {
            for value in values.as_slice() {
                response = response.header(name, value);
            }
        }

        response.body = match &template.body {
            None => Default::default(),
            Some(serde_json::Value::String(text)) => text.clone().into(),
            Some(value) => {
                if !response.has_header(&CONTENT_TYPE) {
                    response
                        .headers
                        .push((CONTENT_TYPE, HeaderValue::from_static("application/json")));
                }
                value.to_string().into()
            }
        };

        self.decorate(response)
    }

    /// Response for a request no expectation matched.
    pub fn fallback(&self, request: &RequestDescriptor) -> ResponseDescriptor {
        let status = StatusCode::from_u16(self.fallback.status_code).unwrap_or(StatusCode::NOT_FOUND);
        let body = match &self.fallback.body {
            Some(body) => body.clone(),
            None => format!(
                "no expectation matched request: {} {}",
                request.method, request.path
            ),
        };

        self.decorate(
            ResponseDescriptor::new(status)
                .header("content-type", "text/plain; charset=utf-8")
                .body(body),
        )
    }

    /// A CORS preflight: `OPTIONS` carrying `Access-Control-Request-Method`.
    /// Only recognized when CORS is enabled.
    pub fn is_preflight(&self, request: &RequestDescriptor) -> bool {
        self.cors_enabled()
            && request.method == Method::OPTIONS.as_str()
            && request.header("access-control-request-method").is_some()
    }

    pub fn preflight(&self) -> ResponseDescriptor {
        self.decorate(ResponseDescriptor::new(StatusCode::OK))
    }

    /// Add CORS headers, keeping any the response already sets.
    pub fn decorate(&self, mut response: ResponseDescriptor) -> ResponseDescriptor {
        if let Some(cors) = &self.cors {
            cors.apply(&mut response.headers);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorsConfig;
    use crate::expectation::Delay;
    use hyper::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE};
    use serde_json::json;
    use std::time::Duration;

    fn dispatcher(cors: bool) -> ResponseDispatcher {
        let config = ServerConfig {
            cors: if cors {
                CorsConfig::allow("*")
            } else {
                CorsConfig::default()
            },
            ..Default::default()
        };
        ResponseDispatcher::new(&config).unwrap()
    }

    #[test]
    fn test_dispatch_text_body() {
        let response = dispatcher(false).dispatch(&ResponseTemplate::status(200).body("[]"));

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"[]");
        assert!(response.headers.is_empty());
        assert_eq!(response.delay, None);
    }

    #[test]
    fn test_dispatch_json_body_adds_content_type() {
        let response =
            dispatcher(false).dispatch(&ResponseTemplate::status(201).json_body(json!({"a": 1})));

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(&response.body[..], br#"{"a":1}"#);
        assert_eq!(
            response.header_value("content-type"),
            Some(&HeaderValue::from_static("application/json"))
        );
    }

    #[test]
    fn test_dispatch_keeps_template_content_type() {
        let template = ResponseTemplate::status(200)
            .header("Content-Type", "application/vnd.bus+json")
            .json_body(json!([]));
        let response = dispatcher(false).dispatch(&template);

        let types: Vec<_> = response
            .headers
            .iter()
            .filter(|(name, _)| name == CONTENT_TYPE)
            .collect();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].1, "application/vnd.bus+json");
    }

    #[test]
    fn test_dispatch_header_order_and_delay() {
        let mut template = ResponseTemplate::status(200)
            .header("X-First", "1")
            .header("X-Second", "2");
        template.delay = Some(Delay::Millis(150));
        let response = dispatcher(false).dispatch(&template);

        let names: Vec<_> = response.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["x-first", "x-second"]);
        assert_eq!(response.delay, Some(Duration::from_millis(150)));
    }

    #[test]
    fn test_cors_applied_template_wins() {
        let template = ResponseTemplate::status(200).header(
            "Access-Control-Allow-Origin",
            "https://only.example",
        );
        let response = dispatcher(true).dispatch(&template);

        assert_eq!(
            response.header_value("access-control-allow-origin"),
            Some(&HeaderValue::from_static("https://only.example"))
        );
        assert!(response.has_header(&ACCESS_CONTROL_MAX_AGE));
    }

    #[test]
    fn test_fallback() {
        let request = RequestDescriptor::new("GET", "/routes");

        let plain = dispatcher(false).fallback(&request);
        assert_eq!(plain.status, StatusCode::NOT_FOUND);
        assert_eq!(
            &plain.body[..],
            b"no expectation matched request: GET /routes"
        );
        assert!(!plain.has_header(&ACCESS_CONTROL_ALLOW_ORIGIN));

        let with_cors = dispatcher(true).fallback(&request);
        assert_eq!(
            with_cors.header_value("access-control-allow-origin"),
            Some(&HeaderValue::from_static("*"))
        );
    }

    #[test]
    fn test_configured_fallback() {
        let config = ServerConfig {
            fallback: FallbackConfig {
                status_code: 418,
                body: Some("teapot".to_string()),
            },
            ..Default::default()
        };
        let response = ResponseDispatcher::new(&config)
            .unwrap()
            .fallback(&RequestDescriptor::new("GET", "/"));

        assert_eq!(response.status.as_u16(), 418);
        assert_eq!(&response.body[..], b"teapot");
    }

    #[test]
    fn test_preflight_detection() {
        let request = RequestDescriptor::new("OPTIONS", "/buses")
            .with_header("Access-Control-Request-Method", "GET");

        assert!(dispatcher(true).is_preflight(&request));
        assert!(!dispatcher(false).is_preflight(&request));
        assert!(!dispatcher(true).is_preflight(&RequestDescriptor::new("OPTIONS", "/buses")));

        let response = dispatcher(true).preflight();
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.is_empty());
        assert!(response.has_header(&ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
