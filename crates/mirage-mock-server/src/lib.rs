//! Mirage: an expectation-driven HTTP mock server.
//!
//! Requests are matched against registered expectations in priority order and
//! answered from the matching expectation's response template. Expectations
//! can be loaded from a JSON file at startup, managed at runtime through the
//! control API, and mirrored continuously to disk.

pub mod admin_api;
pub mod config;
pub mod expectation;
pub mod metrics;
pub mod predicate;
pub mod request;
pub mod response;
pub mod server;

pub use config::ServerConfig;
pub use expectation::{Expectation, ExpectationStore, Matcher};
pub use server::{BoundServer, Server, ServerError, ServerState};
