//! Response construction.
//!
//! - `builder`: `ResponseDescriptor`, the wire-ready response
//! - `cors`: CORS header set
//! - `dispatcher`: `ResponseDispatcher` for matched, fallback and preflight responses

mod builder;
mod cors;
mod dispatcher;

pub use builder::ResponseDescriptor;
pub use cors::CorsHeaders;
pub use dispatcher::ResponseDispatcher;
