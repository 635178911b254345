//! Expectation storage, matching and persistence.
//!
//! ## Module Structure
//!
//! - `types`: Expectation records as exchanged over the control API and on disk
//! - `store`: `ExpectationStore`, the concurrently readable collection
//! - `matcher`: `Matcher`, priority-ordered selection with use claiming
//! - `persistence`: JSON initialization and persisted-expectations files

mod matcher;
pub mod persistence;
mod store;
mod types;


pub use matcher::Matcher;
pub use persistence::{PersistenceError, PersistenceGateway, PersistenceWriter};
pub use store::{ExpectationStore, Snapshot, StoredExpectation};
pub use types::{
    BodyPattern, Delay, Expectation, ExpectationError, FieldValues, JsonMatchType, PathPattern,
    RequestMatcher, ResponseTemplate, TimeUnit, Times, TypedBody,
};
