//! Priority-ordered expectation matching.

use super::store::{ExpectationStore, Snapshot, StoredExpectation};
use crate::request::RequestDescriptor;
use std::sync::Arc;
use tracing::debug;

/// Selects the expectation that answers a request.
///
/// Candidates are scanned by priority (highest first), then registration
/// order. Exhausted expectations are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct Matcher;

impl Matcher {
    pub fn new() -> Self {
        Self
    }

    /// First active expectation accepting `request`. Read-only.
    pub fn find(
        &self,
        snapshot: &Snapshot,
        request: &RequestDescriptor,
    ) -> Option<Arc<StoredExpectation>> {
        snapshot
            .in_match_order()
            .find(|entry| entry.is_active() && entry.matches(request))
            .cloned()
    }

    /// Find a match and claim one of its uses.
    ///
    /// A candidate exhausted by a concurrent request between the match and
    /// the claim is passed over in favor of the next matching candidate.
    pub fn find_and_claim(
        &self,
        store: &ExpectationStore,
        request: &RequestDescriptor,
    ) -> Option<Arc<StoredExpectation>> {
        let snapshot = store.snapshot();
        for entry in snapshot.in_match_order() {
            if !entry.is_active() || !entry.matches(request) {
                continue;
            }
            if store.consume(entry) {
                debug!(
                    id = %entry.id(),
                    method = %request.method,
                    path = %request.path,
                    "Expectation matched"
                );
                return Some(Arc::clone(entry));
            }
            debug!(id = %entry.id(), "Expectation exhausted by concurrent request");
        }

        debug!(method = %request.method, path = %request.path, "No expectation matched");
        None
    }
}
