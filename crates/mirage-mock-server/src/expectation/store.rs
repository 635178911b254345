//! In-memory expectation store.
//!
//! Readers take a cheap `Arc` clone of the current snapshot and never block
//! each other; writers build a new snapshot under the write lock. Remaining
//! counters are atomics shared by every snapshot that holds the entry, so a
//! concurrent add never loses a decrement.

use super::types::{Expectation, ExpectationError, Times};
use crate::metrics;
use crate::predicate::CompiledRequestMatcher;
use crate::request::RequestDescriptor;
use hyper::header::{HeaderName, HeaderValue};
use hyper::StatusCode;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// A validated expectation with its compiled matcher and live counter.
#[derive(Debug)]
pub struct StoredExpectation {
    id: String,
    expectation: Expectation,
    matcher: CompiledRequestMatcher,
    remaining: Option<AtomicU64>,
}

impl StoredExpectation {
    /// Validate and compile an expectation, assigning an id when absent.
    pub fn compile(mut expectation: Expectation) -> Result<Self, ExpectationError> {
        let id = match expectation.id.take().filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };
        expectation.id = Some(id.clone());

        let limit = expectation.limit()?;
        validate_response(&expectation)?;
        let matcher = CompiledRequestMatcher::compile(&expectation.http_request)?;

        Ok(Self {
            id,
            expectation,
            matcher,
            remaining: limit.map(AtomicU64::new),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> i32 {
        self.expectation.priority
    }

    /// The expectation as registered (remaining times as originally set).
    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }

    pub fn matches(&self, request: &RequestDescriptor) -> bool {
        self.matcher.matches(request)
    }

    /// Current remaining count; `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
            .as_ref()
            .map(|counter| counter.load(Ordering::SeqCst))
    }

    pub fn is_limited(&self) -> bool {
        self.remaining.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.remaining() != Some(0)
    }

    /// Atomically claim one use. Always succeeds for unlimited expectations.
    pub fn try_consume(&self) -> bool {
        match &self.remaining {
            None => true,
            Some(counter) => counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok(),
        }
    }

    /// The expectation with its live remaining count, as listed and persisted.
    pub fn to_expectation(&self) -> Expectation {
        let mut expectation = self.expectation.clone();
        if let Some(remaining) = self.remaining() {
            expectation.times = Some(Times::exactly(remaining));
        }
        expectation
    }
}

fn validate_response(expectation: &Expectation) -> Result<(), ExpectationError> {
    let response = &expectation.http_response;

    StatusCode::from_u16(response.status_code).map_err(|_| {
        ExpectationError::Validation(format!(
            "httpResponse.statusCode {} is out of range",
            response.status_code
        ))
    })?;

    for (name, values) in &response.headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ExpectationError::Validation(format!("invalid response header name '{name}'"))
        })?;
        for value in values.as_slice() {
            HeaderValue::from_str(value).map_err(|_| {
                ExpectationError::Validation(format!(
                    "invalid value for response header '{name}'"
                ))
            })?;
        }
    }

    Ok(())
}

/// Immutable view of the store at one point in time.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Registration order
    entries: Vec<Arc<StoredExpectation>>,
    /// Match order: priority descending, registration order within a priority
    by_priority: Vec<Arc<StoredExpectation>>,
}

impl Snapshot {
    fn new(entries: Vec<Arc<StoredExpectation>>) -> Self {
        let mut by_priority = entries.clone();
        by_priority.sort_by_key(|entry| Reverse(entry.priority()));
        Self {
            entries,
            by_priority,
        }
    }

    pub fn entries(&self) -> &[Arc<StoredExpectation>] {
        &self.entries
    }

    pub fn in_match_order(&self) -> impl Iterator<Item = &Arc<StoredExpectation>> {
        self.by_priority.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<StoredExpectation>> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered, concurrently readable collection of expectations.
pub struct ExpectationStore {
    snapshot: RwLock<Arc<Snapshot>>,
    /// Bumped after every mutation; the persistence writer watches it.
    revision: watch::Sender<u64>,
}

impl ExpectationStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            revision,
        }
    }

    /// Current snapshot. Cheap; never blocks on other readers.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Receive a notification after each mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Register an expectation and return its id. An expectation whose id
    /// is already registered is replaced in place.
    pub fn add(&self, expectation: Expectation) -> Result<String, ExpectationError> {
        let stored = self.add_all(vec![expectation])?;
        Ok(stored
            .into_iter()
            .next()
            .and_then(|expectation| expectation.id)
            .unwrap_or_default())
    }

    /// Register several expectations atomically: either every record is
    /// valid and all are added, or none are.
    pub fn add_all(
        &self,
        expectations: Vec<Expectation>,
    ) -> Result<Vec<Expectation>, ExpectationError> {
        let compiled = expectations
            .into_iter()
            .map(|expectation| StoredExpectation::compile(expectation).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let created: Vec<Expectation> = compiled.iter().map(|e| e.to_expectation()).collect();

        self.mutate(|entries| {
            for entry in compiled {
                match entries.iter().position(|existing| existing.id() == entry.id()) {
                    Some(index) => {
                        debug!(id = %entry.id(), "Replacing expectation");
                        entries[index] = entry;
                    }
                    None => {
                        debug!(id = %entry.id(), "Adding expectation");
                        entries.push(entry);
                    }
                }
            }
        });

        Ok(created)
    }

    /// Replace the whole collection, validating every record first.
    pub fn replace_all(&self, expectations: Vec<Expectation>) -> Result<usize, ExpectationError> {
        let compiled = expectations
            .into_iter()
            .map(|expectation| StoredExpectation::compile(expectation).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let count = compiled.len();

        self.mutate(move |entries| *entries = compiled);
        Ok(count)
    }

    /// Remove by id. Returns false for an unknown id.
    pub fn remove(&self, id: &str) -> bool {
        let mut removed = false;
        {
            let mut guard = self.snapshot.write();
            if guard.get(id).is_some() {
                let entries = guard
                    .entries()
                    .iter()
                    .filter(|entry| entry.id() != id)
                    .cloned()
                    .collect();
                *guard = Arc::new(Snapshot::new(entries));
                removed = true;
            }
        }

        if removed {
            info!(id = %id, "Expectation removed");
            self.publish();
        }
        removed
    }

    pub fn clear(&self) {
        self.mutate(|entries| entries.clear());
        info!("All expectations cleared");
    }

    pub fn get(&self, id: &str) -> Option<Expectation> {
        self.snapshot().get(id).map(|entry| entry.to_expectation())
    }

    /// Snapshot of every expectation in registration order, exhausted ones
    /// included.
    pub fn list(&self) -> Vec<Expectation> {
        self.snapshot()
            .entries()
            .iter()
            .map(|entry| entry.to_expectation())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Number of expectations that can still match.
    pub fn active_count(&self) -> usize {
        self.snapshot()
            .entries()
            .iter()
            .filter(|entry| entry.is_active())
            .count()
    }

    /// Atomically claim one use of the expectation with `id`.
    ///
    /// Returns `Ok(false)` when it is already exhausted.
    pub fn decrement_times(&self, id: &str) -> Result<bool, ExpectationError> {
        let snapshot = self.snapshot();
        let entry = snapshot
            .get(id)
            .ok_or_else(|| ExpectationError::NotFound(id.to_string()))?;
        Ok(self.consume(entry))
    }

    /// Claim one use of an entry taken from a snapshot of this store.
    pub fn consume(&self, entry: &StoredExpectation) -> bool {
        let claimed = entry.try_consume();
        if claimed && entry.is_limited() {
            debug!(id = %entry.id(), remaining = ?entry.remaining(), "Expectation use claimed");
            self.publish();
        }
        claimed
    }

    fn mutate(&self, apply: impl FnOnce(&mut Vec<Arc<StoredExpectation>>)) {
        {
            let mut guard = self.snapshot.write();
            let mut entries = guard.entries().to_vec();
            apply(&mut entries);
            *guard = Arc::new(Snapshot::new(entries));
        }
        self.publish();
    }

    fn publish(&self) {
        metrics::set_active_expectations(self.active_count());
        self.revision.send_modify(|revision| *revision += 1);
    }
}

impl Default for ExpectationStore {
    fn default() -> Self {
        Self::new()
    }
}
