//! Latest-request bookkeeping.
//!
//! Each field position keeps only the id of the most recent request sent
//! for it. A reply carrying any other id is stale and must not reach the
//! guardrail.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Field position: `(tag, occurrence)`.
pub type FieldKey = (String, usize);

#[derive(Debug, Default)]
pub struct PendingRequests {
    latest: Mutex<HashMap<FieldKey, String>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `request_id` as current for the field, superseding any earlier one.
    pub fn register(&self, tag: &str, occurrence: usize, request_id: &str) {
        let previous = self
            .latest
            .lock()
            .insert((tag.to_string(), occurrence), request_id.to_string());
        if let Some(previous) = previous {
            tracing::debug!(tag, occurrence, superseded = %previous, current = %request_id, "Request superseded");
        }
    }

    pub fn is_current(&self, tag: &str, occurrence: usize, request_id: &str) -> bool {
        self.latest
            .lock()
            .get(&(tag.to_string(), occurrence))
            .is_some_and(|id| id == request_id)
    }

    /// Clear the entry if `request_id` is still current. Returns whether it was.
    pub fn complete(&self, tag: &str, occurrence: usize, request_id: &str) -> bool {
        let mut latest = self.latest.lock();
        let key = (tag.to_string(), occurrence);
        if latest.get(&key).is_some_and(|id| id == request_id) {
            latest.remove(&key);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.latest.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.lock().is_empty()
    }
}
