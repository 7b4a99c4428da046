//! A thin, typed facade over [`ConvergeStore`]'s event table.
//!
//! `Store`-backed rather than an in-memory buffer: every `append` is
//! immediately durable, and `query` delegates straight to the store's
//! indexed lookup instead of a linear scan.

use std::sync::Arc;

use converge_store::{ConvergeStore, EventFilter};
use converge_types::{ConvergeError, Event, EventType};
use serde_json::Value;
use uuid_like::new_trace_id;

/// Append-only, store-backed event log.
pub struct EventLog {
    store: Arc<dyn ConvergeStore>,
}

impl EventLog {
    pub fn new(store: Arc<dyn ConvergeStore>) -> Self {
        EventLog { store }
    }

    /// Appends an event, generating a trace id if the caller didn't set one.
    pub fn append(&self, mut event: Event) -> Result<Event, ConvergeError> {
        if event.trace_id.is_empty() {
            event.trace_id = new_trace_id();
        }
        self.store.append_event(event)
    }

    /// Convenience constructor for the common case: a bare payload with no
    /// intent/agent/tenant association yet.
    pub fn record(&self, event_type: EventType, payload: Value) -> Result<Event, ConvergeError> {
        self.append(Event::new(event_type, new_trace_id(), payload))
    }

    pub fn query(&self, filter: &EventFilter) -> Result<Vec<Event>, ConvergeError> {
        self.store.query_events(filter)
    }

    pub fn count(&self, filter: &EventFilter) -> Result<i64, ConvergeError> {
        self.store.count_events(filter)
    }

    /// All events, oldest first — the audit chain's and projections' shared
    /// need for a full chronological walk.
    pub fn all_chronological(&self) -> Result<Vec<Event>, ConvergeError> {
        let mut events = self.store.query_events(&EventFilter::new().with_limit(i64::MAX))?;
        events.reverse();
        Ok(events)
    }

    pub fn prune_before(&self, before: chrono::DateTime<chrono::Utc>, tenant_id: Option<&str>, dry_run: bool) -> Result<i64, ConvergeError> {
        self.store.prune_events(before, tenant_id, dry_run)
    }
}

/// A tiny trace-id generator: no external `uuid` crate in this corpus's
/// dependency set, so this mirrors the reference's `uuid4().hex` informally
/// with a timestamp + random suffix rather than a true UUID.
mod uuid_like {
    use rand::Rng;

    pub fn new_trace_id() -> String {
        let mut rng = rand::thread_rng();
        let suffix: u64 = rng.gen();
        format!("trace-{:016x}", suffix)
    }
}
