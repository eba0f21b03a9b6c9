//! The durable event journal: one append-only envelope stream per aggregate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kholle_core::{AggregateId, DomainResult, ExpectedVersion};
use kholle_events::{Event, EventEnvelope};
use kholle_ledger::LedgerEvent;
use kholle_release::ReleaseEvent;

/// Union of all journaled event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreEvent {
    Ledger(LedgerEvent),
    Release(ReleaseEvent),
}

impl Event for CoreEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CoreEvent::Ledger(e) => e.event_type(),
            CoreEvent::Release(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            CoreEvent::Ledger(e) => e.version(),
            CoreEvent::Release(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CoreEvent::Ledger(e) => e.occurred_at(),
            CoreEvent::Release(e) => e.occurred_at(),
        }
    }
}

/// Append-only journal of committed events.
///
/// Sequence numbers are per aggregate stream, starting at 1, and must stay
/// in lockstep with the aggregate's own version: the `expected` check on
/// append catches any drift between decision and application.
#[derive(Debug, Default)]
pub struct Journal {
    records: Vec<EventEnvelope<CoreEvent>>,
    sequences: HashMap<AggregateId, u64>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        expected: ExpectedVersion,
        payload: CoreEvent,
    ) -> DomainResult<EventEnvelope<CoreEvent>> {
        let current = self.sequences.get(&aggregate_id).copied().unwrap_or(0);
        expected.check(current)?;

        let sequence_number = current + 1;
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            aggregate_type,
            sequence_number,
            payload,
        );
        self.records.push(envelope.clone());
        self.sequences.insert(aggregate_id, sequence_number);
        Ok(envelope)
    }

    /// All committed envelopes, in commit order.
    pub fn records(&self) -> &[EventEnvelope<CoreEvent>] {
        &self.records
    }

    /// One aggregate's stream, in sequence order.
    pub fn stream(
        &self,
        aggregate_id: AggregateId,
    ) -> impl Iterator<Item = &EventEnvelope<CoreEvent>> {
        self.records
            .iter()
            .filter(move |e| e.aggregate_id() == aggregate_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kholle_release::ReleasePaid;

    fn sample_event() -> CoreEvent {
        CoreEvent::Release(ReleaseEvent::ReleasePaid(ReleasePaid {
            at: Utc::now(),
            occurred_at: Utc::now(),
        }))
    }

    #[test]
    fn sequences_are_per_stream() {
        let mut journal = Journal::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        let e1 = journal
            .append(a, "release.batch", ExpectedVersion::Exact(0), sample_event())
            .unwrap();
        let e2 = journal
            .append(b, "release.batch", ExpectedVersion::Exact(0), sample_event())
            .unwrap();
        let e3 = journal
            .append(a, "release.batch", ExpectedVersion::Exact(1), sample_event())
            .unwrap();

        assert_eq!(e1.sequence_number(), 1);
        assert_eq!(e2.sequence_number(), 1);
        assert_eq!(e3.sequence_number(), 2);
        assert_eq!(journal.stream(a).count(), 2);
    }

    #[test]
    fn envelopes_round_trip_through_json() {
        let mut journal = Journal::new();
        let a = AggregateId::new();
        let envelope = journal
            .append(a, "release.batch", ExpectedVersion::Any, sample_event())
            .unwrap();

        let json = serde_json::to_value(&envelope).unwrap();
        let back: EventEnvelope<CoreEvent> = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn stale_expectation_is_rejected() {
        let mut journal = Journal::new();
        let a = AggregateId::new();
        journal
            .append(a, "release.batch", ExpectedVersion::Any, sample_event())
            .unwrap();

        let err = journal
            .append(a, "release.batch", ExpectedVersion::Exact(0), sample_event())
            .unwrap_err();
        assert!(matches!(err, kholle_core::DomainError::Conflict(_)));
    }
}
