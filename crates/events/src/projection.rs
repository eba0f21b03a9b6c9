use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// The journal is the source of truth; a read model is a disposable,
/// query-optimized view that can be rebuilt at any time by replaying the
/// journal into a fresh projection.
///
/// Projections must be **idempotent**: the bus gives at-least-once delivery,
/// so applying the same envelope twice must produce the same read model.
/// Track sequence numbers per aggregate stream and skip anything already
/// seen.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    ///
    /// Events that are not relevant to this projection are ignored, not
    /// errors.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
