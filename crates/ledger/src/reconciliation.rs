//! Reconciliation (lettrage): grouping postings that settle one another.
//!
//! Typical trail for an examiner's account: performing colles credits the
//! account; a later payout debits it; reconciling those lines records which
//! hours the payout covered, without ever rewriting history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kholle_core::{AggregateId, Entity};

use crate::movement::LineRef;

/// Reconciliation group identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReconciliationId(pub AggregateId);

impl ReconciliationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReconciliationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Group mode.
///
/// Total groups must sum to zero on both quantities; partial groups are a
/// pure cross-reference aid with no balance requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationMode {
    Partial,
    Total,
}

/// A set of lines, possibly across movements and accounts, marked as
/// settling one another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub id: ReconciliationId,
    pub mode: ReconciliationMode,
    pub at: DateTime<Utc>,
    pub lines: Vec<LineRef>,
}

impl Reconciliation {
    pub fn contains(&self, line: &LineRef) -> bool {
        self.lines.contains(line)
    }
}

impl Entity for Reconciliation {
    type Id = ReconciliationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
