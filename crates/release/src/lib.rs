//! Release (payout batch) module.
//!
//! A release aggregates performed colles into payable per-examiner,
//! per-rate-tier lines, each backed by a settlement posting in the ledger.
//! Pure domain logic only.

pub mod release;

pub use release::{
    AddColle, ColleAdded, LineExternallyRecorded, LinePaid, LinePosting, OpenRelease, PayLine,
    PayRelease, RecordExternal, Release, ReleaseCommand, ReleaseEvent, ReleaseId, ReleaseLine,
    ReleaseLineState, ReleaseOpened, ReleasePaid, ReleaseState, SettlementRef,
};
