//! `kholle-engine`: the synchronous application service over the ledger
//! and release aggregates.
//!
//! This is the surface scheduling and reporting collaborators consume
//! in-process: colle notifications, the release workflow, balance queries,
//! and the event journal read models are built from.

pub mod chart;
pub mod colle;
pub mod engine;
pub mod journal;
pub mod projection;

pub use chart::{
    AuthorityAccounts, AuthorityRef, Chart, ChartRoots, ClassRef, EntityRef, EstablishmentAccounts,
    EstablishmentRef, ExaminerAccounts, ExaminerRef, SubjectRef,
};
pub use colle::{ColleEvent, ColleMode};
pub use engine::Engine;
pub use journal::{CoreEvent, Journal};
pub use projection::{AccountStatement, StatementProjection};
