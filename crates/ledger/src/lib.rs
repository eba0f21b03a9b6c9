//! Hierarchical double-entry ledger for colle hours (event-sourced).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. The
//! `Ledger` aggregate owns the account tree, the movements posted against
//! it, and the reconciliation groups tying postings together.

pub mod account;
pub mod ledger;
pub mod movement;
pub mod reconciliation;

pub use account::{Account, AccountCategory, AccountRole, OverdraftPolicy};
pub use ledger::{
    AccountClosed, AccountOpened, Balance, CloseAccount, Ledger, LedgerCommand, LedgerEvent,
    LedgerId, LinesReconciled, MovementPosted, MovementReversed, MovementValidated, OpenAccount,
    PostMovement, Reconcile, RecordSettlement, ReverseMovement, SettlementAccrued,
    ValidateMovement,
};
pub use movement::{LineRef, LineSpec, Movement, MovementLine, MovementState, transfer_lines};
pub use reconciliation::{Reconciliation, ReconciliationId, ReconciliationMode};
