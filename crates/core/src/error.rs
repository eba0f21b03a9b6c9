//! Domain error model.

use thiserror::Error;

use crate::duration::{Hours, Minutes};
use crate::id::AccountId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A movement or total reconciliation group does not sum to zero.
    ///
    /// Always a caller logic error; never retried automatically. Carries the
    /// offending sums for diagnostics.
    #[error("unbalanced postings: duration sum {duration}, interrogation sum {interrogation}")]
    Unbalanced {
        duration: Minutes,
        interrogation: Minutes,
    },

    /// A posting would push an account's subtree balance below its
    /// authorized floor.
    ///
    /// `requested` is the subtree balance the posting would have produced;
    /// `limit` is the account's floor (zero unless overdraft is allowed).
    #[error("overdraft exceeded on account {account}: balance would reach {requested}, floor is {limit}")]
    OverdraftExceeded {
        account: AccountId,
        requested: Hours,
        limit: Hours,
    },

    /// A structurally invalid account-tree edit (missing parent, category
    /// incompatible with the parent's accounting role).
    #[error("invalid account hierarchy: {0}")]
    InvalidHierarchy(String),

    /// The colle is already attached to a release.
    ///
    /// Surfaced by the release aggregate; the engine treats it as a benign
    /// no-op so batch re-runs stay idempotent at the event level.
    #[error("colle already attached to a release")]
    AlreadyReleased,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. lifecycle state does not permit the
    /// operation, or an identifier is already taken).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn hierarchy(msg: impl Into<String>) -> Self {
        Self::InvalidHierarchy(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
