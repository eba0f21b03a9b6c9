use serde::{Deserialize, Serialize};

use kholle_core::{AccountId, ColleId, Entity, Hours, MovementId, PeriodId, RateTier};

use crate::reconciliation::ReconciliationId;

/// Movement lifecycle.
///
/// A draft may still be amended (the release workflow grows its settlement
/// drafts one colle at a time); once validated, lines are immutable and
/// corrections go through reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementState {
    Draft,
    Validated,
}

/// One posting against one account.
///
/// Signs follow the ledger convention: debit negative, credit positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementLine {
    pub line_no: u32,
    pub account: AccountId,
    pub hours: Hours,
    pub tier: Option<RateTier>,
    pub motive: String,
    pub reconciliation: Option<ReconciliationId>,
}

impl MovementLine {
    /// Credit side of the convention. Zero-duration lines fall back to the
    /// interrogation component so reversal pairing stays total.
    pub fn is_credit(&self) -> bool {
        self.hours.duration.as_minutes() > 0
            || (self.hours.duration.is_zero() && self.hours.interrogation.as_minutes() > 0)
    }
}

/// Stable address of a line: movement id + 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRef {
    pub movement: MovementId,
    pub line_no: u32,
}

/// Caller-provided line content for `PostMovement` (line numbers are
/// assigned by the ledger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpec {
    pub account: AccountId,
    pub hours: Hours,
    pub tier: Option<RateTier>,
    pub motive: String,
}

/// The canonical two-line transfer: debit negative on the source account,
/// credit positive on the destination. Every higher-level flow (scheduling,
/// release, payment) goes through this shape.
pub fn transfer_lines(
    debit_account: AccountId,
    credit_account: AccountId,
    hours: Hours,
    tier: Option<RateTier>,
    motive: impl Into<String>,
) -> Vec<LineSpec> {
    let motive = motive.into();
    vec![
        LineSpec {
            account: debit_account,
            hours: -hours,
            tier,
            motive: motive.clone(),
        },
        LineSpec {
            account: credit_account,
            hours,
            tier,
            motive,
        },
    ]
}

/// An atomic, balanced set of postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub period: PeriodId,
    pub motive: String,
    /// Back-reference to the colle that caused this movement, if any.
    pub colle: Option<ColleId>,
    pub state: MovementState,
    pub lines: Vec<MovementLine>,
}

impl Movement {
    /// Sum of all lines; zero for every persisted movement.
    pub fn balance(&self) -> Hours {
        self.lines.iter().map(|l| l.hours).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.balance().is_zero()
    }

    pub fn line(&self, line_no: u32) -> Option<&MovementLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kholle_core::Minutes;

    #[test]
    fn transfer_lines_are_mirrored() {
        let debit = AccountId::new();
        let credit = AccountId::new();
        let hours = Hours::new(Minutes::hours(2), Minutes::minutes(40));

        let lines = transfer_lines(debit, credit, hours, None, "dotation");

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].account, debit);
        assert_eq!(lines[0].hours, -hours);
        assert_eq!(lines[1].account, credit);
        assert_eq!(lines[1].hours, hours);
        assert!((lines[0].hours + lines[1].hours).is_zero());
    }

    #[test]
    fn credit_side_detection() {
        let line = |hours| MovementLine {
            line_no: 1,
            account: AccountId::new(),
            hours,
            tier: None,
            motive: String::new(),
            reconciliation: None,
        };

        assert!(line(Hours::uniform(Minutes::hours(1))).is_credit());
        assert!(!line(Hours::uniform(Minutes::hours(-1))).is_credit());
        assert!(line(Hours::new(Minutes::ZERO, Minutes::minutes(20))).is_credit());
        assert!(!line(Hours::ZERO).is_credit());
    }
}
