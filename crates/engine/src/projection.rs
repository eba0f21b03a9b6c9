//! Read model: per-account display statements.
//!
//! Folds published envelopes into the balances a human reads: direct
//! (non-subtree) totals per account, with the presentation sign applied:
//! revenue and liability accounts show inverted, so an authority that
//! granted 120h displays +120h rather than the stored -120h.

use std::collections::HashMap;

use kholle_core::{AccountId, AggregateId, Hours};
use kholle_events::{EventEnvelope, Projection};
use kholle_ledger::{AccountCategory, LedgerEvent};

use crate::journal::CoreEvent;

/// One account's display row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStatement {
    pub account: AccountId,
    pub name: String,
    pub category: AccountCategory,
    /// Display-signed direct balance (all periods folded together).
    pub balance: Hours,
}

/// Projection: ledger events → display-signed account statements.
///
/// Idempotent: sequence numbers are tracked per aggregate stream and
/// anything already seen is skipped, so at-least-once delivery and full
/// replays both land on the same read model.
#[derive(Debug, Default)]
pub struct StatementProjection {
    statements: HashMap<AccountId, AccountStatement>,
    cursors: HashMap<AggregateId, u64>,
}

impl StatementProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statement(&self, account: AccountId) -> Option<&AccountStatement> {
        self.statements.get(&account)
    }

    pub fn statements(&self) -> impl Iterator<Item = &AccountStatement> {
        self.statements.values()
    }

    fn add(&mut self, account: AccountId, hours: Hours) {
        if let Some(statement) = self.statements.get_mut(&account) {
            let signed = if statement.category.display_sign() < 0 {
                -hours
            } else {
                hours
            };
            statement.balance += signed;
        }
    }
}

impl Projection for StatementProjection {
    type Ev = CoreEvent;

    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>) {
        let cursor = self.cursors.entry(envelope.aggregate_id()).or_default();
        if envelope.sequence_number() <= *cursor {
            return;
        }
        *cursor = envelope.sequence_number();

        let CoreEvent::Ledger(event) = envelope.payload() else {
            return;
        };

        match event {
            LedgerEvent::AccountOpened(e) => {
                self.statements.insert(
                    e.account.id,
                    AccountStatement {
                        account: e.account.id,
                        name: e.account.name.clone(),
                        category: e.account.category,
                        balance: Hours::ZERO,
                    },
                );
            }
            LedgerEvent::AccountClosed(e) => {
                self.statements.remove(&e.account_id);
            }
            LedgerEvent::MovementPosted(e) => {
                for line in &e.movement.lines {
                    self.add(line.account, line.hours);
                }
            }
            LedgerEvent::MovementReversed(e) => {
                for line in &e.reversal.lines {
                    self.add(line.account, line.hours);
                }
            }
            LedgerEvent::SettlementAccrued(e) => {
                self.add(e.credit_account, e.contribution);
                self.add(e.debit_line.account, e.debit_line.hours);
            }
            LedgerEvent::MovementValidated(_) | LedgerEvent::LinesReconciled(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kholle_core::{Minutes, PeriodId};
    use kholle_ledger::{Account, AccountOpened, Movement, MovementLine, MovementState, OverdraftPolicy};
    use std::collections::HashSet;
    use uuid::Uuid;

    fn envelope(stream: AggregateId, seq: u64, event: LedgerEvent) -> EventEnvelope<CoreEvent> {
        EventEnvelope::new(
            Uuid::now_v7(),
            stream,
            "ledger.book",
            seq,
            CoreEvent::Ledger(event),
        )
    }

    fn opened(account: AccountId, category: AccountCategory) -> LedgerEvent {
        LedgerEvent::AccountOpened(AccountOpened {
            account: Account {
                id: account,
                name: "account".to_string(),
                parent: None,
                category,
                managers: HashSet::new(),
                overdraft: OverdraftPolicy::unlimited(),
            },
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn revenue_debits_display_positive() {
        let stream = AggregateId::new();
        let revenue = AccountId::new();
        let asset = AccountId::new();
        let hours = Hours::uniform(Minutes::hours(120));

        let mut projection = StatementProjection::new();
        projection.apply(&envelope(stream, 1, opened(revenue, AccountCategory::Revenue)));
        projection.apply(&envelope(stream, 2, opened(asset, AccountCategory::Asset)));

        let movement = Movement {
            id: kholle_core::MovementId::new(),
            period: PeriodId::new(),
            motive: "grant".to_string(),
            colle: None,
            state: MovementState::Validated,
            lines: vec![
                MovementLine {
                    line_no: 1,
                    account: revenue,
                    hours: -hours,
                    tier: None,
                    motive: "grant".to_string(),
                    reconciliation: None,
                },
                MovementLine {
                    line_no: 2,
                    account: asset,
                    hours,
                    tier: None,
                    motive: "grant".to_string(),
                    reconciliation: None,
                },
            ],
        };
        projection.apply(&envelope(
            stream,
            3,
            LedgerEvent::MovementPosted(kholle_ledger::MovementPosted {
                movement,
                occurred_at: Utc::now(),
            }),
        ));

        assert_eq!(projection.statement(revenue).unwrap().balance, hours);
        assert_eq!(projection.statement(asset).unwrap().balance, hours);
    }

    #[test]
    fn duplicate_envelopes_are_skipped() {
        let stream = AggregateId::new();
        let asset = AccountId::new();
        let mut projection = StatementProjection::new();
        projection.apply(&envelope(stream, 1, opened(asset, AccountCategory::Asset)));

        let movement = Movement {
            id: kholle_core::MovementId::new(),
            period: PeriodId::new(),
            motive: "m".to_string(),
            colle: None,
            state: MovementState::Validated,
            lines: vec![MovementLine {
                line_no: 1,
                account: asset,
                hours: Hours::uniform(Minutes::hours(1)),
                tier: None,
                motive: "m".to_string(),
                reconciliation: None,
            }],
        };
        let posted = envelope(
            stream,
            2,
            LedgerEvent::MovementPosted(kholle_ledger::MovementPosted {
                movement,
                occurred_at: Utc::now(),
            }),
        );

        projection.apply(&posted);
        projection.apply(&posted);

        assert_eq!(
            projection.statement(asset).unwrap().balance,
            Hours::uniform(Minutes::hours(1))
        );
    }
}
