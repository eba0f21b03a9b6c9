use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kholle_core::{
    AccountId, Aggregate, AggregateId, AggregateRoot, ColleId, DomainError, Hours, Minutes,
    MovementId, PeriodId, RateTier, UserId,
};
use kholle_events::Event;

use crate::account::{Account, AccountCategory, OverdraftPolicy};
use crate::movement::{LineRef, LineSpec, Movement, MovementLine, MovementState};
use crate::reconciliation::{Reconciliation, ReconciliationId, ReconciliationMode};

/// Ledger identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(pub AggregateId);

impl LedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Subtree balance of an account for one period: the pair totals plus the
/// per-rate-tier breakdown (untiered lines under `None`).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Balance {
    pub hours: Hours,
    pub by_tier: BTreeMap<Option<RateTier>, Hours>,
}

/// Aggregate root: the hierarchical double-entry ledger.
///
/// Owns the account forest, every movement posted against it, and the
/// reconciliation groups. Subtree balances are maintained incrementally:
/// applying a line updates the posted account and its whole ancestor chain,
/// so balance queries are lookups and no line is ever double-counted (the
/// forest is strict: single parent, fixed at creation).
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    id: LedgerId,
    accounts: HashMap<AccountId, Account>,
    children: HashMap<AccountId, Vec<AccountId>>,
    movements: HashMap<MovementId, Movement>,
    reconciliations: HashMap<ReconciliationId, Reconciliation>,
    balances: HashMap<(AccountId, PeriodId), Balance>,
    /// Direct (non-subtree) line count per account; blocks account closing.
    line_counts: HashMap<AccountId, u64>,
    version: u64,
}

impl Ledger {
    /// Empty aggregate for rehydration.
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            accounts: HashMap::new(),
            children: HashMap::new(),
            movements: HashMap::new(),
            reconciliations: HashMap::new(),
            balances: HashMap::new(),
            line_counts: HashMap::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn movement(&self, id: MovementId) -> Option<&Movement> {
        self.movements.get(&id)
    }

    pub fn movements(&self) -> impl Iterator<Item = &Movement> {
        self.movements.values()
    }

    pub fn reconciliation(&self, id: ReconciliationId) -> Option<&Reconciliation> {
        self.reconciliations.get(&id)
    }

    pub fn line(&self, line: &LineRef) -> Option<&MovementLine> {
        self.movements.get(&line.movement)?.line(line.line_no)
    }

    /// Subtree balance of `account` for `period`: the account plus every
    /// descendant, over all lines of movements in that period.
    pub fn balance(&self, account: AccountId, period: PeriodId) -> Balance {
        self.balances
            .get(&(account, period))
            .cloned()
            .unwrap_or_default()
    }

    fn self_and_ancestors(&self, account: AccountId) -> Vec<AccountId> {
        let mut chain = Vec::new();
        let mut cursor = Some(account);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.accounts.get(&id).and_then(|a| a.parent);
        }
        chain
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenAccount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccount {
    pub account_id: AccountId,
    pub name: String,
    pub parent: Option<AccountId>,
    pub category: AccountCategory,
    pub managers: HashSet<UserId>,
    pub overdraft: OverdraftPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseAccount.
///
/// Blocked while the account has sub-accounts or postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAccount {
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PostMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMovement {
    pub movement_id: MovementId,
    pub period: PeriodId,
    pub motive: String,
    pub colle: Option<ColleId>,
    pub state: MovementState,
    pub lines: Vec<LineSpec>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ValidateMovement (draft → validated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateMovement {
    pub movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseMovement.
///
/// Emits a mirror movement cancelling the original. When
/// `reconciliation_id` is given, the original's credit lines are grouped
/// with the matching reversal lines in one total reconciliation, in the same
/// atomic step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseMovement {
    pub movement_id: MovementId,
    pub reversal_id: MovementId,
    pub reconciliation_id: Option<ReconciliationId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reconcile a set of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconcile {
    pub reconciliation_id: ReconciliationId,
    pub mode: ReconciliationMode,
    pub lines: Vec<LineRef>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordSettlement.
///
/// One release-line accrual: grows the settlement movement's credit line by
/// `hours` and appends the matching per-colle debit line, creating the draft
/// movement (with a zero-valued credit line at line 1) the first time. The
/// movement stays balanced after every call, not just at batch close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSettlement {
    pub movement_id: MovementId,
    pub period: PeriodId,
    pub motive: String,
    pub settlement_account: AccountId,
    pub tier: RateTier,
    pub debit_account: AccountId,
    pub hours: Hours,
    pub line_motive: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    OpenAccount(OpenAccount),
    CloseAccount(CloseAccount),
    PostMovement(PostMovement),
    ValidateMovement(ValidateMovement),
    ReverseMovement(ReverseMovement),
    Reconcile(Reconcile),
    RecordSettlement(RecordSettlement),
}

/// Event: AccountOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpened {
    pub account: Account,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AccountClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountClosed {
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementPosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPosted {
    pub movement: Movement,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementValidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementValidated {
    pub movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReversed {
    pub original: MovementId,
    pub reversal: Movement,
    pub reconciliation: Option<Reconciliation>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinesReconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesReconciled {
    pub reconciliation: Reconciliation,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SettlementAccrued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementAccrued {
    pub movement_id: MovementId,
    pub credit_line: u32,
    pub credit_account: AccountId,
    pub tier: RateTier,
    pub contribution: Hours,
    pub debit_line: MovementLine,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    AccountOpened(AccountOpened),
    AccountClosed(AccountClosed),
    MovementPosted(MovementPosted),
    MovementValidated(MovementValidated),
    MovementReversed(MovementReversed),
    LinesReconciled(LinesReconciled),
    SettlementAccrued(SettlementAccrued),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::AccountOpened(_) => "ledger.account.opened",
            LedgerEvent::AccountClosed(_) => "ledger.account.closed",
            LedgerEvent::MovementPosted(_) => "ledger.movement.posted",
            LedgerEvent::MovementValidated(_) => "ledger.movement.validated",
            LedgerEvent::MovementReversed(_) => "ledger.movement.reversed",
            LedgerEvent::LinesReconciled(_) => "ledger.lines.reconciled",
            LedgerEvent::SettlementAccrued(_) => "ledger.settlement.accrued",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::AccountOpened(e) => e.occurred_at,
            LedgerEvent::AccountClosed(e) => e.occurred_at,
            LedgerEvent::MovementPosted(e) => e.occurred_at,
            LedgerEvent::MovementValidated(e) => e.occurred_at,
            LedgerEvent::MovementReversed(e) => e.occurred_at,
            LedgerEvent::LinesReconciled(e) => e.occurred_at,
            LedgerEvent::SettlementAccrued(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Ledger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::AccountOpened(e) => {
                if let Some(parent) = e.account.parent {
                    self.children.entry(parent).or_default().push(e.account.id);
                }
                self.accounts.insert(e.account.id, e.account.clone());
            }
            LedgerEvent::AccountClosed(e) => {
                if let Some(account) = self.accounts.remove(&e.account_id) {
                    if let Some(parent) = account.parent {
                        if let Some(siblings) = self.children.get_mut(&parent) {
                            siblings.retain(|c| *c != e.account_id);
                        }
                    }
                }
                self.children.remove(&e.account_id);
            }
            LedgerEvent::MovementPosted(e) => {
                self.insert_movement(e.movement.clone());
            }
            LedgerEvent::MovementValidated(e) => {
                if let Some(movement) = self.movements.get_mut(&e.movement_id) {
                    movement.state = MovementState::Validated;
                }
            }
            LedgerEvent::MovementReversed(e) => {
                self.insert_movement(e.reversal.clone());
                if let Some(reconciliation) = &e.reconciliation {
                    self.insert_reconciliation(reconciliation.clone());
                }
            }
            LedgerEvent::LinesReconciled(e) => {
                self.insert_reconciliation(e.reconciliation.clone());
            }
            LedgerEvent::SettlementAccrued(e) => {
                let period = match self.movements.get_mut(&e.movement_id) {
                    Some(movement) => {
                        if let Some(credit) =
                            movement.lines.iter_mut().find(|l| l.line_no == e.credit_line)
                        {
                            credit.hours += e.contribution;
                        }
                        movement.lines.push(e.debit_line.clone());
                        movement.period
                    }
                    None => return,
                };
                self.apply_line_delta(period, e.credit_account, e.contribution, Some(e.tier));
                self.apply_line_delta(
                    period,
                    e.debit_line.account,
                    e.debit_line.hours,
                    e.debit_line.tier,
                );
                *self.line_counts.entry(e.debit_line.account).or_default() += 1;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::OpenAccount(cmd) => self.handle_open_account(cmd),
            LedgerCommand::CloseAccount(cmd) => self.handle_close_account(cmd),
            LedgerCommand::PostMovement(cmd) => self.handle_post(cmd),
            LedgerCommand::ValidateMovement(cmd) => self.handle_validate(cmd),
            LedgerCommand::ReverseMovement(cmd) => self.handle_reverse(cmd),
            LedgerCommand::Reconcile(cmd) => self.handle_reconcile(cmd),
            LedgerCommand::RecordSettlement(cmd) => self.handle_record_settlement(cmd),
        }
    }
}

impl Ledger {
    fn insert_movement(&mut self, movement: Movement) {
        for line in &movement.lines {
            self.apply_line_delta(movement.period, line.account, line.hours, line.tier);
            *self.line_counts.entry(line.account).or_default() += 1;
        }
        self.movements.insert(movement.id, movement);
    }

    fn insert_reconciliation(&mut self, reconciliation: Reconciliation) {
        for line_ref in &reconciliation.lines {
            if let Some(movement) = self.movements.get_mut(&line_ref.movement) {
                if let Some(line) = movement
                    .lines
                    .iter_mut()
                    .find(|l| l.line_no == line_ref.line_no)
                {
                    line.reconciliation = Some(reconciliation.id);
                }
            }
        }
        self.reconciliations
            .insert(reconciliation.id, reconciliation);
    }

    fn apply_line_delta(
        &mut self,
        period: PeriodId,
        account: AccountId,
        hours: Hours,
        tier: Option<RateTier>,
    ) {
        for ancestor in self.self_and_ancestors(account) {
            let balance = self.balances.entry((ancestor, period)).or_default();
            balance.hours += hours;
            *balance.by_tier.entry(tier).or_default() += hours;
        }
    }

    fn ensure_account(&self, account: AccountId) -> Result<&Account, DomainError> {
        self.accounts.get(&account).ok_or(DomainError::NotFound)
    }

    /// Overdraft gate: simulate the deltas over the affected subtrees and
    /// reject the whole batch if any constrained account would end up below
    /// its floor.
    fn check_overdraft<I>(&self, period: PeriodId, deltas: I) -> Result<(), DomainError>
    where
        I: IntoIterator<Item = (AccountId, Hours)>,
    {
        let mut affected: HashMap<AccountId, Hours> = HashMap::new();
        for (account, hours) in deltas {
            for ancestor in self.self_and_ancestors(account) {
                *affected.entry(ancestor).or_default() += hours;
            }
        }

        for (account, delta) in affected {
            let Some(entry) = self.accounts.get(&account) else {
                continue;
            };
            let Some(floor) = entry.overdraft.floor() else {
                continue;
            };
            let current = self
                .balances
                .get(&(account, period))
                .map(|b| b.hours)
                .unwrap_or(Hours::ZERO);
            let next = current + delta;
            if !next.at_least(floor) {
                return Err(DomainError::OverdraftExceeded {
                    account,
                    requested: next,
                    limit: floor,
                });
            }
        }

        Ok(())
    }

    fn handle_open_account(&self, cmd: &OpenAccount) -> Result<Vec<LedgerEvent>, DomainError> {
        if self.accounts.contains_key(&cmd.account_id) {
            return Err(DomainError::conflict("account id already used"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be empty"));
        }
        if let Some(parent_id) = cmd.parent {
            let parent = self
                .accounts
                .get(&parent_id)
                .ok_or_else(|| DomainError::hierarchy("parent account does not exist"))?;
            if !cmd.category.nests_under(parent.category) {
                return Err(DomainError::hierarchy(format!(
                    "{:?} account cannot nest under {:?} parent",
                    cmd.category, parent.category
                )));
            }
        }

        Ok(vec![LedgerEvent::AccountOpened(AccountOpened {
            account: Account {
                id: cmd.account_id,
                name: cmd.name.clone(),
                parent: cmd.parent,
                category: cmd.category,
                managers: cmd.managers.clone(),
                overdraft: cmd.overdraft,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close_account(&self, cmd: &CloseAccount) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_account(cmd.account_id)?;
        if self
            .children
            .get(&cmd.account_id)
            .is_some_and(|c| !c.is_empty())
        {
            return Err(DomainError::conflict("account has sub-accounts"));
        }
        if self.line_counts.get(&cmd.account_id).copied().unwrap_or(0) > 0 {
            return Err(DomainError::conflict("account has postings"));
        }

        Ok(vec![LedgerEvent::AccountClosed(AccountClosed {
            account_id: cmd.account_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_post(&self, cmd: &PostMovement) -> Result<Vec<LedgerEvent>, DomainError> {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("movement must have lines"));
        }
        if self.movements.contains_key(&cmd.movement_id) {
            return Err(DomainError::conflict("movement id already used"));
        }
        for spec in &cmd.lines {
            self.ensure_account(spec.account)?;
        }
        check_balanced(cmd.lines.iter().map(|s| s.hours))?;
        self.check_overdraft(cmd.period, cmd.lines.iter().map(|s| (s.account, s.hours)))?;

        let lines = cmd
            .lines
            .iter()
            .enumerate()
            .map(|(i, spec)| MovementLine {
                line_no: (i + 1) as u32,
                account: spec.account,
                hours: spec.hours,
                tier: spec.tier,
                motive: spec.motive.clone(),
                reconciliation: None,
            })
            .collect();

        Ok(vec![LedgerEvent::MovementPosted(MovementPosted {
            movement: Movement {
                id: cmd.movement_id,
                period: cmd.period,
                motive: cmd.motive.clone(),
                colle: cmd.colle,
                state: cmd.state,
                lines,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_validate(&self, cmd: &ValidateMovement) -> Result<Vec<LedgerEvent>, DomainError> {
        let movement = self
            .movements
            .get(&cmd.movement_id)
            .ok_or(DomainError::NotFound)?;
        if movement.state == MovementState::Validated {
            return Err(DomainError::conflict("movement already validated"));
        }

        Ok(vec![LedgerEvent::MovementValidated(MovementValidated {
            movement_id: cmd.movement_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReverseMovement) -> Result<Vec<LedgerEvent>, DomainError> {
        let original = self
            .movements
            .get(&cmd.movement_id)
            .ok_or(DomainError::NotFound)?;
        if self.movements.contains_key(&cmd.reversal_id) {
            return Err(DomainError::conflict("reversal movement id already used"));
        }

        let lines: Vec<MovementLine> = original
            .lines
            .iter()
            .map(|line| MovementLine {
                line_no: line.line_no,
                account: line.account,
                hours: -line.hours,
                tier: line.tier,
                motive: line.motive.clone(),
                reconciliation: None,
            })
            .collect();

        // No overdraft gate on the reverse path: a reversal restores earlier
        // balances, it never requests new hours.
        let reconciliation = match cmd.reconciliation_id {
            Some(id) => {
                if self.reconciliations.contains_key(&id) {
                    return Err(DomainError::conflict("reconciliation id already used"));
                }
                let mut refs = Vec::new();
                for line in &original.lines {
                    if line.is_credit() && line.reconciliation.is_none() {
                        refs.push(LineRef {
                            movement: original.id,
                            line_no: line.line_no,
                        });
                        refs.push(LineRef {
                            movement: cmd.reversal_id,
                            line_no: line.line_no,
                        });
                    }
                }
                if refs.is_empty() {
                    None
                } else {
                    Some(Reconciliation {
                        id,
                        mode: ReconciliationMode::Total,
                        at: cmd.occurred_at,
                        lines: refs,
                    })
                }
            }
            None => None,
        };

        Ok(vec![LedgerEvent::MovementReversed(MovementReversed {
            original: cmd.movement_id,
            reversal: Movement {
                id: cmd.reversal_id,
                period: original.period,
                motive: format!("reversal of movement {}", original.id),
                colle: None,
                state: MovementState::Validated,
                lines,
            },
            reconciliation,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reconcile(&self, cmd: &Reconcile) -> Result<Vec<LedgerEvent>, DomainError> {
        if self.reconciliations.contains_key(&cmd.reconciliation_id) {
            return Err(DomainError::conflict("reconciliation id already used"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "reconciliation must reference lines",
            ));
        }

        let mut seen = HashSet::new();
        let mut hours = Vec::with_capacity(cmd.lines.len());
        for line_ref in &cmd.lines {
            if !seen.insert(*line_ref) {
                return Err(DomainError::validation("duplicate line reference"));
            }
            let line = self.line(line_ref).ok_or(DomainError::NotFound)?;
            if line.reconciliation.is_some() {
                return Err(DomainError::conflict("line already reconciled"));
            }
            hours.push(line.hours);
        }

        if cmd.mode == ReconciliationMode::Total {
            check_balanced(hours.into_iter())?;
        }

        Ok(vec![LedgerEvent::LinesReconciled(LinesReconciled {
            reconciliation: Reconciliation {
                id: cmd.reconciliation_id,
                mode: cmd.mode,
                at: cmd.occurred_at,
                lines: cmd.lines.clone(),
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_settlement(
        &self,
        cmd: &RecordSettlement,
    ) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_account(cmd.settlement_account)?;
        self.ensure_account(cmd.debit_account)?;
        if cmd.hours.duration.as_minutes() < 0 || cmd.hours.interrogation.as_minutes() < 0 {
            return Err(DomainError::validation(
                "settlement contribution must not be negative",
            ));
        }
        self.check_overdraft(
            cmd.period,
            [
                (cmd.settlement_account, cmd.hours),
                (cmd.debit_account, -cmd.hours),
            ],
        )?;

        let mut events = Vec::new();
        let next_line_no = match self.movements.get(&cmd.movement_id) {
            Some(movement) => {
                if movement.state != MovementState::Draft {
                    return Err(DomainError::conflict(
                        "settlement movement already validated",
                    ));
                }
                if movement.period != cmd.period {
                    return Err(DomainError::validation("settlement period mismatch"));
                }
                let credit = movement.line(1).ok_or_else(|| {
                    DomainError::invariant("settlement movement has no credit line")
                })?;
                if credit.account != cmd.settlement_account || credit.tier != Some(cmd.tier) {
                    return Err(DomainError::invariant(
                        "settlement credit line does not match release line",
                    ));
                }
                movement.lines.len() as u32 + 1
            }
            None => {
                events.push(LedgerEvent::MovementPosted(MovementPosted {
                    movement: Movement {
                        id: cmd.movement_id,
                        period: cmd.period,
                        motive: cmd.motive.clone(),
                        colle: None,
                        state: MovementState::Draft,
                        lines: vec![MovementLine {
                            line_no: 1,
                            account: cmd.settlement_account,
                            hours: Hours::ZERO,
                            tier: Some(cmd.tier),
                            motive: cmd.motive.clone(),
                            reconciliation: None,
                        }],
                    },
                    occurred_at: cmd.occurred_at,
                }));
                2
            }
        };

        events.push(LedgerEvent::SettlementAccrued(SettlementAccrued {
            movement_id: cmd.movement_id,
            credit_line: 1,
            credit_account: cmd.settlement_account,
            tier: cmd.tier,
            contribution: cmd.hours,
            debit_line: MovementLine {
                line_no: next_line_no,
                account: cmd.debit_account,
                hours: -cmd.hours,
                tier: Some(cmd.tier),
                motive: cmd.line_motive.clone(),
                reconciliation: None,
            },
            occurred_at: cmd.occurred_at,
        }));

        Ok(events)
    }
}

/// Both components must sum to zero; accumulation in i128 so pathological
/// inputs cannot wrap.
fn check_balanced<I: Iterator<Item = Hours>>(hours: I) -> Result<(), DomainError> {
    let mut duration: i128 = 0;
    let mut interrogation: i128 = 0;
    for h in hours {
        duration += h.duration.as_minutes() as i128;
        interrogation += h.interrogation.as_minutes() as i128;
    }
    if duration != 0 || interrogation != 0 {
        return Err(DomainError::Unbalanced {
            duration: Minutes::minutes(duration as i64),
            interrogation: Minutes::minutes(interrogation as i64),
        });
    }
    Ok(())
}
