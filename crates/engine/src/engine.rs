//! The synchronous application service tying the aggregates together.
//!
//! Execution follows the journal-then-publish pipeline: a command is decided
//! by the pure `handle` of every touched aggregate first; only when all
//! decisions succeed are the events journaled, applied, and published. A
//! failure anywhere leaves no observable change. Operations take `&mut
//! self`, so two mutating operations are serialized by ownership; there is
//! no async, no partial progress, and nothing to cancel.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use kholle_core::{
    AccountId, Aggregate, AggregateId, AggregateRoot, ColleId, DomainError, DomainResult,
    ExpectedVersion, Hours, MovementId, PeriodId, RateTier, UserId,
};
use kholle_events::{EventBus, EventEnvelope, InMemoryEventBus, Projection, Subscription};
use kholle_ledger::{
    AccountCategory, Balance, CloseAccount, Ledger, LedgerCommand, LedgerEvent, LedgerId, LineRef,
    LineSpec, MovementState, OpenAccount, OverdraftPolicy, PostMovement, Reconcile,
    ReconciliationId, ReconciliationMode, RecordSettlement, ReverseMovement, ValidateMovement,
    transfer_lines,
};
use kholle_release::{
    AddColle, LinePosting, OpenRelease, PayLine, PayRelease, RecordExternal, Release,
    ReleaseCommand, ReleaseEvent, ReleaseId, ReleaseLineState, SettlementRef,
};

use crate::chart::{
    AuthorityAccounts, AuthorityRef, Chart, ChartRoots, ClassRef, EntityRef, EstablishmentAccounts,
    EstablishmentRef, ExaminerAccounts, ExaminerRef, SubjectRef,
};
use crate::colle::ColleEvent;
use crate::journal::{CoreEvent, Journal};

const LEDGER_STREAM: &str = "ledger.book";
const RELEASE_STREAM: &str = "release.batch";

/// The in-process accounting engine.
///
/// Owns the ledger aggregate, every release batch, the chart-of-accounts
/// registry, the event journal, and the bus read models subscribe to.
#[derive(Debug)]
pub struct Engine {
    ledger: Ledger,
    releases: HashMap<ReleaseId, Release>,
    chart: Chart,
    /// Scheduling movement per colle, for cancellation.
    colle_movements: HashMap<ColleId, MovementId>,
    /// Release back-reference per colle, set exactly once.
    colle_releases: HashMap<ColleId, ReleaseId>,
    journal: Journal,
    bus: InMemoryEventBus<EventEnvelope<CoreEvent>>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            ledger: Ledger::empty(LedgerId::new(AggregateId::new())),
            releases: HashMap::new(),
            chart: Chart::new(),
            colle_movements: HashMap::new(),
            colle_releases: HashMap::new(),
            journal: Journal::new(),
            bus: InMemoryEventBus::new(),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn release(&self, id: ReleaseId) -> Option<&Release> {
        self.releases.get(&id)
    }

    /// Subtree balance of an account for a period.
    pub fn balance(&self, account: AccountId, period: PeriodId) -> Balance {
        self.ledger.balance(account, period)
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Subscribe to committed events (projections, reporting).
    pub fn subscribe(&self) -> Subscription<EventEnvelope<CoreEvent>> {
        self.bus.subscribe()
    }

    /// Rebuild a read model from scratch by replaying the whole journal.
    pub fn replay<P: Projection<Ev = CoreEvent>>(&self, projection: &mut P) {
        for envelope in self.journal.records() {
            projection.apply(envelope);
        }
    }

    /// The scheduling movement recorded for a colle, if any.
    pub fn scheduling_movement(&self, colle: ColleId) -> Option<MovementId> {
        self.colle_movements.get(&colle).copied()
    }

    /// The release a colle has been attached to, if any.
    pub fn release_of(&self, colle: ColleId) -> Option<ReleaseId> {
        self.colle_releases.get(&colle).copied()
    }

    // ------------------------------------------------------------------
    // Commit pipeline
    // ------------------------------------------------------------------

    fn publish(&self, envelope: EventEnvelope<CoreEvent>) {
        if let Err(err) = self.bus.publish(envelope) {
            // Events are already journaled; losing a live notification only
            // delays read models until the next replay.
            warn!(?err, "event publication failed");
        }
    }

    fn commit_ledger(&mut self, events: Vec<LedgerEvent>) -> DomainResult<()> {
        let stream = self.ledger.id_typed().0;
        for event in events {
            let expected = ExpectedVersion::Exact(self.ledger.version());
            let envelope =
                self.journal
                    .append(stream, LEDGER_STREAM, expected, CoreEvent::Ledger(event.clone()))?;
            self.ledger.apply(&event);
            self.publish(envelope);
        }
        Ok(())
    }

    fn commit_release(&mut self, release_id: ReleaseId, events: Vec<ReleaseEvent>) -> DomainResult<()> {
        for event in events {
            let expected = {
                let release = self.releases.get(&release_id).ok_or(DomainError::NotFound)?;
                ExpectedVersion::Exact(release.version())
            };
            let envelope = self.journal.append(
                release_id.0,
                RELEASE_STREAM,
                expected,
                CoreEvent::Release(event.clone()),
            )?;
            if let Some(release) = self.releases.get_mut(&release_id) {
                release.apply(&event);
            }
            self.publish(envelope);
        }
        Ok(())
    }

    fn execute_ledger(&mut self, command: LedgerCommand) -> DomainResult<()> {
        let events = self.ledger.handle(&command)?;
        self.commit_ledger(events)
    }

    // ------------------------------------------------------------------
    // Chart of accounts
    // ------------------------------------------------------------------

    /// Open an account in the tree. Fails with `InvalidHierarchy` when the
    /// parent is missing or the category does not fit the parent's role.
    pub fn open_account(
        &mut self,
        name: String,
        parent: Option<AccountId>,
        category: AccountCategory,
        managers: HashSet<UserId>,
        overdraft: OverdraftPolicy,
    ) -> DomainResult<AccountId> {
        let account_id = AccountId::new();
        self.execute_ledger(LedgerCommand::OpenAccount(OpenAccount {
            account_id,
            name,
            parent,
            category,
            managers,
            overdraft,
            occurred_at: Utc::now(),
        }))?;
        Ok(account_id)
    }

    /// Close an account. Blocked while it has sub-accounts or postings.
    pub fn close_account(&mut self, account_id: AccountId) -> DomainResult<()> {
        self.execute_ledger(LedgerCommand::CloseAccount(CloseAccount {
            account_id,
            occurred_at: Utc::now(),
        }))
    }

    fn ensure_roots(&mut self) -> DomainResult<ChartRoots> {
        if let Some(roots) = self.chart.roots() {
            return Ok(roots);
        }
        let authorities = self.open_account(
            "Authorities".to_string(),
            None,
            AccountCategory::Revenue,
            HashSet::new(),
            OverdraftPolicy::unlimited(),
        )?;
        let payments = self.open_account(
            "Payments".to_string(),
            None,
            AccountCategory::Expense,
            HashSet::new(),
            OverdraftPolicy::unlimited(),
        )?;
        let establishments = self.open_account(
            "Establishments".to_string(),
            None,
            AccountCategory::Asset,
            HashSet::new(),
            OverdraftPolicy::FORBIDDEN,
        )?;
        let examiners = self.open_account(
            "Examiners".to_string(),
            None,
            AccountCategory::Asset,
            HashSet::new(),
            OverdraftPolicy::FORBIDDEN,
        )?;
        let roots = ChartRoots {
            authorities,
            payments,
            establishments,
            examiners,
        };
        self.chart.set_roots(roots);
        Ok(roots)
    }

    fn ensure_authority(&mut self, authority: &AuthorityRef) -> DomainResult<AuthorityAccounts> {
        if let Some(accounts) = self.chart.authority(authority.id) {
            return Ok(accounts);
        }
        let roots = self.ensure_roots()?;
        // Funding roots hand out hours they never hold: unlimited overdraft.
        let allotment = self.open_account(
            authority.name.clone(),
            Some(roots.authorities),
            AccountCategory::Revenue,
            HashSet::new(),
            OverdraftPolicy::unlimited(),
        )?;
        let payment = self.open_account(
            authority.name.clone(),
            Some(roots.payments),
            AccountCategory::Expense,
            HashSet::new(),
            OverdraftPolicy::unlimited(),
        )?;
        let accounts = AuthorityAccounts { allotment, payment };
        self.chart.insert_authority(authority.id, accounts);
        Ok(accounts)
    }

    fn ensure_establishment(
        &mut self,
        establishment: &EstablishmentRef,
    ) -> DomainResult<EstablishmentAccounts> {
        if let Some(accounts) = self.chart.establishment(establishment.id) {
            return Ok(accounts);
        }
        self.ensure_authority(&establishment.authority)?;
        let roots = self.ensure_roots()?;
        let base = self.open_account(
            establishment.name.clone(),
            Some(roots.establishments),
            AccountCategory::Asset,
            HashSet::new(),
            OverdraftPolicy::FORBIDDEN,
        )?;
        let allotment = self.open_account(
            "Allotment".to_string(),
            Some(base),
            AccountCategory::Asset,
            HashSet::new(),
            OverdraftPolicy::FORBIDDEN,
        )?;
        let releases = self.open_account(
            "Releases".to_string(),
            Some(base),
            AccountCategory::Asset,
            HashSet::new(),
            OverdraftPolicy::FORBIDDEN,
        )?;
        let accounts = EstablishmentAccounts {
            authority: establishment.authority.id,
            base,
            allotment,
            releases,
        };
        self.chart.insert_establishment(establishment.id, accounts);
        Ok(accounts)
    }

    fn ensure_class(&mut self, class: &ClassRef) -> DomainResult<AccountId> {
        if let Some(account) = self.chart.class(class.id) {
            return Ok(account);
        }
        let establishment = self.ensure_establishment(&class.establishment)?;
        let account = self.open_account(
            class.name.clone(),
            Some(establishment.allotment),
            AccountCategory::Asset,
            HashSet::new(),
            OverdraftPolicy::FORBIDDEN,
        )?;
        self.chart.insert_class(class.id, account);
        Ok(account)
    }

    fn ensure_subject(&mut self, class: &ClassRef, subject: &SubjectRef) -> DomainResult<AccountId> {
        if let Some(account) = self.chart.subject(subject.id) {
            return Ok(account);
        }
        let class_account = self.ensure_class(class)?;
        let account = self.open_account(
            subject.name.clone(),
            Some(class_account),
            AccountCategory::Asset,
            HashSet::new(),
            OverdraftPolicy::FORBIDDEN,
        )?;
        self.chart.insert_subject(subject.id, account);
        Ok(account)
    }

    fn ensure_examiner(&mut self, examiner: &ExaminerRef) -> DomainResult<ExaminerAccounts> {
        if let Some(accounts) = self.chart.examiner(examiner.id) {
            return Ok(accounts);
        }
        let roots = self.ensure_roots()?;
        let managers = HashSet::from([examiner.id]);
        let base = self.open_account(
            examiner.name.clone(),
            Some(roots.examiners),
            AccountCategory::Asset,
            managers.clone(),
            OverdraftPolicy::FORBIDDEN,
        )?;
        let expected = self.open_account(
            "Expected colles".to_string(),
            Some(base),
            AccountCategory::Asset,
            managers.clone(),
            OverdraftPolicy::FORBIDDEN,
        )?;
        let performed = self.open_account(
            "Performed colles".to_string(),
            Some(base),
            AccountCategory::Asset,
            managers,
            OverdraftPolicy::FORBIDDEN,
        )?;
        let accounts = ExaminerAccounts {
            base,
            expected,
            performed,
        };
        self.chart.insert_examiner(examiner.id, accounts);
        Ok(accounts)
    }

    /// Find or lazily create the ledger account of an institutional entity.
    pub fn account_for(&mut self, entity: &EntityRef) -> DomainResult<AccountId> {
        match entity {
            EntityRef::Authority(authority) => {
                Ok(self.ensure_authority(authority)?.allotment)
            }
            EntityRef::Establishment(establishment) => {
                Ok(self.ensure_establishment(establishment)?.allotment)
            }
            EntityRef::Class(class) => self.ensure_class(class),
            EntityRef::Subject { class, subject } => self.ensure_subject(class, subject),
            EntityRef::Examiner(examiner) => Ok(self.ensure_examiner(examiner)?.base),
        }
    }

    // ------------------------------------------------------------------
    // Ledger operations
    // ------------------------------------------------------------------

    /// Post an arbitrary balanced movement.
    pub fn post_movement(
        &mut self,
        period: PeriodId,
        motive: &str,
        state: MovementState,
        lines: Vec<LineSpec>,
    ) -> DomainResult<MovementId> {
        let movement_id = MovementId::new();
        self.execute_ledger(LedgerCommand::PostMovement(PostMovement {
            movement_id,
            period,
            motive: motive.to_string(),
            colle: None,
            state,
            lines,
            occurred_at: Utc::now(),
        }))?;
        debug!(movement = %movement_id, motive, "movement posted");
        Ok(movement_id)
    }

    /// The workhorse two-line transfer, validated immediately.
    pub fn simple_transfer(
        &mut self,
        debit_account: AccountId,
        credit_account: AccountId,
        hours: Hours,
        tier: Option<RateTier>,
        period: PeriodId,
        motive: &str,
    ) -> DomainResult<MovementId> {
        self.post_movement(
            period,
            motive,
            MovementState::Validated,
            transfer_lines(debit_account, credit_account, hours, tier, motive),
        )
    }

    pub fn validate_movement(&mut self, movement_id: MovementId) -> DomainResult<()> {
        self.execute_ledger(LedgerCommand::ValidateMovement(ValidateMovement {
            movement_id,
            occurred_at: Utc::now(),
        }))
    }

    /// Reverse a movement; `reconcile` groups the original credits with the
    /// mirrored debits in one total reconciliation.
    pub fn reverse_movement(
        &mut self,
        movement_id: MovementId,
        reconcile: bool,
    ) -> DomainResult<MovementId> {
        let reversal_id = MovementId::new();
        let reconciliation_id = reconcile.then(|| ReconciliationId::new(AggregateId::new()));
        self.execute_ledger(LedgerCommand::ReverseMovement(ReverseMovement {
            movement_id,
            reversal_id,
            reconciliation_id,
            occurred_at: Utc::now(),
        }))?;
        info!(original = %movement_id, reversal = %reversal_id, "movement reversed");
        Ok(reversal_id)
    }

    fn reconcile(
        &mut self,
        mode: ReconciliationMode,
        lines: Vec<LineRef>,
    ) -> DomainResult<ReconciliationId> {
        let reconciliation_id = ReconciliationId::new(AggregateId::new());
        self.execute_ledger(LedgerCommand::Reconcile(Reconcile {
            reconciliation_id,
            mode,
            lines,
            occurred_at: Utc::now(),
        }))?;
        Ok(reconciliation_id)
    }

    pub fn reconcile_partial(&mut self, lines: Vec<LineRef>) -> DomainResult<ReconciliationId> {
        self.reconcile(ReconciliationMode::Partial, lines)
    }

    pub fn reconcile_total(&mut self, lines: Vec<LineRef>) -> DomainResult<ReconciliationId> {
        self.reconcile(ReconciliationMode::Total, lines)
    }

    /// Authority → establishment allotment: the way hours enter the system.
    pub fn grant_allotment(
        &mut self,
        establishment: &EstablishmentRef,
        period: PeriodId,
        hours: Hours,
        motive: &str,
    ) -> DomainResult<MovementId> {
        let accounts = self.ensure_establishment(establishment)?;
        let authority = self
            .chart
            .authority(accounts.authority)
            .ok_or(DomainError::NotFound)?;
        let movement = self.simple_transfer(
            authority.allotment,
            accounts.allotment,
            hours,
            None,
            period,
            motive,
        )?;
        info!(establishment = %establishment.id, %hours, "allotment granted");
        Ok(movement)
    }

    // ------------------------------------------------------------------
    // Colle notifications (scheduling collaborators)
    // ------------------------------------------------------------------

    /// A colle was put on the colloscope: subject allotment → examiner
    /// "expected".
    pub fn notify_scheduled(&mut self, colle: &ColleEvent) -> DomainResult<MovementId> {
        if self.colle_movements.contains_key(&colle.id) {
            return Err(DomainError::conflict("colle already scheduled"));
        }
        let subject_account = self.ensure_subject(&colle.class, &colle.subject)?;
        let examiner = self.ensure_examiner(&colle.examiner)?;

        let movement_id = MovementId::new();
        let motive = format!("colle scheduled in {}", colle.class.name);
        self.execute_ledger(LedgerCommand::PostMovement(PostMovement {
            movement_id,
            period: colle.period,
            motive: motive.clone(),
            colle: Some(colle.id),
            state: MovementState::Validated,
            lines: transfer_lines(subject_account, examiner.expected, colle.hours(), None, motive),
            occurred_at: Utc::now(),
        }))?;
        self.colle_movements.insert(colle.id, movement_id);
        info!(colle = %colle.id, movement = %movement_id, "colle scheduled");
        Ok(movement_id)
    }

    /// The colle took place: examiner "expected" → "performed".
    pub fn notify_performed(&mut self, colle: &ColleEvent) -> DomainResult<MovementId> {
        let examiner = self.ensure_examiner(&colle.examiner)?;

        let movement_id = MovementId::new();
        let motive = format!("colle performed in {}", colle.class.name);
        self.execute_ledger(LedgerCommand::PostMovement(PostMovement {
            movement_id,
            period: colle.period,
            motive: motive.clone(),
            colle: Some(colle.id),
            state: MovementState::Validated,
            lines: transfer_lines(
                examiner.expected,
                examiner.performed,
                colle.hours(),
                None,
                motive,
            ),
            occurred_at: Utc::now(),
        }))?;
        info!(colle = %colle.id, movement = %movement_id, "colle performed");
        Ok(movement_id)
    }

    /// The colle was cancelled: reverse its scheduling movement, reconciled.
    pub fn notify_cancelled(&mut self, colle: &ColleEvent) -> DomainResult<MovementId> {
        let original = *self
            .colle_movements
            .get(&colle.id)
            .ok_or(DomainError::NotFound)?;
        let reversal = self.reverse_movement(original, true)?;
        info!(colle = %colle.id, movement = %reversal, "colle cancelled");
        Ok(reversal)
    }

    // ------------------------------------------------------------------
    // Release workflow
    // ------------------------------------------------------------------

    /// Open a new payout batch with its dedicated settlement account.
    pub fn open_release(
        &mut self,
        establishment: &EstablishmentRef,
        period: PeriodId,
        date: DateTime<Utc>,
    ) -> DomainResult<ReleaseId> {
        let accounts = self.ensure_establishment(establishment)?;

        let release_id = ReleaseId::new(AggregateId::new());
        let settlement_account = AccountId::new();
        let now = Utc::now();

        let account_cmd = LedgerCommand::OpenAccount(OpenAccount {
            account_id: settlement_account,
            name: format!("Release of {}", date.format("%Y-%m-%d")),
            parent: Some(accounts.releases),
            category: AccountCategory::Asset,
            managers: HashSet::new(),
            overdraft: OverdraftPolicy::FORBIDDEN,
            occurred_at: now,
        });
        let release_cmd = ReleaseCommand::OpenRelease(OpenRelease {
            release_id,
            period,
            establishment: establishment.id,
            settlement_account,
            date,
            occurred_at: now,
        });

        // Decide everything before applying anything.
        let ledger_events = self.ledger.handle(&account_cmd)?;
        let release = Release::empty(release_id);
        let release_events = release.handle(&release_cmd)?;

        self.releases.insert(release_id, release);
        self.commit_ledger(ledger_events)?;
        self.commit_release(release_id, release_events)?;
        info!(release = %release_id, establishment = %establishment.id, "release opened");
        Ok(release_id)
    }

    /// Attach a performed colle to a release.
    ///
    /// A colle belongs to at most one release; re-adding is a benign no-op,
    /// so batch re-runs stay idempotent at the event level. Each call keeps
    /// the line's settlement movement balanced: the credit line grows to the
    /// new running total and a per-colle debit is posted against the
    /// examiner's "performed" account in the same movement.
    pub fn add_colle_to_release(
        &mut self,
        release_id: ReleaseId,
        colle: &ColleEvent,
    ) -> DomainResult<()> {
        if let Some(existing) = self.colle_releases.get(&colle.id) {
            debug!(colle = %colle.id, release = %existing, "colle already released, skipping");
            return Ok(());
        }
        let examiner = self.ensure_examiner(&colle.examiner)?;

        let release = self.releases.get(&release_id).ok_or(DomainError::NotFound)?;
        let settlement_account = release
            .settlement_account()
            .ok_or_else(|| DomainError::invariant("release has no settlement account"))?;
        let period = release
            .period()
            .ok_or_else(|| DomainError::invariant("release has no period"))?;
        let date_label = release
            .date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        let tier = colle.tier();
        let hours = colle.hours();

        let (movement_id, settlement) = match release.line(colle.examiner.id, tier) {
            Some(line) => match line.posting {
                LinePosting::Posted { movement, .. } => (movement, None),
                LinePosting::Uninitialized => {
                    return Err(DomainError::invariant(
                        "release line has no settlement posting",
                    ));
                }
            },
            None => {
                let movement = MovementId::new();
                (
                    movement,
                    Some(SettlementRef {
                        movement,
                        line_no: 1,
                    }),
                )
            }
        };

        let now = Utc::now();
        let ledger_cmd = LedgerCommand::RecordSettlement(RecordSettlement {
            movement_id,
            period,
            motive: format!("release of {date_label}"),
            settlement_account,
            tier,
            debit_account: examiner.performed,
            hours,
            line_motive: format!("colle in {}", colle.class.name),
            occurred_at: now,
        });
        let release_cmd = ReleaseCommand::AddColle(AddColle {
            colle: colle.id,
            examiner: colle.examiner.id,
            tier,
            hours,
            settlement,
            occurred_at: now,
        });

        // Decide on both aggregates before applying to either.
        let ledger_events = self.ledger.handle(&ledger_cmd)?;
        let release_events = match release.handle(&release_cmd) {
            Ok(events) => events,
            Err(DomainError::AlreadyReleased) => {
                debug!(colle = %colle.id, release = %release_id, "colle already in release");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        self.commit_ledger(ledger_events)?;
        self.commit_release(release_id, release_events)?;
        self.colle_releases.insert(colle.id, release_id);
        info!(colle = %colle.id, release = %release_id, %hours, "colle released");
        Ok(())
    }

    /// Mark one release line as paid; the release cascades to paid with its
    /// last payable line.
    pub fn pay_release_line(
        &mut self,
        release_id: ReleaseId,
        examiner: UserId,
        tier: RateTier,
        at: Option<DateTime<Utc>>,
    ) -> DomainResult<()> {
        let at = at.unwrap_or_else(Utc::now);
        let release = self.releases.get(&release_id).ok_or(DomainError::NotFound)?;
        let events = release.handle(&ReleaseCommand::PayLine(PayLine {
            examiner,
            tier,
            at,
            occurred_at: Utc::now(),
        }))?;
        self.commit_release(release_id, events)?;
        info!(release = %release_id, %examiner, "release line paid");
        Ok(())
    }

    /// Record the payment event for a whole release. Moving the hours to
    /// the payment account is a separate, explicit settlement step.
    pub fn pay_release(
        &mut self,
        release_id: ReleaseId,
        at: Option<DateTime<Utc>>,
    ) -> DomainResult<()> {
        let at = at.unwrap_or_else(Utc::now);
        let release = self.releases.get(&release_id).ok_or(DomainError::NotFound)?;
        let events = release.handle(&ReleaseCommand::PayRelease(PayRelease {
            at,
            occurred_at: Utc::now(),
        }))?;
        self.commit_release(release_id, events)?;
        info!(release = %release_id, "release paid");
        Ok(())
    }

    /// Mark that an outside payroll system has logged a line. Moves no
    /// hours.
    pub fn record_line_external(
        &mut self,
        release_id: ReleaseId,
        examiner: UserId,
        tier: RateTier,
    ) -> DomainResult<()> {
        let release = self.releases.get(&release_id).ok_or(DomainError::NotFound)?;
        let events = release.handle(&ReleaseCommand::RecordExternal(RecordExternal {
            examiner,
            tier,
            occurred_at: Utc::now(),
        }))?;
        self.commit_release(release_id, events)
    }

    /// The explicit, auditable settlement of a paid line: settlement
    /// account → the authority's payment account.
    pub fn settle_release_line_payment(
        &mut self,
        release_id: ReleaseId,
        examiner: UserId,
        tier: RateTier,
    ) -> DomainResult<MovementId> {
        let (settlement_account, period, hours, date_label, authority_id) = {
            let release = self.releases.get(&release_id).ok_or(DomainError::NotFound)?;
            let line = release.line(examiner, tier).ok_or(DomainError::NotFound)?;
            if line.state == ReleaseLineState::New {
                return Err(DomainError::conflict("release line not yet paid"));
            }
            let settlement_account = release
                .settlement_account()
                .ok_or_else(|| DomainError::invariant("release has no settlement account"))?;
            let period = release
                .period()
                .ok_or_else(|| DomainError::invariant("release has no period"))?;
            let establishment = release
                .establishment()
                .ok_or_else(|| DomainError::invariant("release has no establishment"))?;
            let authority_id = self
                .chart
                .establishment(establishment)
                .ok_or(DomainError::NotFound)?
                .authority;
            let date_label = release
                .date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            (settlement_account, period, line.hours, date_label, authority_id)
        };

        let payment_account = self
            .chart
            .authority(authority_id)
            .ok_or(DomainError::NotFound)?
            .payment;

        self.simple_transfer(
            settlement_account,
            payment_account,
            hours,
            Some(tier),
            period,
            &format!("payment of release of {date_label}"),
        )
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
