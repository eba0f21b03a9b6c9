use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kholle_core::{
    AccountId, Aggregate, AggregateId, AggregateRoot, ColleId, DomainError, EstablishmentId,
    Hours, MovementId, PeriodId, RateTier, UserId,
};
use kholle_events::Event;

/// Release identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseId(pub AggregateId);

impl ReleaseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Release lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseState {
    New,
    Paid,
}

/// Release-line lifecycle. `ExternallyRecorded` marks that an outside
/// payroll system has separately logged the amount; it moves no hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseLineState {
    New,
    Paid,
    ExternallyRecorded,
}

/// Address of a settlement movement line in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRef {
    pub movement: MovementId,
    pub line_no: u32,
}

/// Link between a release line and its ledger posting.
///
/// A line starts `Uninitialized` and becomes `Posted` the moment its
/// zero-valued settlement movement line is created: an explicit variant
/// rather than a nullable, lazily-filled field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinePosting {
    Uninitialized,
    Posted { movement: MovementId, line_no: u32 },
}

impl LinePosting {
    pub fn settlement(&self) -> Option<SettlementRef> {
        match self {
            LinePosting::Uninitialized => None,
            LinePosting::Posted { movement, line_no } => Some(SettlementRef {
                movement: *movement,
                line_no: *line_no,
            }),
        }
    }
}

/// One payable line, keyed by (examiner, rate tier) within its release.
///
/// `hours` mirrors the credit side of the line's settlement posting; both
/// grow together, one colle at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLine {
    pub examiner: UserId,
    pub tier: RateTier,
    pub hours: Hours,
    pub state: ReleaseLineState,
    pub paid_at: Option<DateTime<Utc>>,
    pub posting: LinePosting,
}

/// Aggregate root: Release (payout batch).
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    id: ReleaseId,
    period: Option<PeriodId>,
    establishment: Option<EstablishmentId>,
    settlement_account: Option<AccountId>,
    date: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    state: ReleaseState,
    lines: Vec<ReleaseLine>,
    colles: HashSet<ColleId>,
    version: u64,
    created: bool,
}

impl Release {
    /// Empty aggregate for rehydration.
    pub fn empty(id: ReleaseId) -> Self {
        Self {
            id,
            period: None,
            establishment: None,
            settlement_account: None,
            date: None,
            paid_at: None,
            state: ReleaseState::New,
            lines: Vec::new(),
            colles: HashSet::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReleaseId {
        self.id
    }

    pub fn state(&self) -> ReleaseState {
        self.state
    }

    pub fn period(&self) -> Option<PeriodId> {
        self.period
    }

    pub fn establishment(&self) -> Option<EstablishmentId> {
        self.establishment
    }

    pub fn settlement_account(&self) -> Option<AccountId> {
        self.settlement_account
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn lines(&self) -> &[ReleaseLine] {
        &self.lines
    }

    pub fn line(&self, examiner: UserId, tier: RateTier) -> Option<&ReleaseLine> {
        self.lines
            .iter()
            .find(|l| l.examiner == examiner && l.tier == tier)
    }

    pub fn contains_colle(&self, colle: ColleId) -> bool {
        self.colles.contains(&colle)
    }

    /// Sum over all lines of the batch.
    pub fn total_hours(&self) -> Hours {
        self.lines.iter().map(|l| l.hours).sum()
    }
}

impl AggregateRoot for Release {
    type Id = ReleaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenRelease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRelease {
    pub release_id: ReleaseId,
    pub period: PeriodId,
    pub establishment: EstablishmentId,
    pub settlement_account: AccountId,
    pub date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddColle.
///
/// `settlement` carries the ledger posting for the line and must be given
/// exactly when the (examiner, tier) line does not exist yet; the caller
/// opens the zero-valued settlement movement in the same atomic step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddColle {
    pub colle: ColleId,
    pub examiner: UserId,
    pub tier: RateTier,
    pub hours: Hours,
    pub settlement: Option<SettlementRef>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PayLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayLine {
    pub examiner: UserId,
    pub tier: RateTier,
    pub at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PayRelease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayRelease {
    pub at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordExternal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExternal {
    pub examiner: UserId,
    pub tier: RateTier,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseCommand {
    OpenRelease(OpenRelease),
    AddColle(AddColle),
    PayLine(PayLine),
    PayRelease(PayRelease),
    RecordExternal(RecordExternal),
}

/// Event: ReleaseOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOpened {
    pub release_id: ReleaseId,
    pub period: PeriodId,
    pub establishment: EstablishmentId,
    pub settlement_account: AccountId,
    pub date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ColleAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColleAdded {
    pub colle: ColleId,
    pub examiner: UserId,
    pub tier: RateTier,
    pub hours: Hours,
    /// Present exactly when this colle opened a new line.
    pub settlement: Option<SettlementRef>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePaid {
    pub examiner: UserId,
    pub tier: RateTier,
    pub at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReleasePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePaid {
    pub at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineExternallyRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineExternallyRecorded {
    pub examiner: UserId,
    pub tier: RateTier,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseEvent {
    ReleaseOpened(ReleaseOpened),
    ColleAdded(ColleAdded),
    LinePaid(LinePaid),
    ReleasePaid(ReleasePaid),
    LineExternallyRecorded(LineExternallyRecorded),
}

impl Event for ReleaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReleaseEvent::ReleaseOpened(_) => "release.batch.opened",
            ReleaseEvent::ColleAdded(_) => "release.batch.colle_added",
            ReleaseEvent::LinePaid(_) => "release.line.paid",
            ReleaseEvent::ReleasePaid(_) => "release.batch.paid",
            ReleaseEvent::LineExternallyRecorded(_) => "release.line.externally_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReleaseEvent::ReleaseOpened(e) => e.occurred_at,
            ReleaseEvent::ColleAdded(e) => e.occurred_at,
            ReleaseEvent::LinePaid(e) => e.occurred_at,
            ReleaseEvent::ReleasePaid(e) => e.occurred_at,
            ReleaseEvent::LineExternallyRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Release {
    type Command = ReleaseCommand;
    type Event = ReleaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReleaseEvent::ReleaseOpened(e) => {
                self.id = e.release_id;
                self.period = Some(e.period);
                self.establishment = Some(e.establishment);
                self.settlement_account = Some(e.settlement_account);
                self.date = Some(e.date);
                self.state = ReleaseState::New;
                self.created = true;
            }
            ReleaseEvent::ColleAdded(e) => {
                self.colles.insert(e.colle);
                match self
                    .lines
                    .iter_mut()
                    .find(|l| l.examiner == e.examiner && l.tier == e.tier)
                {
                    Some(line) => line.hours += e.hours,
                    None => {
                        let posting = match e.settlement {
                            Some(s) => LinePosting::Posted {
                                movement: s.movement,
                                line_no: s.line_no,
                            },
                            None => LinePosting::Uninitialized,
                        };
                        self.lines.push(ReleaseLine {
                            examiner: e.examiner,
                            tier: e.tier,
                            hours: e.hours,
                            state: ReleaseLineState::New,
                            paid_at: None,
                            posting,
                        });
                    }
                }
            }
            ReleaseEvent::LinePaid(e) => {
                if let Some(line) = self
                    .lines
                    .iter_mut()
                    .find(|l| l.examiner == e.examiner && l.tier == e.tier)
                {
                    line.state = ReleaseLineState::Paid;
                    line.paid_at = Some(e.at);
                }
            }
            ReleaseEvent::ReleasePaid(e) => {
                self.state = ReleaseState::Paid;
                self.paid_at = Some(e.at);
            }
            ReleaseEvent::LineExternallyRecorded(e) => {
                if let Some(line) = self
                    .lines
                    .iter_mut()
                    .find(|l| l.examiner == e.examiner && l.tier == e.tier)
                {
                    line.state = ReleaseLineState::ExternallyRecorded;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReleaseCommand::OpenRelease(cmd) => self.handle_open(cmd),
            ReleaseCommand::AddColle(cmd) => self.handle_add_colle(cmd),
            ReleaseCommand::PayLine(cmd) => self.handle_pay_line(cmd),
            ReleaseCommand::PayRelease(cmd) => self.handle_pay(cmd),
            ReleaseCommand::RecordExternal(cmd) => self.handle_record_external(cmd),
        }
    }
}

impl Release {
    fn handle_open(&self, cmd: &OpenRelease) -> Result<Vec<ReleaseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("release already exists"));
        }

        Ok(vec![ReleaseEvent::ReleaseOpened(ReleaseOpened {
            release_id: cmd.release_id,
            period: cmd.period,
            establishment: cmd.establishment,
            settlement_account: cmd.settlement_account,
            date: cmd.date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_colle(&self, cmd: &AddColle) -> Result<Vec<ReleaseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.state != ReleaseState::New {
            return Err(DomainError::conflict("release already paid"));
        }
        if self.colles.contains(&cmd.colle) {
            return Err(DomainError::AlreadyReleased);
        }
        if cmd.hours.duration.as_minutes() < 0 || cmd.hours.interrogation.as_minutes() < 0 {
            return Err(DomainError::validation(
                "colle contribution must not be negative",
            ));
        }

        match self.line(cmd.examiner, cmd.tier) {
            Some(line) => {
                if line.state != ReleaseLineState::New {
                    return Err(DomainError::conflict("release line already paid"));
                }
                if cmd.settlement.is_some() {
                    return Err(DomainError::validation(
                        "release line already has a settlement posting",
                    ));
                }
            }
            None => {
                if cmd.settlement.is_none() {
                    return Err(DomainError::validation(
                        "new release line requires a settlement posting",
                    ));
                }
            }
        }

        Ok(vec![ReleaseEvent::ColleAdded(ColleAdded {
            colle: cmd.colle,
            examiner: cmd.examiner,
            tier: cmd.tier,
            hours: cmd.hours,
            settlement: cmd.settlement,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pay_line(&self, cmd: &PayLine) -> Result<Vec<ReleaseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        let line = self
            .line(cmd.examiner, cmd.tier)
            .ok_or(DomainError::NotFound)?;
        if line.state != ReleaseLineState::New {
            return Err(DomainError::conflict("release line is not payable"));
        }

        let mut events = vec![ReleaseEvent::LinePaid(LinePaid {
            examiner: cmd.examiner,
            tier: cmd.tier,
            at: cmd.at,
            occurred_at: cmd.occurred_at,
        })];

        // Last payable line settles the whole batch. Externally-recorded
        // lines never block the cascade.
        let others_settled = self
            .lines
            .iter()
            .filter(|l| !(l.examiner == cmd.examiner && l.tier == cmd.tier))
            .all(|l| l.state != ReleaseLineState::New);
        if others_settled && self.state == ReleaseState::New {
            events.push(ReleaseEvent::ReleasePaid(ReleasePaid {
                at: cmd.at,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_pay(&self, cmd: &PayRelease) -> Result<Vec<ReleaseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.state == ReleaseState::Paid {
            return Err(DomainError::conflict("release already paid"));
        }

        Ok(vec![ReleaseEvent::ReleasePaid(ReleasePaid {
            at: cmd.at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_external(&self, cmd: &RecordExternal) -> Result<Vec<ReleaseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        let line = self
            .line(cmd.examiner, cmd.tier)
            .ok_or(DomainError::NotFound)?;
        if line.state == ReleaseLineState::ExternallyRecorded {
            return Err(DomainError::conflict("line already externally recorded"));
        }

        Ok(vec![ReleaseEvent::LineExternallyRecorded(
            LineExternallyRecorded {
                examiner: cmd.examiner,
                tier: cmd.tier,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kholle_core::Minutes;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn run(release: &mut Release, command: ReleaseCommand) -> Result<Vec<ReleaseEvent>, DomainError> {
        let events = release.handle(&command)?;
        for event in &events {
            release.apply(event);
        }
        Ok(events)
    }

    fn open_release() -> Release {
        let release_id = ReleaseId::new(AggregateId::new());
        let mut release = Release::empty(release_id);
        run(
            &mut release,
            ReleaseCommand::OpenRelease(OpenRelease {
                release_id,
                period: PeriodId::new(),
                establishment: EstablishmentId::new(),
                settlement_account: AccountId::new(),
                date: test_time(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        release
    }

    fn settlement() -> SettlementRef {
        SettlementRef {
            movement: MovementId::new(),
            line_no: 1,
        }
    }

    fn add_colle(
        release: &mut Release,
        examiner: UserId,
        tier: RateTier,
        hours: Hours,
        settlement: Option<SettlementRef>,
    ) -> Result<ColleId, DomainError> {
        let colle = ColleId::new();
        run(
            release,
            ReleaseCommand::AddColle(AddColle {
                colle,
                examiner,
                tier,
                hours,
                settlement,
                occurred_at: test_time(),
            }),
        )?;
        Ok(colle)
    }

    #[test]
    fn colles_accumulate_per_examiner_and_tier() {
        let mut release = open_release();
        let examiner = UserId::new();
        let tier = RateTier::FirstYearUpTo35;
        let hours = Hours::new(Minutes::hours(1), Minutes::minutes(40));

        add_colle(&mut release, examiner, tier, hours, Some(settlement())).unwrap();
        add_colle(&mut release, examiner, tier, hours, None).unwrap();
        add_colle(
            &mut release,
            examiner,
            RateTier::SecondYearUpTo20,
            hours,
            Some(settlement()),
        )
        .unwrap();

        assert_eq!(release.lines().len(), 2);
        let line = release.line(examiner, tier).unwrap();
        assert_eq!(line.hours, Hours::new(Minutes::hours(2), Minutes::minutes(80)));
        assert!(matches!(line.posting, LinePosting::Posted { .. }));
        assert_eq!(
            release.total_hours(),
            Hours::new(Minutes::hours(3), Minutes::minutes(120))
        );
    }

    #[test]
    fn duplicate_colle_is_already_released() {
        let mut release = open_release();
        let examiner = UserId::new();
        let tier = RateTier::FirstYearUpTo20;
        let hours = Hours::uniform(Minutes::hours(1));
        let colle = add_colle(&mut release, examiner, tier, hours, Some(settlement())).unwrap();
        let before = release.line(examiner, tier).unwrap().hours;

        let err = run(
            &mut release,
            ReleaseCommand::AddColle(AddColle {
                colle,
                examiner,
                tier,
                hours,
                settlement: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();

        assert_eq!(err, DomainError::AlreadyReleased);
        assert_eq!(release.line(examiner, tier).unwrap().hours, before);
    }

    #[test]
    fn new_line_requires_a_settlement_posting() {
        let mut release = open_release();
        let err = add_colle(
            &mut release,
            UserId::new(),
            RateTier::FirstYearUpTo20,
            Hours::uniform(Minutes::hours(1)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn existing_line_rejects_a_second_posting() {
        let mut release = open_release();
        let examiner = UserId::new();
        let tier = RateTier::SecondYearOver35;
        add_colle(
            &mut release,
            examiner,
            tier,
            Hours::uniform(Minutes::hours(1)),
            Some(settlement()),
        )
        .unwrap();

        let err = add_colle(
            &mut release,
            examiner,
            tier,
            Hours::uniform(Minutes::hours(1)),
            Some(settlement()),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn paying_the_last_line_settles_the_release() {
        let mut release = open_release();
        let first = UserId::new();
        let second = UserId::new();
        let tier = RateTier::FirstYearUpTo20;
        let hours = Hours::uniform(Minutes::hours(1));
        add_colle(&mut release, first, tier, hours, Some(settlement())).unwrap();
        add_colle(&mut release, second, tier, hours, Some(settlement())).unwrap();

        run(
            &mut release,
            ReleaseCommand::PayLine(PayLine {
                examiner: first,
                tier,
                at: test_time(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(release.state(), ReleaseState::New);

        run(
            &mut release,
            ReleaseCommand::PayLine(PayLine {
                examiner: second,
                tier,
                at: test_time(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(release.state(), ReleaseState::Paid);
        assert!(release.paid_at().is_some());
        assert!(
            release
                .lines()
                .iter()
                .all(|l| l.state == ReleaseLineState::Paid)
        );
    }

    #[test]
    fn externally_recorded_lines_do_not_block_the_cascade() {
        let mut release = open_release();
        let first = UserId::new();
        let second = UserId::new();
        let tier = RateTier::SecondYearUpTo35;
        let hours = Hours::uniform(Minutes::hours(1));
        add_colle(&mut release, first, tier, hours, Some(settlement())).unwrap();
        add_colle(&mut release, second, tier, hours, Some(settlement())).unwrap();

        run(
            &mut release,
            ReleaseCommand::RecordExternal(RecordExternal {
                examiner: first,
                tier,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(release.state(), ReleaseState::New);

        run(
            &mut release,
            ReleaseCommand::PayLine(PayLine {
                examiner: second,
                tier,
                at: test_time(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(release.state(), ReleaseState::Paid);
    }

    #[test]
    fn a_paid_line_can_still_be_recorded_externally() {
        let mut release = open_release();
        let examiner = UserId::new();
        let tier = RateTier::FirstYearOver35;
        add_colle(
            &mut release,
            examiner,
            tier,
            Hours::uniform(Minutes::hours(1)),
            Some(settlement()),
        )
        .unwrap();

        run(
            &mut release,
            ReleaseCommand::PayLine(PayLine {
                examiner,
                tier,
                at: test_time(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        run(
            &mut release,
            ReleaseCommand::RecordExternal(RecordExternal {
                examiner,
                tier,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(
            release.line(examiner, tier).unwrap().state,
            ReleaseLineState::ExternallyRecorded
        );
    }

    #[test]
    fn paying_a_paid_release_conflicts() {
        let mut release = open_release();
        run(
            &mut release,
            ReleaseCommand::PayRelease(PayRelease {
                at: test_time(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(release.state(), ReleaseState::Paid);

        let err = run(
            &mut release,
            ReleaseCommand::PayRelease(PayRelease {
                at: test_time(),
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
