//! Black-box scenarios over the whole accounting engine: chart bootstrap,
//! colle lifecycle, release workflow, read models.

use anyhow::Result;
use chrono::Utc;

use kholle_core::{
    AuthorityId, ClassId, ClassLevel, ColleId, DomainError, EstablishmentId, Hours, Minutes,
    PeriodId, RateTier, SubjectId, UserId,
};
use kholle_engine::{
    AuthorityRef, ClassRef, ColleEvent, ColleMode, Engine, EntityRef, EstablishmentRef,
    ExaminerRef, StatementProjection, SubjectRef,
};
use kholle_events::Projection;
use kholle_release::{ReleaseLineState, ReleaseState};

fn test_engine() -> Engine {
    kholle_observability::init();
    Engine::new()
}

fn establishment_ref() -> EstablishmentRef {
    EstablishmentRef {
        id: EstablishmentId::new(),
        name: "Lycée Descartes".to_string(),
        authority: AuthorityRef {
            id: AuthorityId::new(),
            name: "Académie de Tours".to_string(),
        },
    }
}

fn class_ref(establishment: &EstablishmentRef, level: ClassLevel, enrollment: u32) -> ClassRef {
    ClassRef {
        id: ClassId::new(),
        name: "MPSI 1".to_string(),
        establishment: establishment.clone(),
        level,
        enrollment,
    }
}

fn colle_event(
    period: PeriodId,
    class: &ClassRef,
    subject: &SubjectRef,
    examiner: &ExaminerRef,
    student_interrogations: Vec<Minutes>,
) -> ColleEvent {
    ColleEvent {
        id: ColleId::new(),
        period,
        examiner: examiner.clone(),
        class: class.clone(),
        subject: subject.clone(),
        mode: ColleMode::Questioning,
        duration: Minutes::hours(1),
        student_interrogations,
    }
}

#[test]
fn dotation_transfer_and_reversal_round_trip() -> Result<()> {
    let mut engine = test_engine();
    let period = PeriodId::new();
    let establishment = establishment_ref();
    let class = class_ref(&establishment, ClassLevel::FirstYear, 18);
    let hours = Hours::uniform(Minutes::hours(5));

    engine.grant_allotment(&establishment, period, hours, "yearly dotation")?;
    let establishment_account =
        engine.account_for(&EntityRef::Establishment(establishment.clone()))?;
    let class_account = engine.account_for(&EntityRef::Class(class.clone()))?;

    // The class sits inside the establishment's allotment subtree, so the
    // transfer does not change the parent's aggregate balance.
    let before = engine.balance(establishment_account, period).hours;
    let movement = engine.simple_transfer(
        establishment_account,
        class_account,
        hours,
        None,
        period,
        "dotation",
    )?;
    assert_eq!(engine.balance(establishment_account, period).hours, before);
    assert_eq!(engine.balance(class_account, period).hours, hours);

    let posted = engine.ledger().movement(movement).expect("movement exists");
    assert_eq!(posted.lines.len(), 2);
    assert!(posted.is_balanced());

    engine.reverse_movement(movement, true)?;
    assert_eq!(engine.balance(class_account, period).hours, Hours::ZERO);
    assert_eq!(engine.balance(establishment_account, period).hours, before);
    Ok(())
}

#[test]
fn full_colle_lifecycle_through_payment() -> Result<()> {
    let mut engine = test_engine();
    let period = PeriodId::new();
    let establishment = establishment_ref();
    let class = class_ref(&establishment, ClassLevel::FirstYear, 30);
    let subject = SubjectRef {
        id: SubjectId::new(),
        name: "Mathematics".to_string(),
    };
    let examiner = ExaminerRef {
        id: UserId::new(),
        name: "Noether".to_string(),
    };

    engine.grant_allotment(
        &establishment,
        period,
        Hours::uniform(Minutes::hours(20)),
        "yearly dotation",
    )?;
    let establishment_account =
        engine.account_for(&EntityRef::Establishment(establishment.clone()))?;
    let subject_account = engine.account_for(&EntityRef::Subject {
        class: class.clone(),
        subject: subject.clone(),
    })?;
    engine.simple_transfer(
        establishment_account,
        subject_account,
        Hours::uniform(Minutes::hours(10)),
        None,
        period,
        "subject allotment",
    )?;

    // Graded colle: three students, 20 minutes each.
    let colle = colle_event(
        period,
        &class,
        &subject,
        &examiner,
        vec![Minutes::minutes(20); 3],
    );
    let hours = colle.hours();
    assert_eq!(hours, Hours::new(Minutes::hours(1), Minutes::hours(1)));

    engine.notify_scheduled(&colle)?;
    let examiner_account = engine.account_for(&EntityRef::Examiner(examiner.clone()))?;
    assert_eq!(
        engine.balance(subject_account, period).hours,
        Hours::uniform(Minutes::hours(9))
    );
    assert_eq!(engine.balance(examiner_account, period).hours, hours);

    engine.notify_performed(&colle)?;
    // The hours moved between the examiner's own sub-accounts.
    assert_eq!(engine.balance(examiner_account, period).hours, hours);

    let release_id = engine.open_release(&establishment, period, Utc::now())?;
    engine.add_colle_to_release(release_id, &colle)?;

    let tier = RateTier::FirstYearUpTo35;
    let release = engine.release(release_id).expect("release exists");
    let line = release.line(examiner.id, tier).expect("line exists");
    assert_eq!(line.hours, hours);
    assert_eq!(line.state, ReleaseLineState::New);
    assert_eq!(release.total_hours(), hours);

    // The released hours left the examiner's subtree for the settlement
    // account, tagged with the rate tier.
    assert_eq!(engine.balance(examiner_account, period).hours, Hours::ZERO);
    let settlement_account = release.settlement_account().expect("settlement account");
    let settlement_balance = engine.balance(settlement_account, period);
    assert_eq!(settlement_balance.hours, hours);
    assert_eq!(settlement_balance.by_tier.get(&Some(tier)), Some(&hours));

    // Paying the only line cascades to the release itself.
    engine.pay_release_line(release_id, examiner.id, tier, None)?;
    let release = engine.release(release_id).expect("release exists");
    assert_eq!(release.state(), ReleaseState::Paid);
    assert!(release.paid_at().is_some());

    // Explicit settlement into the authority's payment account.
    engine.settle_release_line_payment(release_id, examiner.id, tier)?;
    assert_eq!(engine.balance(settlement_account, period).hours, Hours::ZERO);
    Ok(())
}

#[test]
fn cancelled_colle_restores_the_subject_allotment() -> Result<()> {
    let mut engine = test_engine();
    let period = PeriodId::new();
    let establishment = establishment_ref();
    let class = class_ref(&establishment, ClassLevel::SecondYear, 22);
    let subject = SubjectRef {
        id: SubjectId::new(),
        name: "Physics".to_string(),
    };
    let examiner = ExaminerRef {
        id: UserId::new(),
        name: "Curie".to_string(),
    };

    engine.grant_allotment(
        &establishment,
        period,
        Hours::uniform(Minutes::hours(4)),
        "dotation",
    )?;
    let establishment_account =
        engine.account_for(&EntityRef::Establishment(establishment.clone()))?;
    let subject_account = engine.account_for(&EntityRef::Subject {
        class: class.clone(),
        subject: subject.clone(),
    })?;
    engine.simple_transfer(
        establishment_account,
        subject_account,
        Hours::uniform(Minutes::hours(4)),
        None,
        period,
        "subject allotment",
    )?;

    let colle = colle_event(period, &class, &subject, &examiner, vec![]);
    let scheduled = engine.notify_scheduled(&colle)?;
    assert_eq!(
        engine.balance(subject_account, period).hours,
        Hours::uniform(Minutes::hours(3))
    );

    let reversal = engine.notify_cancelled(&colle)?;
    assert_eq!(
        engine.balance(subject_account, period).hours,
        Hours::uniform(Minutes::hours(4))
    );

    // The undo is recorded as a total reconciliation between the original
    // credit and the reversal debit.
    let ledger = engine.ledger();
    let original = ledger.movement(scheduled).expect("original exists");
    let credit = original
        .lines
        .iter()
        .find(|l| l.is_credit())
        .expect("credit line");
    let group_id = credit.reconciliation.expect("credit line reconciled");
    let group = ledger.reconciliation(group_id).expect("group exists");
    assert!(
        group
            .lines
            .iter()
            .any(|r| r.movement == reversal)
    );
    Ok(())
}

#[test]
fn adding_the_same_colle_twice_is_a_benign_no_op() -> Result<()> {
    let mut engine = test_engine();
    let period = PeriodId::new();
    let establishment = establishment_ref();
    let class = class_ref(&establishment, ClassLevel::FirstYear, 40);
    let subject = SubjectRef {
        id: SubjectId::new(),
        name: "Chemistry".to_string(),
    };
    let examiner = ExaminerRef {
        id: UserId::new(),
        name: "Lavoisier".to_string(),
    };

    engine.grant_allotment(
        &establishment,
        period,
        Hours::uniform(Minutes::hours(6)),
        "dotation",
    )?;
    let establishment_account =
        engine.account_for(&EntityRef::Establishment(establishment.clone()))?;
    let subject_account = engine.account_for(&EntityRef::Subject {
        class: class.clone(),
        subject: subject.clone(),
    })?;
    engine.simple_transfer(
        establishment_account,
        subject_account,
        Hours::uniform(Minutes::hours(6)),
        None,
        period,
        "subject allotment",
    )?;

    let colle = colle_event(period, &class, &subject, &examiner, vec![]);
    engine.notify_scheduled(&colle)?;
    engine.notify_performed(&colle)?;

    let release_id = engine.open_release(&establishment, period, Utc::now())?;
    engine.add_colle_to_release(release_id, &colle)?;

    let tier = RateTier::FirstYearOver35;
    let totals_after_first = engine
        .release(release_id)
        .and_then(|r| r.line(examiner.id, tier))
        .map(|l| l.hours)
        .expect("line exists");
    let journal_len = engine.journal().len();

    engine.add_colle_to_release(release_id, &colle)?;

    let totals_after_second = engine
        .release(release_id)
        .and_then(|r| r.line(examiner.id, tier))
        .map(|l| l.hours)
        .expect("line exists");
    assert_eq!(totals_after_first, totals_after_second);
    assert_eq!(engine.journal().len(), journal_len);
    assert_eq!(engine.release_of(colle.id), Some(release_id));
    Ok(())
}

#[test]
fn unfunded_scheduling_is_rejected_with_overdraft() -> Result<()> {
    let mut engine = test_engine();
    let period = PeriodId::new();
    let establishment = establishment_ref();
    let class = class_ref(&establishment, ClassLevel::FirstYear, 25);
    let subject = SubjectRef {
        id: SubjectId::new(),
        name: "Mathematics".to_string(),
    };
    let examiner = ExaminerRef {
        id: UserId::new(),
        name: "Galois".to_string(),
    };

    let colle = colle_event(period, &class, &subject, &examiner, vec![]);
    let err = engine.notify_scheduled(&colle).unwrap_err();
    assert!(matches!(err, DomainError::OverdraftExceeded { .. }));

    // Nothing was posted: the lazily-created subject account is untouched.
    let subject_account = engine.account_for(&EntityRef::Subject {
        class: class.clone(),
        subject: subject.clone(),
    })?;
    assert_eq!(engine.balance(subject_account, period).hours, Hours::ZERO);
    assert_eq!(engine.scheduling_movement(colle.id), None);
    Ok(())
}

#[test]
fn statement_projection_matches_live_and_replayed_streams() -> Result<()> {
    let mut engine = test_engine();
    let period = PeriodId::new();
    let establishment = establishment_ref();
    let subscription = engine.subscribe();

    let hours = Hours::uniform(Minutes::hours(12));
    engine.grant_allotment(&establishment, period, hours, "dotation")?;

    let mut live = StatementProjection::new();
    while let Ok(envelope) = subscription.try_recv() {
        live.apply(&envelope);
    }

    let mut replayed = StatementProjection::new();
    engine.replay(&mut replayed);

    let authority_account =
        engine.account_for(&EntityRef::Authority(establishment.authority.clone()))?;
    let establishment_account =
        engine.account_for(&EntityRef::Establishment(establishment.clone()))?;

    for projection in [&live, &replayed] {
        // Revenue displays inverted: granting 12h shows +12h.
        assert_eq!(
            projection.statement(authority_account).map(|s| s.balance),
            Some(hours)
        );
        assert_eq!(
            projection
                .statement(establishment_account)
                .map(|s| s.balance),
            Some(hours)
        );
    }
    Ok(())
}

#[test]
fn account_for_is_lazy_and_idempotent() -> Result<()> {
    let mut engine = test_engine();
    let establishment = establishment_ref();
    let class = class_ref(&establishment, ClassLevel::FirstYear, 20);

    let first = engine.account_for(&EntityRef::Class(class.clone()))?;
    let second = engine.account_for(&EntityRef::Class(class.clone()))?;
    assert_eq!(first, second);

    let account = engine.ledger().account(first).expect("account exists");
    assert_eq!(account.name, class.name);
    assert!(account.parent.is_some());
    Ok(())
}
