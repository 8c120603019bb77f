mod common;

use common::{Harness, at_noon, day};
use domain::value_objects::enums::{
    payment_statuses::PaymentStatus, procedure_statuses::ProcedureStatus,
};
use uuid::Uuid;

fn notice_sent(h: &Harness, owner: Uuid, dispatched: chrono::NaiveDate) -> Uuid {
    h.store.seed_procedure(owner, ProcedureStatus::NoticeSent, |p| {
        p.payment_id = Some(Uuid::new_v4());
        p.payment_status = Some(PaymentStatus::Succeeded);
        p.dispatch_date = Some(dispatched);
    })
}

#[tokio::test]
async fn eighteen_days_after_dispatch_escalates_to_pre_injunction() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let p5 = notice_sent(&h, owner, day(2026, 1, 1));

    let report = h.scheduler.run(at_noon(day(2026, 1, 19))).await.unwrap();

    assert_eq!(h.store.procedure(p5).status, ProcedureStatus::PreInjunction);
    assert_eq!(report.escalations.applied, 1);
    assert_eq!(report.escalations.applied_ids, vec![p5]);
}

#[tokio::test]
async fn escalation_waits_until_day_seventeen() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let p = notice_sent(&h, owner, day(2026, 1, 1));

    h.scheduler.run(at_noon(day(2026, 1, 17))).await.unwrap();
    assert_eq!(h.store.procedure(p).status, ProcedureStatus::NoticeSent);

    h.scheduler.run(at_noon(day(2026, 1, 18))).await.unwrap();
    assert_eq!(h.store.procedure(p).status, ProcedureStatus::PreInjunction);
}

#[tokio::test]
async fn running_twice_changes_status_at_most_once() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let p = notice_sent(&h, owner, day(2026, 1, 1));
    let now = at_noon(day(2026, 1, 20));

    let (first, second) = tokio::join!(h.scheduler.run(now), h.scheduler.run(now));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.escalations.applied + second.escalations.applied, 1);
    assert_eq!(first.follow_ups.applied + second.follow_ups.applied, 1);
    let procedure = h.store.procedure(p);
    assert_eq!(procedure.status, ProcedureStatus::PreInjunction);

    let third = h.scheduler.run(now).await.unwrap();
    assert_eq!(third.escalations.scanned, 0);
}

#[tokio::test]
async fn follow_up_is_sent_once_after_ten_days() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let p = notice_sent(&h, owner, day(2026, 1, 1));

    let early = h.scheduler.run(at_noon(day(2026, 1, 10))).await.unwrap();
    assert_eq!(early.follow_ups.scanned, 0);

    let now = at_noon(day(2026, 1, 11));
    let (first, second) = tokio::join!(h.scheduler.run(now), h.scheduler.run(now));
    let sent = first.unwrap().follow_ups.applied + second.unwrap().follow_ups.applied;

    assert_eq!(sent, 1);
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.notifier.sent()[0].recipient, "owner@example.com");
    assert!(h.store.procedure(p).follow_up_sent_at.is_some());

    h.scheduler.run(at_noon(day(2026, 1, 12))).await.unwrap();
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn failed_follow_up_is_retried_next_run() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let p = notice_sent(&h, owner, day(2026, 1, 1));

    h.notifier.set_failing(true);
    let report = h.scheduler.run(at_noon(day(2026, 1, 12))).await.unwrap();
    assert_eq!(report.follow_ups.failed, 1);
    assert!(h.store.procedure(p).follow_up_sent_at.is_none());

    h.notifier.set_failing(false);
    let report = h.scheduler.run(at_noon(day(2026, 1, 13))).await.unwrap();
    assert_eq!(report.follow_ups.applied, 1);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn new_dispatch_resets_the_follow_up_marker() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let p = h.store.seed_procedure(owner, ProcedureStatus::InProgress, |p| {
        p.payment_id = Some(Uuid::new_v4());
        p.payment_status = Some(PaymentStatus::Succeeded);
    });

    h.actions.record_dispatch(p, day(2026, 2, 1)).await.unwrap();
    h.scheduler.run(at_noon(day(2026, 2, 11))).await.unwrap();

    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.store.procedure(p).status, ProcedureStatus::NoticeSent);
}
