mod common;

use application::usecases::procedure_actions::{InjunctionDocuments, ProcedureActionError};
use common::{Harness, day};
use domain::value_objects::{
    enums::{payment_statuses::PaymentStatus, procedure_statuses::ProcedureStatus},
    lifecycle::TransitionError,
};
use uuid::Uuid;

fn paid(h: &Harness, owner: Uuid, status: ProcedureStatus) -> Uuid {
    h.store.seed_procedure(owner, status, |p| {
        p.payment_id = Some(Uuid::new_v4());
        p.payment_status = Some(PaymentStatus::Succeeded);
    })
}

#[tokio::test]
async fn assignment_and_messages_drive_the_conversation() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let agent = Uuid::new_v4();
    let p = paid(&h, owner, ProcedureStatus::New);

    h.actions.assign_agent(p, agent).await.unwrap();
    assert_eq!(h.store.procedure(p).status, ProcedureStatus::InProgress);

    h.actions
        .post_message(p, owner, "Any news from the debtor?")
        .await
        .unwrap();
    assert_eq!(
        h.store.procedure(p).status,
        ProcedureStatus::AwaitingAgentReply
    );

    h.actions
        .post_message(p, agent, "Not yet, I will call them today.")
        .await
        .unwrap();
    assert_eq!(
        h.store.procedure(p).status,
        ProcedureStatus::AwaitingOwnerReply
    );
    assert_eq!(h.store.comments(p).len(), 2);
}

#[tokio::test]
async fn outsiders_cannot_post() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let p = paid(&h, owner, ProcedureStatus::InProgress);

    let err = h
        .actions
        .post_message(p, Uuid::new_v4(), "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, ProcedureActionError::NotParticipant));
    assert!(h.store.comments(p).is_empty());
}

#[tokio::test]
async fn injunction_request_needs_time_and_documents() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let p = paid(&h, owner, ProcedureStatus::InProgress);
    h.actions.record_dispatch(p, day(2026, 3, 1)).await.unwrap();

    let too_early = h
        .actions
        .request_injunction(p, day(2026, 3, 5), InjunctionDocuments::default())
        .await
        .unwrap_err();
    assert!(matches!(
        too_early,
        ProcedureActionError::Rejected(TransitionError::InjunctionTooEarly { days_remaining: 6 })
    ));

    let missing = h
        .actions
        .request_injunction(
            p,
            day(2026, 3, 12),
            InjunctionDocuments {
                company_extract_key: Some("uploads/extract.pdf".into()),
                affidavit_key: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        missing,
        ProcedureActionError::Rejected(TransitionError::MissingSupportingDocuments)
    ));

    h.actions
        .request_injunction(
            p,
            day(2026, 3, 12),
            InjunctionDocuments {
                company_extract_key: None,
                affidavit_key: Some("uploads/affidavit.pdf".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        h.store.procedure(p).status,
        ProcedureStatus::InjunctionRequested
    );
    assert_eq!(h.store.documents(p).len(), 2);
}

#[tokio::test]
async fn only_drafts_are_deleted() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let draft = h.store.seed_procedure(owner, ProcedureStatus::Draft, |_| {});
    let active = paid(&h, owner, ProcedureStatus::New);

    h.actions.delete_draft(draft).await.unwrap();
    assert!(!h.store.has_procedure(draft));

    let err = h.actions.delete_draft(active).await.unwrap_err();
    assert!(matches!(
        err,
        ProcedureActionError::NotDraft(ProcedureStatus::New)
    ));
    assert!(h.store.has_procedure(active));
}

#[tokio::test]
async fn closed_cases_stay_closed() {
    let h = Harness::new();
    let owner = h.store.seed_user("owner@example.com");
    let p = paid(&h, owner, ProcedureStatus::NoticeSent);

    h.actions.cancel(p).await.unwrap();
    let err = h.actions.resolve(p).await.unwrap_err();

    assert!(matches!(
        err,
        ProcedureActionError::Rejected(TransitionError::Terminal {
            status: ProcedureStatus::Canceled
        })
    ));
    assert_eq!(h.store.procedure(p).status, ProcedureStatus::Canceled);
}
