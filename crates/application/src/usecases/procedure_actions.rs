use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use domain::{
    repositories::{
        comments::CommentRepository, documents::DocumentRepository,
        procedures::ProcedureRepository, store_error::StoreError,
    },
    value_objects::{
        enums::{document_kinds::DocumentKind, procedure_statuses::ProcedureStatus},
        lifecycle::{Actor, ProcedureEvent, TransitionError},
    },
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::{
    case_records::CaseRecords,
    procedure_transitions::{ProcedureTransitions, TransitionFailure, TransitionOutcome},
};

#[derive(Debug, Error)]
pub enum ProcedureActionError {
    #[error("procedure {0} not found")]
    NotFound(Uuid),
    #[error("only draft procedures can be deleted (status {0})")]
    NotDraft(ProcedureStatus),
    #[error("user is neither the owner nor the assigned agent")]
    NotParticipant,
    #[error("message body is empty")]
    EmptyMessage,
    #[error(transparent)]
    Rejected(TransitionError),
    #[error("procedure {0} kept changing under concurrent writers")]
    Contended(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TransitionFailure> for ProcedureActionError {
    fn from(failure: TransitionFailure) -> Self {
        match failure {
            TransitionFailure::NotFound(id) => ProcedureActionError::NotFound(id),
            TransitionFailure::Rejected(err) => ProcedureActionError::Rejected(err),
            TransitionFailure::Contended(id) => ProcedureActionError::Contended(id),
            TransitionFailure::Store(err) => ProcedureActionError::Store(err),
        }
    }
}

pub type ActionResult<T> = Result<T, ProcedureActionError>;

#[derive(Debug, Clone, Default)]
pub struct InjunctionDocuments {
    pub company_extract_key: Option<String>,
    pub affidavit_key: Option<String>,
}

/// User-driven lifecycle steps of a procedure.
pub struct ProcedureActionsUseCase {
    transitions: Arc<ProcedureTransitions>,
    procedures: Arc<dyn ProcedureRepository + Send + Sync>,
    records: CaseRecords,
}

impl ProcedureActionsUseCase {
    pub fn new(
        transitions: Arc<ProcedureTransitions>,
        procedures: Arc<dyn ProcedureRepository + Send + Sync>,
        documents: Arc<dyn DocumentRepository + Send + Sync>,
        comments: Arc<dyn CommentRepository + Send + Sync>,
    ) -> Self {
        Self {
            transitions,
            procedures,
            records: CaseRecords::new(documents, comments),
        }
    }

    pub async fn assign_agent(
        &self,
        procedure_id: Uuid,
        agent_id: Uuid,
    ) -> ActionResult<TransitionOutcome> {
        let outcome = self
            .transitions
            .apply(procedure_id, |_| ProcedureEvent::AgentAssigned { agent_id })
            .await?;
        info!(%procedure_id, %agent_id, "procedures: agent assigned");
        Ok(outcome)
    }

    pub async fn post_message(
        &self,
        procedure_id: Uuid,
        author_user_id: Uuid,
        body: &str,
    ) -> ActionResult<TransitionOutcome> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ProcedureActionError::EmptyMessage);
        }

        let procedure = self
            .procedures
            .find_by_id(procedure_id)
            .await?
            .ok_or(ProcedureActionError::NotFound(procedure_id))?;
        let author = if procedure.owner_user_id == author_user_id {
            Actor::Owner
        } else if procedure.assigned_agent_id == Some(author_user_id) {
            Actor::Agent
        } else {
            return Err(ProcedureActionError::NotParticipant);
        };
        if procedure.status.is_terminal() {
            return Err(ProcedureActionError::Rejected(TransitionError::Terminal {
                status: procedure.status,
            }));
        }

        self.records
            .add_message(procedure_id, author_user_id, body, Utc::now())
            .await?;

        let outcome = self
            .transitions
            .apply(procedure_id, |_| ProcedureEvent::MessagePosted { author })
            .await?;
        Ok(outcome)
    }

    pub async fn record_dispatch(
        &self,
        procedure_id: Uuid,
        dispatched_on: NaiveDate,
    ) -> ActionResult<TransitionOutcome> {
        let outcome = self
            .transitions
            .apply(procedure_id, |_| ProcedureEvent::NoticeDispatched {
                on: dispatched_on,
            })
            .await?;
        info!(%procedure_id, %dispatched_on, "procedures: formal notice dispatched");
        Ok(outcome)
    }

    /// Attaches any documents supplied with the request, then asks the state
    /// machine; the gate checks what is attached, not what was supplied.
    pub async fn request_injunction(
        &self,
        procedure_id: Uuid,
        today: NaiveDate,
        documents: InjunctionDocuments,
    ) -> ActionResult<TransitionOutcome> {
        if self.procedures.find_by_id(procedure_id).await?.is_none() {
            return Err(ProcedureActionError::NotFound(procedure_id));
        }

        for (kind, key) in [
            (DocumentKind::CompanyExtract, &documents.company_extract_key),
            (DocumentKind::SignedAffidavit, &documents.affidavit_key),
        ] {
            if let Some(storage_key) = key.as_deref().filter(|key| !key.is_empty()) {
                self.records
                    .ensure_document(procedure_id, kind, storage_key)
                    .await?;
            }
        }

        let supporting_documents = self.records.has_injunction_support(procedure_id).await?;
        let outcome = self
            .transitions
            .apply(procedure_id, |_| ProcedureEvent::InjunctionRequested {
                today,
                supporting_documents,
            })
            .await?;
        Ok(outcome)
    }

    pub async fn resolve(&self, procedure_id: Uuid) -> ActionResult<TransitionOutcome> {
        Ok(self
            .transitions
            .apply(procedure_id, |_| ProcedureEvent::Resolved)
            .await?)
    }

    pub async fn cancel(&self, procedure_id: Uuid) -> ActionResult<TransitionOutcome> {
        Ok(self
            .transitions
            .apply(procedure_id, |_| ProcedureEvent::Canceled)
            .await?)
    }

    pub async fn delete_draft(&self, procedure_id: Uuid) -> ActionResult<()> {
        let procedure = self
            .procedures
            .find_by_id(procedure_id)
            .await?
            .ok_or(ProcedureActionError::NotFound(procedure_id))?;
        if procedure.status != ProcedureStatus::Draft {
            return Err(ProcedureActionError::NotDraft(procedure.status));
        }

        if !self.procedures.delete_draft(procedure_id).await? {
            let status = self
                .procedures
                .find_by_id(procedure_id)
                .await?
                .map(|procedure| procedure.status)
                .ok_or(ProcedureActionError::NotFound(procedure_id))?;
            return Err(ProcedureActionError::NotDraft(status));
        }
        info!(%procedure_id, "procedures: draft deleted");
        Ok(())
    }
}
