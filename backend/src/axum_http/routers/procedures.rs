use std::sync::Arc;

use application::usecases::{
    procedure_actions::{InjunctionDocuments, ProcedureActionsUseCase},
    procedure_transitions::TransitionOutcome,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use chrono::{NaiveDate, Utc};
use domain::value_objects::reconciliation::{AppliedTransition, ReconciledProcedure};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

pub fn routes(procedures_usecase: Arc<ProcedureActionsUseCase>) -> Router {
    Router::new()
        .route("/:id", delete(delete_draft))
        .route("/:id/assign", post(assign_agent))
        .route("/:id/messages", post(post_message))
        .route("/:id/dispatch", post(record_dispatch))
        .route("/:id/injunction", post(request_injunction))
        .route("/:id/resolve", post(resolve))
        .route("/:id/cancel", post(cancel))
        .with_state(procedures_usecase)
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub procedure: ReconciledProcedure,
    pub applied: Option<AppliedTransition>,
    /// Why nothing changed, when nothing did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        match outcome {
            TransitionOutcome::Applied {
                procedure,
                transition,
            } => Self {
                procedure: procedure.view(),
                applied: Some(transition),
                reason: None,
            },
            TransitionOutcome::Unchanged { procedure, reason } => Self {
                procedure: procedure.view(),
                applied: None,
                reason: Some(reason),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignAgentRequest {
    pub agent_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub author_user_id: Uuid,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub dispatched_on: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct InjunctionRequest {
    /// Defaults to the current UTC date.
    pub today: Option<NaiveDate>,
    pub company_extract_key: Option<String>,
    pub affidavit_key: Option<String>,
}

pub async fn assign_agent(
    State(procedures_usecase): State<Arc<ProcedureActionsUseCase>>,
    Path(procedure_id): Path<Uuid>,
    Json(request): Json<AssignAgentRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let outcome = procedures_usecase
        .assign_agent(procedure_id, request.agent_id)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn post_message(
    State(procedures_usecase): State<Arc<ProcedureActionsUseCase>>,
    Path(procedure_id): Path<Uuid>,
    Json(request): Json<PostMessageRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let outcome = procedures_usecase
        .post_message(procedure_id, request.author_user_id, &request.body)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn record_dispatch(
    State(procedures_usecase): State<Arc<ProcedureActionsUseCase>>,
    Path(procedure_id): Path<Uuid>,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let outcome = procedures_usecase
        .record_dispatch(procedure_id, request.dispatched_on)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn request_injunction(
    State(procedures_usecase): State<Arc<ProcedureActionsUseCase>>,
    Path(procedure_id): Path<Uuid>,
    Json(request): Json<InjunctionRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let today = request.today.unwrap_or_else(|| Utc::now().date_naive());
    let documents = InjunctionDocuments {
        company_extract_key: request.company_extract_key,
        affidavit_key: request.affidavit_key,
    };
    let outcome = procedures_usecase
        .request_injunction(procedure_id, today, documents)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn resolve(
    State(procedures_usecase): State<Arc<ProcedureActionsUseCase>>,
    Path(procedure_id): Path<Uuid>,
) -> Result<Json<TransitionResponse>, AppError> {
    let outcome = procedures_usecase.resolve(procedure_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn cancel(
    State(procedures_usecase): State<Arc<ProcedureActionsUseCase>>,
    Path(procedure_id): Path<Uuid>,
) -> Result<Json<TransitionResponse>, AppError> {
    let outcome = procedures_usecase.cancel(procedure_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn delete_draft(
    State(procedures_usecase): State<Arc<ProcedureActionsUseCase>>,
    Path(procedure_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    procedures_usecase.delete_draft(procedure_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
