use application::usecases::{
    payment_reconciliation::ReconciliationError, procedure_actions::ProcedureActionError,
    processor_events::ProcessorEventError, subscription_sync::SubscriptionSyncError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{repositories::payment_gateway::GatewayError, value_objects::lifecycle::TransitionError};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => {
                warn!(reason = %msg, "responding 503");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "temporarily unavailable, retry later".to_string(),
                )
            }
            AppError::Internal(err) => {
                error!(error = ?err, "request failed");
                // Don't leak internal error detail to client
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

fn from_gateway(err: GatewayError) -> AppError {
    match err {
        GatewayError::Unavailable(reason) => AppError::Unavailable(reason),
        GatewayError::NotFound(what) => AppError::NotFound(format!("payment processor has no {what}")),
        GatewayError::InvalidSignature => AppError::BadRequest("invalid webhook signature".into()),
        other => AppError::Internal(other.into()),
    }
}

fn from_transition(err: TransitionError) -> AppError {
    match err {
        TransitionError::InjunctionTooEarly { .. }
        | TransitionError::MissingSupportingDocuments
        | TransitionError::MissingDispatchDate => AppError::BadRequest(err.to_string()),
        TransitionError::InvariantViolated(_) => AppError::Internal(err.into()),
        TransitionError::Misrouted { .. }
        | TransitionError::NotInjunctionStage { .. }
        | TransitionError::InvalidTransition { .. }
        | TransitionError::Terminal { .. } => AppError::Conflict(err.to_string()),
    }
}

impl From<ReconciliationError> for AppError {
    fn from(err: ReconciliationError) -> Self {
        match err {
            ReconciliationError::ProcessorUnavailable(reason) => AppError::Unavailable(reason),
            ReconciliationError::Processor(err) => from_gateway(err),
            ReconciliationError::ProcedureNotFound(id) => {
                AppError::NotFound(format!("procedure {id} not found"))
            }
            ReconciliationError::MisroutedInjunction { .. }
            | ReconciliationError::NotInjunctionStage { .. } => AppError::Conflict(err.to_string()),
            ReconciliationError::UnresolvedOwner
            | ReconciliationError::UnresolvedProcedure
            | ReconciliationError::InvalidWebhook(_) => AppError::BadRequest(err.to_string()),
            ReconciliationError::Transition(err) => from_transition(err),
            ReconciliationError::Contended(_) => AppError::Unavailable(err.to_string()),
            ReconciliationError::Store(err) => AppError::Internal(err.into()),
        }
    }
}

impl From<SubscriptionSyncError> for AppError {
    fn from(err: SubscriptionSyncError) -> Self {
        match err {
            SubscriptionSyncError::ProcessorUnavailable(reason) => AppError::Unavailable(reason),
            SubscriptionSyncError::Processor(err) => from_gateway(err),
            SubscriptionSyncError::NotFound(_)
            | SubscriptionSyncError::MissingCustomer(_)
            | SubscriptionSyncError::ProcedureNotFound(_) => AppError::NotFound(err.to_string()),
            SubscriptionSyncError::Store(err) => AppError::Internal(err.into()),
        }
    }
}

impl From<ProcedureActionError> for AppError {
    fn from(err: ProcedureActionError) -> Self {
        match err {
            ProcedureActionError::NotFound(_) => AppError::NotFound(err.to_string()),
            ProcedureActionError::NotDraft(_) => AppError::Conflict(err.to_string()),
            ProcedureActionError::NotParticipant => AppError::Forbidden(err.to_string()),
            ProcedureActionError::EmptyMessage => AppError::BadRequest(err.to_string()),
            ProcedureActionError::Rejected(err) => from_transition(err),
            ProcedureActionError::Contended(_) => AppError::Unavailable(err.to_string()),
            ProcedureActionError::Store(err) => AppError::Internal(err.into()),
        }
    }
}

impl From<ProcessorEventError> for AppError {
    fn from(err: ProcessorEventError) -> Self {
        match err {
            ProcessorEventError::InvalidWebhook(reason) => AppError::BadRequest(reason),
            ProcessorEventError::Reconciliation(err) => err.into(),
            ProcessorEventError::Subscription(err) => err.into(),
        }
    }
}
