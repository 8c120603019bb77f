use std::sync::Arc;

use application::usecases::{
    injunction_payment::InjunctionPaymentUseCase,
    payment_reconciliation::PaymentReconciliationUseCase,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use domain::value_objects::reconciliation::{
    PaymentReference, ReconcileCommand, ReconcileReport, SettlementView,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_BACKEND/api/v1/payments/reconcile" \
//     -H "Content-Type: application/json" \
//     -d '{"session_id":"cs_test_123","procedure_id":"8f0e6a44-7b1c-4d5e-9c55-3f0bb2a1c001"}'

#[derive(Clone)]
pub struct PaymentRouteState {
    reconciliation: Arc<PaymentReconciliationUseCase>,
    injunction: Arc<InjunctionPaymentUseCase>,
}

pub fn routes(
    reconciliation: Arc<PaymentReconciliationUseCase>,
    injunction: Arc<InjunctionPaymentUseCase>,
) -> Router {
    Router::new()
        .route("/reconcile", post(reconcile))
        .route("/injunction/reconcile", post(reconcile_injunction))
        .with_state(PaymentRouteState {
            reconciliation,
            injunction,
        })
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub procedure_id: Option<Uuid>,
}

impl TryFrom<ReconcileRequest> for ReconcileCommand {
    type Error = AppError;

    fn try_from(request: ReconcileRequest) -> Result<Self, Self::Error> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let reference = match (
            non_empty(request.session_id),
            non_empty(request.payment_intent_id),
        ) {
            (Some(session_id), None) => PaymentReference::Session(session_id),
            (None, Some(intent_id)) => PaymentReference::Intent(intent_id),
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "pass either session_id or payment_intent_id, not both".into(),
                ));
            }
            (None, None) => {
                return Err(AppError::BadRequest(
                    "session_id or payment_intent_id is required".into(),
                ));
            }
        };

        Ok(ReconcileCommand {
            reference,
            procedure_id: request.procedure_id,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(flatten)]
    pub report: ReconcileReport,
}

/// 200 when settled, 202 while the processor is still settling, 402 on a definitive failure.
pub fn report_response(report: ReconcileReport) -> Response {
    let (status, message) = match report.settlement {
        SettlementView::Succeeded => (StatusCode::OK, None),
        SettlementView::Pending => (StatusCode::ACCEPTED, None),
        SettlementView::Failed => (
            StatusCode::PAYMENT_REQUIRED,
            Some("payment failed, please retry"),
        ),
    };
    (status, Json(ReconcileResponse { message, report })).into_response()
}

pub async fn reconcile(
    State(state): State<PaymentRouteState>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Response, AppError> {
    let command = ReconcileCommand::try_from(request)?;
    let report = state.reconciliation.reconcile(command).await?;
    Ok(report_response(report))
}

pub async fn reconcile_injunction(
    State(state): State<PaymentRouteState>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Response, AppError> {
    let command = ReconcileCommand::try_from(request)?;
    let report = state.injunction.reconcile(command).await?;
    Ok(report_response(report))
}
