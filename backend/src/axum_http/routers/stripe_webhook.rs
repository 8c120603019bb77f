use std::sync::Arc;

use application::usecases::processor_events::{ProcessorEventsUseCase, WebhookOutcome};
use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
use tracing::{info, warn};

use crate::axum_http::error_responses::AppError;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(processor_events: Arc<ProcessorEventsUseCase>) -> Router {
    Router::new()
        .route("/stripe", post(handle_stripe_event))
        .with_state(processor_events)
}

/// The body is taken raw; the signature covers the exact bytes Stripe sent.
pub async fn handle_stripe_event(
    State(processor_events): State<Arc<ProcessorEventsUseCase>>,
    headers: HeaderMap,
    payload: String,
) -> Result<Json<WebhookOutcome>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("webhooks: request without Stripe-Signature header");
            AppError::BadRequest("missing Stripe-Signature header".into())
        })?;

    let outcome = processor_events.handle(&payload, signature).await?;
    if let WebhookOutcome::Ignored { event_type } = &outcome {
        info!(%event_type, "webhooks: event ignored");
    }
    Ok(Json(outcome))
}
