use std::sync::Arc;

use application::usecases::subscription_sync::{SubscriptionSyncUseCase, SyncedSubscription};
use axum::{Json, Router, extract::State, routing::post};
use chrono::{DateTime, Utc};
use domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

pub fn routes(subscriptions_usecase: Arc<SubscriptionSyncUseCase>) -> Router {
    Router::new()
        .route("/sync", post(sync))
        .with_state(subscriptions_usecase)
}

#[derive(Debug, Deserialize)]
pub struct SyncSubscriptionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub external_subscription_id: String,
    pub external_price_id: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    /// `false` when the processor could not confirm the stored row.
    pub fresh: bool,
}

impl From<SyncedSubscription> for SubscriptionResponse {
    fn from(synced: SyncedSubscription) -> Self {
        let subscription = synced.subscription;
        Self {
            id: subscription.id,
            user_id: subscription.user_id,
            external_subscription_id: subscription.external_subscription_id,
            external_price_id: subscription.external_price_id,
            status: subscription.status,
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
            fresh: synced.fresh,
        }
    }
}

pub async fn sync(
    State(subscriptions_usecase): State<Arc<SubscriptionSyncUseCase>>,
    Json(request): Json<SyncSubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let synced = subscriptions_usecase
        .sync_subscription(request.user_id)
        .await?;
    Ok(Json(synced.into()))
}
