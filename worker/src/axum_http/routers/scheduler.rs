use std::sync::Arc;

use application::usecases::temporal_transitions::TemporalTransitionsUseCase;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{error, warn};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_CONTEXT: &[u8] = b"scheduler-trigger";

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/scheduler/run" \
//     -H "Authorization: Bearer $INTERNAL_SCHEDULER_TOKEN"

#[derive(Clone)]
pub struct SchedulerRouteState {
    internal_token: Option<String>,
    usecase: Arc<TemporalTransitionsUseCase>,
}

pub fn routes(internal_token: Option<String>, usecase: Arc<TemporalTransitionsUseCase>) -> Router {
    Router::new()
        .route("/run", post(run_scheduler))
        .with_state(SchedulerRouteState {
            internal_token,
            usecase,
        })
}

pub async fn run_scheduler(State(state): State<SchedulerRouteState>, headers: HeaderMap) -> Response {
    let expected_token = match state.internal_token.as_deref() {
        Some(token) => token,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "scheduler token is not configured",
            )
                .into_response();
        }
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        warn!("scheduler: rejected trigger with bad credentials");
        return (status, "unauthorized").into_response();
    }

    match state.usecase.run(Utc::now()).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            error!(error = ?err, "scheduler: triggered run failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "scheduler run failed").into_response()
        }
    }
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if tokens_match(token, expected_token) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Tokens are MACed under a fixed key so `verify_slice` compares equal-length
/// tags in constant time.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let mac_of = |token: &str| {
        HmacSha256::new_from_slice(TOKEN_CONTEXT).map(|mut mac| {
            mac.update(token.as_bytes());
            mac
        })
    };
    match (mac_of(presented), mac_of(expected)) {
        (Ok(presented), Ok(expected)) => presented
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}
