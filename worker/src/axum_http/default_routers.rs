use axum::{http::StatusCode, response::IntoResponse};
use tracing::info;

pub async fn not_found() -> impl IntoResponse {
    info!("scheduler worker: no route matched");
    (StatusCode::NOT_FOUND, "NOT_FOUND").into_response()
}

/// Liveness only; a failing scan does not make the worker unhealthy.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_routes_and_health_answer_plainly() {
        assert_eq!(
            not_found().await.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            health_check().await.into_response().status(),
            StatusCode::OK
        );
    }
}
