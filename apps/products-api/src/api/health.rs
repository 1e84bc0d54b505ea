//! Readiness endpoint

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use axum_helpers::{run_health_checks, HealthCheckFuture};
use database::mongodb::check_health_detailed;

use crate::state::AppState;

/// `/ready`: 200 while MongoDB answers a ping, 503 otherwise
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let client = state.mongo_client.clone();
    let mongodb: HealthCheckFuture = Box::pin(async move {
        let status = check_health_detailed(&client).await;
        tracing::debug!(response_time_ms = status.response_time_ms, "MongoDB ping");
        if status.healthy {
            Ok(())
        } else {
            Err(status.message.unwrap_or_default())
        }
    });

    run_health_checks(vec![("mongodb", mongodb)]).await
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
