//! Metrics endpoint

use axum::{extract::State, Json};

use crate::{error::AppResult, metrics::MetricsSnapshot, AppState};

use super::AuthenticatedUser;

/// Current counters and gauges
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "metrics",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Metrics snapshot", body = MetricsSnapshot),
        (status = 403, description = "Admin only")
    )
)]
pub async fn get_metrics(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MetricsSnapshot>> {
    claims.require_admin()?;
    Ok(Json(state.metrics.snapshot()))
}
