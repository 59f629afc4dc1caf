use axum::{extract::State, Json};
use tracing::info;

use super::AppState;
use crate::error::AppError;

/// Handle GET /billing
///
/// Always queries Cost Explorer directly.
pub async fn get_billing(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = state.cost_provider.fetch(&state.billing_query).await?;
    Ok(Json(result.into_inner()))
}

/// Handle GET /cached-billing
///
/// Serves from the read-through cache, fetching on a miss.
pub async fn get_cached_billing(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ttl = state.config.cache.ttl();
    let result = state
        .billing_cache
        .get_or_fetch(&state.billing_query, ttl)
        .await?;

    info!(
        start = %state.billing_query.start(),
        end = %state.billing_query.end(),
        "Served cached billing"
    );
    Ok(Json(result.into_inner()))
}
