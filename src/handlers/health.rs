use axum::extract::State;

use super::AppState;
use crate::error::AppError;

const CHECK_KEY: &str = "test";
const CHECK_VALUE: &str = "Redis is running!";

/// Liveness check for GET /
pub async fn home() -> &'static str {
    "Backend is running!"
}

/// Handle GET /redis-test
///
/// Writes a marker value to the cache backend and reads it back.
pub async fn redis_test(State(state): State<AppState>) -> Result<String, AppError> {
    state
        .store
        .set_ex(CHECK_KEY, CHECK_VALUE.to_string(), state.config.cache.ttl())
        .await?;

    state
        .store
        .get(CHECK_KEY)
        .await?
        .ok_or_else(|| AppError::Cache("marker value missing after write".to_string()))
}
