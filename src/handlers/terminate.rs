use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::error::AppError;
use crate::models::TerminationReceipt;
use crate::providers::validate_resource_id;

#[derive(Debug, Deserialize)]
pub struct TerminateRequest {
    pub resource_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TerminateResponse {
    pub message: String,
    pub response: TerminationReceipt,
}

/// Handle POST /terminate
///
/// The body is parsed by hand so that a missing or unreadable body yields the
/// same 400 envelope as a missing `resource_id`.
pub async fn terminate_resource(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TerminateResponse>, AppError> {
    let requested = serde_json::from_slice::<TerminateRequest>(&body)
        .ok()
        .and_then(|req| req.resource_id)
        .unwrap_or_default();
    let resource_id = validate_resource_id(&requested)?;

    let receipt = state.compute_provider.terminate(resource_id).await?;

    info!(resource_id = %resource_id, "Resource terminated");
    Ok(Json(TerminateResponse {
        message: format!("Resource {} terminated successfully!", resource_id),
        response: receipt,
    }))
}
