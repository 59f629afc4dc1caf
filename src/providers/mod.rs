use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{BillingQuery, BillingResult, TerminationReceipt};

pub mod cost_explorer;
pub mod ec2;

pub use cost_explorer::CostExplorerClient;
pub use ec2::Ec2Client;

/// Source of billing data.
///
/// Implementations perform exactly one upstream call per `fetch` and never
/// retry; failures surface as `AppError::Provider`.
#[async_trait]
pub trait CostProvider: Send + Sync + 'static {
    /// Provider name used in logs and metrics (e.g. "cost_explorer")
    fn name(&self) -> &str;

    async fn fetch(&self, query: &BillingQuery) -> Result<BillingResult, AppError>;
}

/// Compute resource lifecycle actions.
#[async_trait]
pub trait ComputeProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Terminate a single resource. An empty id is rejected with
    /// `AppError::Validation` before any network call.
    async fn terminate(&self, resource_id: &str) -> Result<TerminationReceipt, AppError>;

    /// IDs of every instance visible to the caller, in response order.
    async fn list_instances(&self) -> Result<Vec<String>, AppError>;
}

/// Shared validation for `ComputeProvider::terminate` implementations.
pub fn validate_resource_id(resource_id: &str) -> Result<&str, AppError> {
    let trimmed = resource_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("resource_id is required".to_string()));
    }
    Ok(trimmed)
}
