use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub resources: Vec<ResourceUsage>,
}

#[derive(Debug, Serialize)]
pub struct ResourceUsage {
    pub name: &'static str,
    pub usage: u8,
}

/// Handle GET /usage
///
/// Fixed sample data; there is no usage source behind it.
pub async fn get_usage() -> Json<UsageResponse> {
    Json(UsageResponse {
        resources: vec![
            ResourceUsage { name: "EC2", usage: 75 },
            ResourceUsage { name: "S3", usage: 40 },
            ResourceUsage { name: "Lambda", usage: 90 },
        ],
    })
}
