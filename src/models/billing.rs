use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// Metric names accepted by Cost Explorer's GetCostAndUsage.
pub const SUPPORTED_METRICS: &[&str] = &[
    "AmortizedCost",
    "BlendedCost",
    "NetAmortizedCost",
    "NetUnblendedCost",
    "NormalizedUsageAmount",
    "UnblendedCost",
    "UsageQuantity",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Monthly => "MONTHLY",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated Cost Explorer query.
///
/// Fields are private so the only way to obtain one is through
/// [`BillingQuery::new`], which enforces the date ordering and metric names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingQuery {
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
    metrics: Vec<String>,
}

impl BillingQuery {
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
        metrics: Vec<String>,
    ) -> Result<Self, AppError> {
        if start > end {
            return Err(AppError::Validation(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        if metrics.is_empty() {
            return Err(AppError::Validation(
                "at least one metric is required".to_string(),
            ));
        }

        if let Some(unknown) = metrics
            .iter()
            .find(|m| !SUPPORTED_METRICS.contains(&m.as_str()))
        {
            return Err(AppError::Validation(format!(
                "unsupported metric '{}', expected one of: {}",
                unknown,
                SUPPORTED_METRICS.join(", ")
            )));
        }

        Ok(Self {
            start,
            end,
            granularity,
            metrics,
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Stable cache key for this query.
    ///
    /// Metrics are sorted and de-duplicated so that the same logical query
    /// always maps to the same entry.
    pub fn cache_key(&self, prefix: &str) -> String {
        let mut metrics: Vec<&str> = self.metrics.iter().map(String::as_str).collect();
        metrics.sort_unstable();
        metrics.dedup();

        format!(
            "{}:{}:{}:{}:{}",
            prefix,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d"),
            self.granularity,
            metrics.join(",")
        )
    }

    /// Request body for `AWSInsightsIndexService.GetCostAndUsage`.
    pub fn to_request_body(&self) -> serde_json::Value {
        serde_json::json!({
            "TimePeriod": {
                "Start": self.start.format("%Y-%m-%d").to_string(),
                "End": self.end.format("%Y-%m-%d").to_string(),
            },
            "Granularity": self.granularity.as_str(),
            "Metrics": self.metrics,
        })
    }
}

/// Cost Explorer response, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillingResult(pub serde_json::Value);

impl BillingResult {
    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn november() -> BillingQuery {
        BillingQuery::new(
            date("2023-11-01"),
            date("2023-11-30"),
            Granularity::Daily,
            vec!["UnblendedCost".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = BillingQuery::new(
            date("2023-12-01"),
            date("2023-11-01"),
            Granularity::Daily,
            vec!["UnblendedCost".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_same_day_range_is_allowed() {
        let q = BillingQuery::new(
            date("2023-11-01"),
            date("2023-11-01"),
            Granularity::Monthly,
            vec!["BlendedCost".to_string()],
        );
        assert!(q.is_ok());
    }

    #[test]
    fn test_rejects_empty_and_unknown_metrics() {
        let empty = BillingQuery::new(date("2023-11-01"), date("2023-11-30"), Granularity::Daily, vec![]);
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let unknown = BillingQuery::new(
            date("2023-11-01"),
            date("2023-11-30"),
            Granularity::Daily,
            vec!["Cheapness".to_string()],
        );
        match unknown {
            Err(AppError::Validation(msg)) => assert!(msg.contains("Cheapness")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_cache_key_ignores_metric_order() {
        let a = BillingQuery::new(
            date("2023-11-01"),
            date("2023-11-30"),
            Granularity::Daily,
            vec!["UnblendedCost".to_string(), "BlendedCost".to_string()],
        )
        .unwrap();
        let b = BillingQuery::new(
            date("2023-11-01"),
            date("2023-11-30"),
            Granularity::Daily,
            vec![
                "BlendedCost".to_string(),
                "UnblendedCost".to_string(),
                "BlendedCost".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(a.cache_key("billing"), b.cache_key("billing"));
        assert_eq!(
            a.cache_key("billing"),
            "billing:2023-11-01:2023-11-30:DAILY:BlendedCost,UnblendedCost"
        );
    }

    #[test]
    fn test_cache_key_distinguishes_granularity() {
        let daily = november();
        let monthly = BillingQuery::new(
            daily.start(),
            daily.end(),
            Granularity::Monthly,
            daily.metrics().to_vec(),
        )
        .unwrap();
        assert_ne!(daily.cache_key("billing"), monthly.cache_key("billing"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = november().to_request_body();
        assert_eq!(
            body,
            serde_json::json!({
                "TimePeriod": { "Start": "2023-11-01", "End": "2023-11-30" },
                "Granularity": "DAILY",
                "Metrics": ["UnblendedCost"],
            })
        );
    }

    #[test]
    fn test_granularity_deserializes_uppercase() {
        let g: Granularity = serde_json::from_str("\"MONTHLY\"").unwrap();
        assert_eq!(g, Granularity::Monthly);
    }
}
