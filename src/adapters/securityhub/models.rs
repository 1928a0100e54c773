//! Wire types for the findings API
//!
//! Field names follow the GetFindings JSON shape (`Filters`, `NextToken`,
//! `MaxResults`, `Findings`).

use crate::config::SourceConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Equality filter on a string attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringFilter {
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Comparison")]
    pub comparison: String,
}

impl StringFilter {
    /// `EQUALS` comparison
    pub fn equals(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            comparison: "EQUALS".to_string(),
        }
    }
}

/// Closed time window filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    #[serde(rename = "Start")]
    pub start: String,
    #[serde(rename = "End")]
    pub end: String,
}

/// Finding selection criteria; empty selects every finding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingFilter {
    #[serde(rename = "UpdatedAt", default, skip_serializing_if = "Vec::is_empty")]
    pub updated_at: Vec<DateFilter>,

    #[serde(rename = "RecordState", default, skip_serializing_if = "Vec::is_empty")]
    pub record_state: Vec<StringFilter>,

    #[serde(rename = "WorkflowStatus", default, skip_serializing_if = "Vec::is_empty")]
    pub workflow_status: Vec<StringFilter>,
}

impl FindingFilter {
    /// Builds the filter described by `[source]` as of `now`
    ///
    /// `lookback_days = N` selects findings updated between midnight UTC
    /// N days ago and `now`.
    pub fn from_config(config: &SourceConfig, now: DateTime<Utc>) -> Self {
        let updated_at = config
            .lookback_days
            .map(|days| {
                let midnight = now
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .map(|naive| naive.and_utc())
                    .unwrap_or(now);
                vec![DateFilter {
                    start: format_timestamp(midnight - Duration::days(i64::from(days))),
                    end: format_timestamp(now),
                }]
            })
            .unwrap_or_default();

        Self {
            updated_at,
            record_state: config
                .record_state
                .iter()
                .map(StringFilter::equals)
                .collect(),
            workflow_status: config
                .workflow_status
                .iter()
                .map(StringFilter::equals)
                .collect(),
        }
    }

    /// True when nothing is filtered
    pub fn is_empty(&self) -> bool {
        self.updated_at.is_empty() && self.record_state.is_empty() && self.workflow_status.is_empty()
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Request body of `POST /findings`
#[derive(Debug, Clone, Serialize)]
pub struct GetFindingsRequest<'a> {
    #[serde(rename = "Filters")]
    pub filters: &'a FindingFilter,

    #[serde(rename = "NextToken", skip_serializing_if = "Option::is_none")]
    pub next_token: Option<&'a str>,

    #[serde(rename = "MaxResults")]
    pub max_results: u32,
}

/// Response body of `POST /findings`
#[derive(Debug, Clone, Deserialize)]
pub struct GetFindingsResponse {
    #[serde(rename = "Findings", default)]
    pub findings: Vec<serde_json::Value>,

    #[serde(rename = "NextToken", default)]
    pub next_token: Option<String>,
}
