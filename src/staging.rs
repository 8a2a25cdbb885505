//! Tumour staging statistics across every case.
//!
//! Walks `GET /allCaseIds` and fetches each case in turn, counting how often
//! each value occurs in the clinical (c) and pathological (p) TNM / UICC
//! staging fields.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, CaseRecord};

/// Staging columns in display order: clinical first, then pathological.
pub const STAGING_FIELDS: [&str; 8] = [
    "Staging clinic cT",
    "Staging Clinic N",
    "Staging Clinic M",
    "Staging Clinic UICC",
    "Staging Path pT",
    "Staging Path N",
    "Staging Path M",
    "Staging Path UICC",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingStats {
    /// field → value → number of cases.
    counts: BTreeMap<&'static str, BTreeMap<String, usize>>,
    /// Cases that were fetched successfully.
    pub cases_counted: usize,
    /// Cases skipped because their lookup failed.
    pub cases_failed: usize,
}

impl StagingStats {
    /// Fetch every case and aggregate its staging values.
    ///
    /// Failing to list case ids fails the whole collection; a failed
    /// individual case is logged and skipped.
    pub async fn collect(api: &ApiClient) -> Result<Self, ApiError> {
        let case_ids = api.all_case_ids().await?;
        debug!(cases = case_ids.len(), "collecting staging statistics");

        let mut stats = Self::default();
        for case_id in &case_ids {
            match api.get_case(case_id).await {
                Ok(response) => {
                    if let Some(record) = response.data.as_ref() {
                        stats.add(record);
                    }
                    stats.cases_counted += 1;
                }
                Err(e) => {
                    warn!(case_id = %case_id, error = %e, "skipping case in staging statistics");
                    stats.cases_failed += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Count the staging values present in one record.
    pub fn add(&mut self, record: &CaseRecord) {
        for field in STAGING_FIELDS {
            let Some(value) = record.get(field).and_then(value_label) else {
                continue;
            };
            *self.counts.entry(field).or_default().entry(value).or_insert(0) += 1;
        }
    }

    pub fn count(&self, field: &str, value: &str) -> usize {
        self.counts.get(field).and_then(|m| m.get(value)).copied().unwrap_or(0)
    }

    /// Values of `field`, most frequent first; ties ordered by value.
    pub fn sorted(&self, field: &str) -> Vec<(String, usize)> {
        let mut entries: Vec<(String, usize)> = self
            .counts
            .get(field)
            .map(|m| m.iter().map(|(v, n)| (v.clone(), *n)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

/// Display label for a cell; `None` for null or empty-string cells.
fn value_label(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
