//! Combined report loader: read-through cache over `POST /combinedReport`.
//!
//! Reports are AI-generated and expensive, so a cached entry in the
//! [`SessionStore`] is served until the caller explicitly asks for a
//! [`refresh`](CombinedReportLoader::refresh). There is no expiry.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::api::{ApiClient, CaseRecord, CombinedReport};
use crate::fetch::Guarded;
use crate::session::SessionStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportState {
    pub report: Option<CombinedReport>,
    pub loading: bool,
    pub error: Option<String>,
    /// `true` when `report` was served from the session cache.
    pub is_cached: bool,
}

#[derive(Clone)]
pub struct CombinedReportLoader {
    api: ApiClient,
    store: SessionStore,
    state: Arc<Guarded<ReportState>>,
}

impl CombinedReportLoader {
    pub fn new(api: ApiClient, store: SessionStore) -> Self {
        Self { api, store, state: Arc::new(Guarded::new(ReportState::default())) }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReportState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ReportState {
        self.state.snapshot()
    }

    /// Serve the report for `case_id` from cache, or fetch it on a miss.
    pub async fn load(&self, case_id: Option<&str>, case_data: Option<&CaseRecord>) -> ReportState {
        self.resolve(case_id, case_data, false).await
    }

    /// Regenerate the report, bypassing and then overwriting the cache entry.
    pub async fn refresh(&self, case_id: Option<&str>, case_data: Option<&CaseRecord>) -> ReportState {
        self.resolve(case_id, case_data, true).await
    }

    async fn resolve(
        &self,
        case_id: Option<&str>,
        case_data: Option<&CaseRecord>,
        force: bool,
    ) -> ReportState {
        let case_id = case_id.filter(|id| !id.is_empty());
        let case_data = case_data.filter(|d| !d.is_empty());
        let (Some(case_id), Some(case_data)) = (case_id, case_data) else {
            self.state.begin(|s| *s = ReportState::default());
            return self.state();
        };

        if !force {
            if let Some(entry) = self.store.cached_report(case_id) {
                debug!(case_id, cached_at = %entry.timestamp, "serving cached report");
                self.state.begin(|s| {
                    *s = ReportState {
                        report: Some(entry.report),
                        loading: false,
                        error: None,
                        is_cached: true,
                    }
                });
                return self.state();
            }
        }

        debug!(case_id, force, "generating combined report");
        let ticket = self.state.begin(|s| {
            s.loading = true;
            s.error = None;
            s.is_cached = false;
        });

        let result = self.api.combined_report(case_id, case_data).await;

        let applied = self.state.settle(ticket, |s| {
            s.loading = false;
            match result {
                Ok(report) => {
                    self.store.set_cached_report(case_id, report.clone());
                    s.report = Some(report);
                    s.error = None;
                }
                Err(e) => {
                    s.report = None;
                    s.error = Some(e.to_string());
                }
            }
        });
        if !applied {
            debug!(case_id, "discarding superseded report response");
        }

        self.state()
    }
}
