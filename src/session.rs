//! Session store: signed-in identity plus the per-case report cache.
//!
//! [`SessionStore`] is a cheap handle over shared state: clone it into every
//! loader and view that needs it. Each mutation is one synchronous,
//! last-writer-wins state transition published through a `watch` channel,
//! so subscribers observe e.g. a logout as a single update.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::api::CombinedReport;
use crate::error::AppError;

// ── Session ───────────────────────────────────────────────────────────────────

/// A cached combined report and the wall-clock time it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedReport {
    pub report: CombinedReport,
    /// RFC 3339 timestamp captured when the entry was written.
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub case_id: String,
    pub user_name: String,
    pub report_cache: HashMap<String, CachedReport>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        !self.user_name.is_empty()
    }
}

// ── SessionStore ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<watch::Sender<Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        Self { inner: Arc::new(tx) }
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every subsequent state transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.inner.borrow().clone()
    }

    pub fn case_id(&self) -> String {
        self.inner.borrow().case_id.clone()
    }

    pub fn user_name(&self) -> String {
        self.inner.borrow().user_name.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.borrow().is_authenticated()
    }

    pub fn set_case_id(&self, case_id: impl Into<String>) {
        let case_id = case_id.into();
        self.inner.send_modify(|s| s.case_id = case_id);
    }

    pub fn set_user_name(&self, user_name: impl Into<String>) {
        let user_name = user_name.into();
        self.inner.send_modify(|s| s.user_name = user_name);
    }

    /// First login step: record the trimmed case number.
    pub fn login_case(&self, input: &str) -> Result<(), AppError> {
        let case_id = input.trim();
        if case_id.is_empty() {
            return Err(AppError::Input("Please enter a case number".into()));
        }
        self.set_case_id(case_id);
        Ok(())
    }

    /// Second login step: record the trimmed user name.
    pub fn login_user(&self, input: &str) -> Result<(), AppError> {
        let user_name = input.trim();
        if user_name.is_empty() {
            return Err(AppError::Input("Please enter your name".into()));
        }
        self.set_user_name(user_name);
        info!(user = user_name, case_id = %self.case_id(), "user signed in");
        Ok(())
    }

    /// Clear identity and every cached report in one transition.
    pub fn logout(&self) {
        self.inner.send_modify(|s| *s = Session::default());
        info!("session cleared");
    }

    pub fn cached_report(&self, case_id: &str) -> Option<CachedReport> {
        self.inner.borrow().report_cache.get(case_id).cloned()
    }

    /// Insert or overwrite the entry for `case_id`, stamped with the current time.
    pub fn set_cached_report(&self, case_id: impl Into<String>, report: CombinedReport) {
        let entry = CachedReport { report, timestamp: chrono::Utc::now().to_rfc3339() };
        let case_id = case_id.into();
        self.inner.send_modify(|s| {
            s.report_cache.insert(case_id, entry);
        });
    }

    pub fn clear_cached_report(&self, case_id: &str) {
        self.inner.send_if_modified(|s| s.report_cache.remove(case_id).is_some());
    }

    pub fn clear_all_cached_reports(&self) {
        self.inner.send_modify(|s| s.report_cache.clear());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
