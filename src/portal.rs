//! Portal shell: login gate plus the case, summary, RAG and staging views.
//!
//! [`Portal::handle`] takes one line of input and returns what to print, so
//! the same dispatch backs the interactive console and the tests. Where the
//! user is in the login flow is derived from the [`SessionStore`]: no case
//! id means the gate asks for one, no user name means it asks for that, and
//! only then are commands accepted.

use std::fmt::Write as _;
use std::io::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, CaseRecord};
use crate::config::Config;
use crate::error::AppError;
use crate::loaders::{CaseDataLoader, CombinedReportLoader, RagParams, RagQueryLoader, RagState, ReportState};
use crate::loaders::case_data::CaseState;
use crate::session::SessionStore;
use crate::staging::{STAGING_FIELDS, StagingStats};

const HELP: &str = "\
Commands:
  home                 show who is signed in
  case                 show the case record
  summary              show the combined report (cached when available)
  regenerate           generate a fresh combined report
  ask <question>       query the guideline documents
  topk <n>             number of source chunks to retrieve (>= 1)
  temperature <t>      answer temperature (0 to 1)
  staging              staging distribution across all cases
  logout               sign out and clear cached reports
  help                 this text
  quit                 leave the portal";

/// Result of handling one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub output: String,
    pub quit: bool,
}

impl Reply {
    fn show(output: impl Into<String>) -> Self {
        Self { output: output.into(), quit: false }
    }
}

#[derive(Clone)]
pub struct Portal {
    api: ApiClient,
    store: SessionStore,
    cases: CaseDataLoader,
    reports: CombinedReportLoader,
    rag: RagQueryLoader,
}

impl Portal {
    pub fn new(api: ApiClient, store: SessionStore, rag_params: RagParams) -> Self {
        Self {
            cases: CaseDataLoader::new(api.clone()),
            reports: CombinedReportLoader::new(api.clone(), store.clone()),
            rag: RagQueryLoader::new(api.clone(), rag_params),
            api,
            store,
        }
    }

    pub fn from_config(config: &Config, store: SessionStore) -> Result<Self, AppError> {
        let api = ApiClient::from_config(&config.api)?;
        Ok(Self::new(api, store, RagParams::from(&config.rag)))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn prompt(&self) -> &'static str {
        if self.store.case_id().is_empty() {
            "case number> "
        } else if !self.store.is_authenticated() {
            "your name> "
        } else {
            "portal> "
        }
    }

    pub async fn handle(&self, line: &str) -> Reply {
        let line = line.trim();
        if matches!(line, "quit" | "exit") {
            return Reply { output: "Goodbye.".into(), quit: true };
        }

        if self.store.case_id().is_empty() {
            return match self.store.login_case(line) {
                Ok(()) => Reply::show("Enter your name to proceed."),
                Err(e) => Reply::show(e.to_string()),
            };
        }
        if !self.store.is_authenticated() {
            return match self.store.login_user(line) {
                Ok(()) => Reply::show(self.home()),
                Err(e) => Reply::show(e.to_string()),
            };
        }

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };
        debug!(command, "portal command");

        let case_id = self.store.case_id();
        let output = match command {
            "" => String::new(),
            "help" => HELP.to_string(),
            "home" => self.home(),
            "case" => render_case(&self.cases.load(Some(case_id.as_str())).await),
            "summary" => self.summary(false).await,
            "regenerate" => self.summary(true).await,
            "ask" => render_rag(&self.rag.query(arg).await),
            "topk" => match arg.parse::<u32>() {
                Ok(k) => match self.rag.set_top_k(k) {
                    Ok(()) => format!("top_k = {k}"),
                    Err(e) => e.to_string(),
                },
                Err(_) => "usage: topk <n>".into(),
            },
            "temperature" => match arg.parse::<f32>() {
                Ok(t) => match self.rag.set_temperature(t) {
                    Ok(()) => format!("temperature = {t}"),
                    Err(e) => e.to_string(),
                },
                Err(_) => "usage: temperature <t>".into(),
            },
            "staging" => match StagingStats::collect(&self.api).await {
                Ok(stats) => render_staging(&stats),
                Err(e) => format!("Error: {e}"),
            },
            "logout" => {
                self.logout().await;
                "Signed out. Enter a case number to sign in again.".into()
            }
            other => format!("Unknown command '{other}'. Type 'help' for commands."),
        };
        Reply::show(output)
    }

    fn home(&self) -> String {
        let s = self.store.snapshot();
        format!("Welcome, {}. Active case: {}. Type 'help' for commands.", s.user_name, s.case_id)
    }

    /// Case data first, then the combined report built from it.
    async fn summary(&self, regenerate: bool) -> String {
        let case_id = self.store.case_id();
        let case_state = self.cases.load(Some(case_id.as_str())).await;
        let record: Option<CaseRecord> = case_state.data.as_ref().and_then(|r| r.record()).cloned();

        let Some(record) = record else {
            return render_case(&case_state);
        };

        let report = if regenerate {
            self.reports.refresh(Some(case_id.as_str()), Some(&record)).await
        } else {
            self.reports.load(Some(case_id.as_str()), Some(&record)).await
        };
        render_report(&case_id, &report)
    }

    async fn logout(&self) {
        self.store.logout();
        self.cases.load(None).await;
        self.reports.load(None, None).await;
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

pub fn render_case(state: &CaseState) -> String {
    if let Some(error) = &state.error {
        return format!("Error: {error}");
    }
    let Some(record) = state.data.as_ref().and_then(|r| r.record()) else {
        return "No case data available.".into();
    };

    let mut out = String::new();
    for (field, value) in record {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "-".into(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "  {field}: {value}");
    }
    out.trim_end().to_string()
}

pub fn render_report(case_id: &str, state: &ReportState) -> String {
    if let Some(error) = &state.error {
        return format!("Error: {error}");
    }
    let Some(report) = &state.report else {
        return "No report available.".into();
    };
    let origin = if state.is_cached { "cached" } else { "generated" };
    let mut out = format!("Combined report for {case_id} ({origin}");
    if !report.timestamp.is_empty() {
        let _ = write!(out, ", {}", report.timestamp);
    }
    let _ = write!(out, ")\n\n{}", report.clinical_report.trim());
    out
}

pub fn render_rag(state: &RagState) -> String {
    if let Some(error) = &state.error {
        return format!("Error: {error}");
    }
    let mut out = format!("Answer:\n{}", state.answer.trim());
    if !state.relevant_chunks.is_empty() {
        let total = state.relevant_chunks.len();
        out.push_str("\n\nSources:");
        for chunk in &state.relevant_chunks {
            let _ = write!(
                out,
                "\n  #{} of {total}  {:.1}%\n    {}",
                chunk.rank,
                chunk.similarity_percentage,
                chunk.text.trim()
            );
        }
    }
    out
}

pub fn render_staging(stats: &StagingStats) -> String {
    let mut out = format!(
        "Staging distribution ({} cases, {} skipped)",
        stats.cases_counted, stats.cases_failed
    );
    for field in STAGING_FIELDS {
        let _ = write!(out, "\n{field}:");
        let entries = stats.sorted(field);
        if entries.is_empty() {
            out.push_str(" no data");
        }
        for (value, count) in entries {
            let _ = write!(out, "\n  {value:<10} {count}");
        }
    }
    out
}

// ── Console ───────────────────────────────────────────────────────────────────

/// Read lines from stdin until `quit`, EOF or `shutdown` is cancelled.
pub async fn run_console(portal: Portal, shutdown: CancellationToken) -> Result<(), AppError> {
    info!("portal console started");
    println!("─────────────────────────────────");
    println!(" Case portal  (Ctrl-C to quit)");
    println!("─────────────────────────────────");

    run_lines(&portal, BufReader::new(tokio::io::stdin()), shutdown).await
}

/// Console loop over any line source. Cancelling `shutdown` also abandons
/// a command whose request is still in flight.
pub async fn run_lines<R>(portal: &Portal, input: R, shutdown: CancellationToken) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        print!("{}", portal.prompt());
        let _ = std::io::stdout().flush();

        let input = tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            line = lines.next_line() => match line {
                Err(e) => {
                    warn!("console read error: {e}");
                    return Err(e.into());
                }
                Ok(None) => {
                    info!("console stdin closed");
                    return Ok(());
                }
                Ok(Some(input)) => input,
            },
        };

        let reply = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("abandoning in-flight command");
                break;
            }

            reply = portal.handle(&input) => reply,
        };

        if !reply.output.is_empty() {
            println!("{}", reply.output);
        }
        if reply.quit {
            return Ok(());
        }
    }

    println!();
    info!("portal console shutting down");
    Ok(())
}
