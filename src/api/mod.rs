//! HTTP client for the portal API.
//!
//! [`ApiClient`] is constructed once and cloned freely (`reqwest::Client`
//! is an `Arc` internally). Every method is one round-trip; caching,
//! request gating and stale-response handling live in the loaders.

pub mod types;

use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ApiConfig;
pub use types::{
    AllCaseIdsResponse, CaseRecord, CaseResponse, CombinedReport, CombinedReportRequest,
    RagRequest, RagResponse, RelevantChunk,
};
use types::ErrorEnvelope;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API url: {0}")]
    InvalidUrl(String),

    /// Transport-level failure (connection refused, timeout, TLS).
    /// Displays the underlying description unchanged.
    #[error("{0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("API error: {status} {reason}")]
    Status {
        status: u16,
        reason: String,
        /// Server-provided `detail` message, when the body carried one.
        detail: Option<String>,
    },

    #[error("failed to parse response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Server-provided detail message, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
}

impl ApiClient {
    /// Client with the transport's default timeouts.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self { base_url: parse_base(base_url)?, client: Client::new() })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url: parse_base(&config.base_url)?, client })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `GET /case/{caseId}`
    pub async fn get_case(&self, case_id: &str) -> Result<CaseResponse, ApiError> {
        let url = self.endpoint(&["case", case_id])?;
        debug!(%url, "fetching case");
        let response = self.client.get(url).send().await.map_err(transport)?;
        decode(check_status(response).await?).await
    }

    /// `POST /combinedReport`
    pub async fn combined_report(
        &self,
        case_id: &str,
        data: &CaseRecord,
    ) -> Result<CombinedReport, ApiError> {
        let url = self.endpoint(&["combinedReport"])?;
        debug!(%url, case_id, fields = data.len(), "requesting combined report");
        let response = self
            .client
            .post(url)
            .json(&CombinedReportRequest { case_id, data })
            .send()
            .await
            .map_err(transport)?;
        decode(check_status(response).await?).await
    }

    /// `POST /queryRAG`
    pub async fn query_rag(&self, request: &RagRequest) -> Result<RagResponse, ApiError> {
        let url = self.endpoint(&["queryRAG"])?;
        debug!(
            %url,
            model = %request.model,
            top_k = request.top_k,
            temperature = request.temperature,
            question_len = request.question.len(),
            "sending RAG query"
        );
        let response = self.client.post(url).json(request).send().await.map_err(transport)?;
        decode(check_status(response).await?).await
    }

    /// `GET /allCaseIds`
    pub async fn all_case_ids(&self) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(&["allCaseIds"])?;
        let response = self.client.get(url).send().await.map_err(transport)?;
        let parsed: AllCaseIdsResponse = decode(check_status(response).await?).await?;
        Ok(parsed.case_ids)
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn parse_base(base_url: &str) -> Result<Url, ApiError> {
    let url = Url::parse(base_url.trim_end_matches('/'))
        .map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(base_url.to_string()));
    }
    Ok(url)
}

fn transport(e: reqwest::Error) -> ApiError {
    warn!(error = %e, "API request failed (transport)");
    ApiError::Transport(e.to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(|e| ApiError::Decode(e.to_string()))
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|env| env.detail)
        .map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

    warn!(%status, detail = ?detail, "API returned HTTP error");
    Err(ApiError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("").to_string(),
        detail,
    })
}
