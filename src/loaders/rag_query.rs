//! RAG query loader: asks a question of the retrieval-augmented endpoint.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, RagRequest, RelevantChunk};
use crate::config::{DEFAULT_RAG_MODEL, DEFAULT_RAG_TEMPERATURE, DEFAULT_RAG_TOP_K, RagConfig};
use crate::error::AppError;
use crate::fetch::Guarded;

const EMPTY_QUESTION: &str = "Please enter a question";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RagState {
    /// Empty until a query succeeds.
    pub answer: String,
    /// Supporting excerpts in rank order.
    pub relevant_chunks: Vec<RelevantChunk>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Parameters sent with each query.
#[derive(Debug, Clone, PartialEq)]
pub struct RagParams {
    pub model: String,
    /// Number of chunks to retrieve, at least 1.
    pub top_k: u32,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
}

impl Default for RagParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_RAG_MODEL.to_string(),
            top_k: DEFAULT_RAG_TOP_K,
            temperature: DEFAULT_RAG_TEMPERATURE,
        }
    }
}

impl From<&RagConfig> for RagParams {
    fn from(config: &RagConfig) -> Self {
        Self { model: config.model.clone(), top_k: config.top_k, temperature: config.temperature }
    }
}

#[derive(Clone)]
pub struct RagQueryLoader {
    api: ApiClient,
    params: Arc<watch::Sender<RagParams>>,
    state: Arc<Guarded<RagState>>,
}

impl RagQueryLoader {
    pub fn new(api: ApiClient, params: RagParams) -> Self {
        let (params, _rx) = watch::channel(params);
        Self {
            api,
            params: Arc::new(params),
            state: Arc::new(Guarded::new(RagState::default())),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RagState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RagState {
        self.state.snapshot()
    }

    pub fn params(&self) -> RagParams {
        self.params.borrow().clone()
    }

    pub fn set_top_k(&self, top_k: u32) -> Result<(), AppError> {
        if top_k == 0 {
            return Err(AppError::Input("top_k must be at least 1".into()));
        }
        self.params.send_modify(|p| p.top_k = top_k);
        Ok(())
    }

    pub fn set_temperature(&self, temperature: f32) -> Result<(), AppError> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(AppError::Input(format!(
                "temperature must be between 0 and 1, got {temperature}"
            )));
        }
        self.params.send_modify(|p| p.temperature = temperature);
        Ok(())
    }

    /// Ask `question`, replacing whatever result is currently shown.
    ///
    /// A blank question clears the previous result and sets an inline
    /// error; nothing is sent.
    pub async fn query(&self, question: &str) -> RagState {
        if question.trim().is_empty() {
            self.state.begin(|s| {
                *s = RagState { error: Some(EMPTY_QUESTION.to_string()), ..RagState::default() };
            });
            return self.state();
        }

        let params = self.params();
        let request = RagRequest {
            question: question.to_string(),
            model: params.model,
            temperature: params.temperature,
            top_k: params.top_k,
        };

        let ticket = self.state.begin(|s| {
            *s = RagState { loading: true, ..RagState::default() };
        });

        let result = self.api.query_rag(&request).await;

        let applied = self.state.settle(ticket, |s| {
            s.loading = false;
            match result {
                Ok(response) => {
                    let (answer, chunks) = response.into_parts();
                    debug!(chunks = chunks.len(), answer_len = answer.len(), "RAG answer received");
                    s.answer = answer;
                    s.relevant_chunks = chunks;
                }
                Err(e) => {
                    warn!(error = %e, "RAG query failed");
                    s.error = Some(error_message(&e));
                }
            }
        });
        if !applied {
            debug!("discarding superseded RAG response");
        }

        self.state()
    }
}

/// Server detail when present, otherwise a generic description.
fn error_message(e: &ApiError) -> String {
    if let Some(detail) = e.detail() {
        return detail.to_string();
    }
    match e {
        ApiError::Status { status, reason, .. } => format!("Error: {status} {reason}"),
        other => format!("Failed to query RAG system: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> RagQueryLoader {
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        RagQueryLoader::new(api, RagParams::default())
    }

    #[test]
    fn defaults() {
        let p = loader().params();
        assert_eq!(p.top_k, 3);
        assert!((p.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(p.model, "gpt-4o-mini");
    }

    #[test]
    fn params_are_validated() {
        let l = loader();
        assert!(l.set_top_k(0).is_err());
        assert!(l.set_temperature(1.2).is_err());
        assert!(l.set_temperature(f32::NAN).is_err());

        l.set_top_k(5).unwrap();
        l.set_temperature(0.0).unwrap();
        assert_eq!(l.params().top_k, 5);
        assert_eq!(l.params().temperature, 0.0);
    }

    #[tokio::test]
    async fn blank_question_sets_error_without_loading() {
        let l = loader();
        let state = l.query("   \t").await;
        assert_eq!(state.error.as_deref(), Some("Please enter a question"));
        assert!(!state.loading);
        assert!(state.answer.is_empty());
    }

    #[test]
    fn error_message_prefers_detail() {
        let with_detail = ApiError::Status {
            status: 400,
            reason: "Bad Request".into(),
            detail: Some("invalid model".into()),
        };
        assert_eq!(error_message(&with_detail), "invalid model");

        let without = ApiError::Status { status: 500, reason: "Internal Server Error".into(), detail: None };
        assert_eq!(error_message(&without), "Error: 500 Internal Server Error");

        let transport = ApiError::Transport("connection refused".into());
        assert!(error_message(&transport).contains("connection refused"));
    }
}
