//! Wire types for the portal API.
//!
//! Field names follow the API's camelCase JSON. Decoding also accepts the
//! snake_case spellings some backend versions emit.

use serde::{Deserialize, Serialize};

/// One patient case: column name → cell value.
pub type CaseRecord = serde_json::Map<String, serde_json::Value>;

/// `GET /case/{caseId}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResponse {
    #[serde(default, alias = "fallnummer", skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    #[serde(default)]
    pub data: Option<CaseRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CaseResponse {
    /// The case record, if the response carried a non-empty one.
    pub fn record(&self) -> Option<&CaseRecord> {
        self.data.as_ref().filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedReportRequest<'a> {
    pub case_id: &'a str,
    pub data: &'a CaseRecord,
}

/// `POST /combinedReport` response: the generated clinical summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedReport {
    #[serde(alias = "clinical_report")]
    pub clinical_report: String,
    /// Generation time as reported by the server (ISO-8601).
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagRequest {
    pub question: String,
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
}

/// A source excerpt that supported a RAG answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevantChunk {
    #[serde(default)]
    pub rank: u32,
    #[serde(default, alias = "similarity_percentage")]
    pub similarity_percentage: f64,
    pub text: String,
}

/// `POST /queryRAG` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagResponse {
    pub answer: String,
    #[serde(default, alias = "relevant_chunks")]
    relevant_chunks: Option<Vec<RelevantChunk>>,
}

impl RagResponse {
    /// Chunks in server order; empty when the field is absent or null.
    pub fn into_parts(self) -> (String, Vec<RelevantChunk>) {
        (self.answer, self.relevant_chunks.unwrap_or_default())
    }
}

/// `GET /allCaseIds` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllCaseIdsResponse {
    #[serde(alias = "fallnummers")]
    pub case_ids: Vec<String>,
}

/// Error body; FastAPI-style servers put the human message in `detail`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}
