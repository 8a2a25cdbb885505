//! Data loaders behind the portal views.
//!
//! Each loader is a cheap handle (clone it freely) that owns a published
//! state value. Callers drive it explicitly (`load`, `refresh`, `query`)
//! whenever their input changes, and either await the returned snapshot or
//! `subscribe()` to every transition.
//!
//! - **case_data**: case record lookup by case id.
//! - **combined_report**: read-through cached AI report per case.
//! - **rag_query**: question answering over the indexed guidelines.

pub mod case_data;
pub mod combined_report;
pub mod rag_query;

pub use case_data::CaseDataLoader;
pub use combined_report::{CombinedReportLoader, ReportState};
pub use rag_query::{RagParams, RagQueryLoader, RagState};
