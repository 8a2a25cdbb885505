//! Application-wide error types.

use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    /// Rejected user input (empty login fields, out-of-range RAG params).
    /// The message is shown to the user as-is.
    #[error("{0}")]
    Input(String),

    /// A one-shot command whose rendered output is already an error
    /// report. Printed as-is before exiting non-zero.
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
