//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("underwriting error: {0}")]
    Underwriting(#[from] crate::underwriting::UnderwritingError),

    #[error("sanction letter error: {0}")]
    Sanction(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("comms error: {0}")]
    Comms(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
