//! Error Types for the Product Advisor

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<AdvisorError> for AgentError {
    fn from(err: AdvisorError) -> Self {
        match err {
            AdvisorError::Catalog(msg) => AgentError::ToolExecution(msg),
            AdvisorError::ProductNotFound(name) => {
                AgentError::ToolValidation(format!("unknown product: {name}"))
            }
            AdvisorError::InvalidParams(msg) => AgentError::ToolValidation(msg),
            AdvisorError::Config(msg) => AgentError::Config(msg),
            AdvisorError::Serialization(e) => AgentError::Json(e),
        }
    }
}
