//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// An external call exceeded its deadline
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Structured extraction from model output failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Intent classification failed
    #[error("Classification error: {0}")]
    Classification(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool parameters rejected
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool backend failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Parse error (e.g., model output parsing)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Session store error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ProviderUnavailable(_)
                | AgentError::Timeout(_)
                | AgentError::ToolExecution(_)
                | AgentError::RateLimited(_)
                | AgentError::Io(_)
        )
    }

    /// Errors that cannot be recovered inside a turn.
    ///
    /// These route a turn to the error state instead of a fallback path.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Session(_) | AgentError::Config(_) | AgentError::ToolNotFound(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(_) | AgentError::ProviderUnavailable(_) => {
                "Dịch vụ AI đang tạm thời gián đoạn. Bạn vui lòng thử lại sau ít phút.".into()
            }
            AgentError::Timeout(_) => {
                "Yêu cầu mất quá nhiều thời gian để xử lý. Bạn thử diễn đạt ngắn gọn hơn nhé.".into()
            }
            AgentError::ToolNotFound(_) | AgentError::Config(_) => {
                "Hệ thống tư vấn chưa được cấu hình đầy đủ. Bạn vui lòng thử lại sau.".into()
            }
            AgentError::ToolValidation(_) | AgentError::Extraction(_) => {
                "Mình chưa hiểu rõ yêu cầu. Bạn có thể nói cụ thể hơn về sản phẩm, hãng hoặc ngân sách không?".into()
            }
            AgentError::RateLimited(_) => {
                "Bạn đang gửi quá nhiều yêu cầu. Vui lòng chờ một chút.".into()
            }
            _ => "Xin lỗi, đã có lỗi xảy ra. Bạn có thể thử lại không?".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AgentError::Timeout(100).is_retryable());
        assert!(AgentError::ToolExecution("backend down".into()).is_retryable());
        assert!(!AgentError::ToolValidation("bad".into()).is_retryable());
        assert!(!AgentError::Config("missing".into()).is_retryable());
    }

    #[test]
    fn test_unrecoverable_classification() {
        assert!(AgentError::Session("poisoned".into()).is_unrecoverable());
        assert!(AgentError::ToolNotFound("search".into()).is_unrecoverable());
        assert!(!AgentError::Timeout(5).is_unrecoverable());
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = AgentError::Provider("connection refused at 127.0.0.1:11434".into());
        let msg = err.user_message();
        assert!(!msg.contains("127.0.0.1"));
        assert!(!msg.is_empty());
    }
}
