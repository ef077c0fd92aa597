use thiserror::Error;

/// Failure talking to a reasoning or embedding backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl LlmError {
    /// Whether the failure is a quota/rate-limit condition the caller may retry later.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            LlmError::RateLimited(_) => true,
            LlmError::Api { status, .. } => *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detection() {
        assert!(LlmError::RateLimited("quota".into()).is_rate_limited());
        assert!(LlmError::Api {
            status: 429,
            message: String::new()
        }
        .is_rate_limited());
        assert!(!LlmError::EmptyResponse.is_rate_limited());
        assert!(!LlmError::Timeout(5).is_rate_limited());
    }
}
