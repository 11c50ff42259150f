//! Error types for LLM operations

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit or quota exceeded (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// The backend answered but produced no text
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Message fragments backends use for quota/throughput rejections
const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "quota",
    "resource has been exhausted",
    "resource_exhausted",
];

impl LLMError {
    /// Whether the backend signalled a quota/throughput rejection.
    ///
    /// Besides the dedicated variant, some backends report quota problems as
    /// generic failures, so the message text is checked for the usual markers.
    pub fn is_rate_limited(&self) -> bool {
        if matches!(self, Self::RateLimitExceeded(_)) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        RATE_LIMIT_MARKERS.iter().any(|marker| text.contains(marker))
    }

    /// Map a non-success HTTP status to an error
    pub(crate) fn from_status(status: u16, model: &str, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed,
            429 => Self::RateLimitExceeded(body),
            400 => Self::InvalidRequest(body),
            404 => Self::ModelNotFound(model.to_string()),
            _ => Self::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_variant() {
        assert!(LLMError::RateLimitExceeded("slow down".to_string()).is_rate_limited());
    }

    #[test]
    fn test_rate_limit_markers_in_text() {
        assert!(LLMError::RequestFailed("HTTP 429: Too Many Requests".to_string()).is_rate_limited());
        assert!(LLMError::RequestFailed("Resource has been exhausted (check quota)".to_string())
            .is_rate_limited());
        assert!(!LLMError::RequestFailed("HTTP 503: backend unavailable".to_string())
            .is_rate_limited());
        assert!(!LLMError::AuthenticationFailed.is_rate_limited());
    }

    #[test]
    fn test_generate_content_url_is_not_rate_limit() {
        let transport = LLMError::RequestFailed(
            "error sending request for url (https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent)"
                .to_string(),
        );
        assert!(!transport.is_rate_limited());
        assert!(!LLMError::EmptyResponse("gemini/gemini-2.5-flash".to_string()).is_rate_limited());

        assert!(LLMError::RequestFailed("Rate limit reached for gpt-4o-mini".to_string()).is_rate_limited());
        assert!(LLMError::InvalidRequest("{\"code\": \"rate_limit_exceeded\"}".to_string()).is_rate_limited());
        assert!(LLMError::RequestFailed("RESOURCE_EXHAUSTED".to_string()).is_rate_limited());
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            LLMError::from_status(429, "m", "quota".to_string()),
            LLMError::RateLimitExceeded(_)
        ));
        assert!(matches!(
            LLMError::from_status(404, "gemini-x", String::new()),
            LLMError::ModelNotFound(m) if m == "gemini-x"
        ));
        assert!(matches!(
            LLMError::from_status(500, "m", "boom".to_string()),
            LLMError::RequestFailed(_)
        ));
    }
}
