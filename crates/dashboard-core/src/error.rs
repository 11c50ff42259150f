//! Error types for the analysis core

use dashboard_llm::LLMError;
use thiserror::Error;

/// Errors produced while running an analysis
///
/// Malformed model output never surfaces here: the parser absorbs it and
/// always yields a result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No backend has a usable credential
    #[error("No usable credential configured: {0}")]
    CredentialMissing(String),

    /// The backend rejected the call for quota/throughput reasons
    #[error("Rate limited by {backend}: {source}")]
    RateLimited {
        backend: String,
        #[source]
        source: LLMError,
    },

    /// Any other failed call (network, bad request, 5xx, empty text)
    #[error("Call to {backend} failed: {source}")]
    TransientCall {
        backend: String,
        #[source]
        source: LLMError,
    },

    /// Every attempt on every backend of the ladder failed
    #[error("All backends exhausted after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<AnalysisError>,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Context data could not be obtained for a stock
    #[error("Context unavailable for {code}: {reason}")]
    Context { code: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    /// Classify a provider error as rate-limited or transient
    pub fn from_llm(backend: impl Into<String>, source: LLMError) -> Self {
        let backend = backend.into();
        if source.is_rate_limited() {
            Self::RateLimited { backend, source }
        } else {
            Self::TransientCall { backend, source }
        }
    }

    /// True for [`AnalysisError::RateLimited`]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// True when the whole failover ladder was used up
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = AnalysisError::from_llm(
            "gemini/gemini-2.5-flash",
            LLMError::RateLimitExceeded("quota".to_string()),
        );
        assert!(err.is_rate_limited());

        let err = AnalysisError::from_llm(
            "openai/gpt-4o-mini",
            LLMError::RequestFailed("HTTP 503: unavailable".to_string()),
        );
        assert!(!err.is_rate_limited());
        assert!(err.to_string().contains("openai/gpt-4o-mini"));
    }

    #[test]
    fn test_exhausted_keeps_source() {
        let last = AnalysisError::from_llm("b", LLMError::EmptyResponse("b".to_string()));
        let err = AnalysisError::Exhausted {
            attempts: 5,
            source: Box::new(last),
        };

        assert!(err.is_exhausted());
        assert!(err.to_string().contains("after 5 attempts"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("Empty response"));
    }
}
