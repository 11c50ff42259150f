//! Configuration for the analysis core

use crate::error::{AnalysisError, Result};
use dashboard_utils::{env_parse, env_string};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default primary model of provider A
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
/// Default fallback model of provider A
pub const DEFAULT_GEMINI_MODEL_FALLBACK: &str = "gemini-2.0-flash";
/// Default model of provider B
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// A credential is usable when it is non-empty, longer than ten characters
/// and not a template placeholder such as `your_api_key_here`.
pub fn is_valid_credential(key: Option<&str>) -> bool {
    key.map(str::trim)
        .is_some_and(|k| k.chars().count() > 10 && !k.starts_with("your_"))
}

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_output_tokens: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 8192,
        }
    }
}

/// Configuration for the analyzer and its provider ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Provider A (Gemini) API key
    pub gemini_api_key: Option<String>,

    /// Provider A primary model
    pub gemini_model: String,

    /// Provider A model used after repeated failures
    pub gemini_model_fallback: String,

    /// Provider B (OpenAI-compatible) API key
    pub openai_api_key: Option<String>,

    /// Provider B base URL; the official endpoint when unset
    pub openai_base_url: Option<String>,

    /// Provider B model
    pub openai_model: String,

    /// Attempts per provider
    pub max_retries: u32,

    /// Base of the exponential backoff
    pub retry_base_delay: Duration,

    /// Pause before every analysis request
    pub request_delay: Duration,

    /// Generation parameters
    pub generation: GenerationOptions,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_model_fallback: DEFAULT_GEMINI_MODEL_FALLBACK.to_string(),
            openai_api_key: None,
            openai_base_url: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            max_retries: 5,
            retry_base_delay: Duration::from_secs(5),
            request_delay: Duration::ZERO,
            generation: GenerationOptions::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder::default()
    }

    /// Load configuration from environment variables
    ///
    /// Reads `GEMINI_API_KEY`, `GEMINI_MODEL`, `GEMINI_MODEL_FALLBACK`,
    /// `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`,
    /// `GEMINI_MAX_RETRIES`, `GEMINI_RETRY_DELAY` and `GEMINI_REQUEST_DELAY`
    /// (delays in seconds). Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let mut builder = Self::builder()
            .max_retries(env_parse("GEMINI_MAX_RETRIES", defaults.max_retries))
            .retry_base_delay(seconds(
                "GEMINI_RETRY_DELAY",
                env_parse("GEMINI_RETRY_DELAY", defaults.retry_base_delay.as_secs_f64()),
            )?)
            .request_delay(seconds(
                "GEMINI_REQUEST_DELAY",
                env_parse("GEMINI_REQUEST_DELAY", 0.0),
            )?);

        if let Some(key) = env_string("GEMINI_API_KEY") {
            builder = builder.gemini_api_key(key);
        }
        if let Some(model) = env_string("GEMINI_MODEL") {
            builder = builder.gemini_model(model);
        }
        if let Some(model) = env_string("GEMINI_MODEL_FALLBACK") {
            builder = builder.gemini_model_fallback(model);
        }
        if let Some(key) = env_string("OPENAI_API_KEY") {
            builder = builder.openai_api_key(key);
        }
        if let Some(url) = env_string("OPENAI_BASE_URL") {
            builder = builder.openai_base_url(url);
        }
        if let Some(model) = env_string("OPENAI_MODEL") {
            builder = builder.openai_model(model);
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(AnalysisError::Config(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.gemini_model.trim().is_empty() || self.gemini_model_fallback.trim().is_empty() {
            return Err(AnalysisError::Config(
                "Gemini model names must not be empty".to_string(),
            ));
        }

        if self.openai_model.trim().is_empty() {
            return Err(AnalysisError::Config(
                "OpenAI model name must not be empty".to_string(),
            ));
        }

        if let Some(url) = &self.openai_base_url {
            if !url.starts_with("http") {
                return Err(AnalysisError::Config(format!(
                    "OPENAI_BASE_URL must be an http(s) URL, got {url:?}"
                )));
            }
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(AnalysisError::Config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }

        if self.generation.max_output_tokens == 0 {
            return Err(AnalysisError::Config(
                "max_output_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Provider A is usable
    pub fn has_gemini(&self) -> bool {
        is_valid_credential(self.gemini_api_key.as_deref())
    }

    /// Provider B is usable
    pub fn has_openai(&self) -> bool {
        is_valid_credential(self.openai_api_key.as_deref())
    }

    /// Name of the missing credential(s), `None` when any backend is usable
    pub fn missing_credential(&self) -> Option<String> {
        if self.has_gemini() || self.has_openai() {
            None
        } else {
            Some("GEMINI_API_KEY / OPENAI_API_KEY".to_string())
        }
    }
}

fn seconds(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| AnalysisError::Config(format!("{key} must be a non-negative number of seconds: {e}")))
}

/// Builder for AnalyzerConfig
#[derive(Debug, Default)]
pub struct AnalyzerConfigBuilder {
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
    gemini_model_fallback: Option<String>,
    openai_api_key: Option<String>,
    openai_base_url: Option<String>,
    openai_model: Option<String>,
    max_retries: Option<u32>,
    retry_base_delay: Option<Duration>,
    request_delay: Option<Duration>,
    generation: Option<GenerationOptions>,
}

impl AnalyzerConfigBuilder {
    /// Set the provider A key
    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.gemini_api_key = Some(key.into());
        self
    }

    /// Set the provider A primary model
    pub fn gemini_model(mut self, model: impl Into<String>) -> Self {
        self.gemini_model = Some(model.into());
        self
    }

    /// Set the provider A fallback model
    pub fn gemini_model_fallback(mut self, model: impl Into<String>) -> Self {
        self.gemini_model_fallback = Some(model.into());
        self
    }

    /// Set the provider B key
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    /// Set the provider B base URL
    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    /// Set the provider B model
    pub fn openai_model(mut self, model: impl Into<String>) -> Self {
        self.openai_model = Some(model.into());
        self
    }

    /// Set attempts per provider
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the backoff base
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Set the pre-request pause
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Set generation parameters
    pub fn generation(mut self, options: GenerationOptions) -> Self {
        self.generation = Some(options);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalyzerConfig> {
        let defaults = AnalyzerConfig::default();

        let config = AnalyzerConfig {
            gemini_api_key: self.gemini_api_key,
            gemini_model: self.gemini_model.unwrap_or(defaults.gemini_model),
            gemini_model_fallback: self
                .gemini_model_fallback
                .unwrap_or(defaults.gemini_model_fallback),
            openai_api_key: self.openai_api_key,
            openai_base_url: self.openai_base_url,
            openai_model: self.openai_model.unwrap_or(defaults.openai_model),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_base_delay: self.retry_base_delay.unwrap_or(defaults.retry_base_delay),
            request_delay: self.request_delay.unwrap_or(defaults.request_delay),
            generation: self.generation.unwrap_or(defaults.generation),
        };

        config.validate()?;
        Ok(config)
    }
}
