//! Provider ladder with retry, model failover and provider failover
//!
//! One call walks an explicit state machine:
//!
//! ```text
//! CallingPrimary ──(failed attempt index ≥ max/2)──> CallingFallbackModel
//!       │                                                  │
//!       └──────────────(budget used up)────────────────────┤
//!                                                          v
//!                                          CallingSecondaryProvider
//!                                                          │
//!                         Success <──(text)────────────────┴──(budget used up)──> ExhaustedFailure
//! ```
//!
//! Every attempt after the first on a provider waits
//! [`RetryPolicy::backoff_duration`]. Rate-limited and other failures are
//! retried identically; only the log line differs.

use crate::config::{AnalyzerConfig, GenerationOptions};
use crate::error::{AnalysisError, Result};
use crate::prompt::SYSTEM_PROMPT;
use crate::retry::RetryPolicy;
use dashboard_llm::providers::{GeminiConfig, GeminiProvider, OpenAIConfig, OpenAIProvider};
use dashboard_llm::{CompletionRequest, LLMError, LLMProvider, Message};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A provider paired with the model to request from it
#[derive(Clone)]
pub struct Backend {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl Backend {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `provider/model`, used in logs and errors
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider.name(), self.model)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Position of the router in its failover ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    CallingPrimary,
    CallingFallbackModel,
    CallingSecondaryProvider,
    Success,
    ExhaustedFailure,
}

/// Builds the secondary backend on first need
pub type SecondaryFactory = Box<dyn FnMut() -> Option<Backend> + Send>;

enum SecondarySlot {
    Ready(Backend),
    /// Tried whenever provider A is exhausted, until it yields a backend
    Lazy(SecondaryFactory),
    Absent,
}

/// Provider A with its primary and fallback models
struct PrimaryLadder {
    provider: Arc<dyn LLMProvider>,
    model: String,
    fallback_model: String,
    using_fallback: bool,
}

impl PrimaryLadder {
    fn current_model(&self) -> &str {
        if self.using_fallback {
            &self.fallback_model
        } else {
            &self.model
        }
    }

    fn label(&self) -> String {
        format!("{}/{}", self.provider.name(), self.current_model())
    }
}

/// Routes a prompt through the backend ladder
///
/// Holds mutable selection state (the sticky fallback-model switch and the
/// lazily created secondary), so one router serves one request at a time.
pub struct ProviderRouter {
    primary: Option<PrimaryLadder>,
    secondary: SecondarySlot,
    policy: RetryPolicy,
    system_prompt: Option<String>,
    state: CallState,
    last_attempts: u32,
}

impl ProviderRouter {
    pub fn builder() -> ProviderRouterBuilder {
        ProviderRouterBuilder::default()
    }

    /// Build the ladder from configured credentials
    ///
    /// Provider A is installed only with a valid Gemini key. Provider B is
    /// installed with a valid OpenAI key; otherwise a lazy slot re-reads the
    /// environment each time provider A has failed, until a key shows up.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .policy(RetryPolicy::from_config(config))
            .system_prompt(SYSTEM_PROMPT);

        if let Some(key) = config.gemini_api_key.as_deref().filter(|_| config.has_gemini()) {
            let provider = GeminiProvider::with_config(GeminiConfig::new(key.trim()))
                .map_err(|e| AnalysisError::Config(format!("Failed to create Gemini client: {e}")))?;
            info!(
                "[Gemini] Using model {} (fallback {})",
                config.gemini_model, config.gemini_model_fallback
            );
            builder = builder.primary(
                Arc::new(provider),
                &config.gemini_model,
                &config.gemini_model_fallback,
            );
        }

        if config.has_openai() {
            let backend = openai_backend(config)?;
            info!("[OpenAI] Secondary backend ready: {}", backend.label());
            builder = builder.secondary(backend);
        } else {
            builder = builder.lazy_secondary(lazy_openai_backend);
        }

        Ok(builder.build())
    }

    /// Send the prompt, walking the ladder until a backend yields text
    ///
    /// # Errors
    ///
    /// [`AnalysisError::Exhausted`] wrapping the last underlying error once
    /// every configured backend has used its attempt budget.
    pub async fn call(&mut self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.last_attempts = 0;
        let mut last_error = None;

        if self.primary.is_some() {
            match self.run_primary(prompt, options).await {
                Ok(text) => return Ok(self.succeed(text)),
                Err(e) => {
                    warn!("[Gemini] All attempts failed, last error: {e}");
                    last_error = Some(e);
                }
            }
        }

        if let Some(backend) = self.resolve_secondary() {
            self.state = CallState::CallingSecondaryProvider;
            info!("[OpenAI] Switching to {}", backend.label());
            match self.run_secondary(&backend, prompt, options).await {
                Ok(text) => return Ok(self.succeed(text)),
                Err(e) => {
                    warn!("[OpenAI] All attempts failed, last error: {e}");
                    last_error = Some(e);
                }
            }
        }

        self.state = CallState::ExhaustedFailure;
        let source = last_error.unwrap_or_else(|| {
            AnalysisError::CredentialMissing("GEMINI_API_KEY / OPENAI_API_KEY".to_string())
        });
        tracing::error!(
            "[LLM] Exhausted after {} attempts: {source}",
            self.last_attempts
        );
        Err(AnalysisError::Exhausted {
            attempts: self.last_attempts,
            source: Box::new(source),
        })
    }

    async fn run_primary(&mut self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let policy = self.policy.clone();
        let threshold = policy.fallback_threshold();
        let mut last_error = None;

        for attempt in 0..policy.max_attempts {
            let Some(primary) = self.primary.as_mut() else {
                break;
            };
            self.state = if primary.using_fallback {
                CallState::CallingFallbackModel
            } else {
                CallState::CallingPrimary
            };

            if attempt > 0 {
                let delay = policy.backoff_duration(attempt);
                info!(
                    "[Gemini] Retry {}/{} after {:.1}s",
                    attempt + 1,
                    policy.max_attempts,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            self.last_attempts += 1;
            let label = primary.label();
            let result = request(
                primary.provider.as_ref(),
                primary.current_model(),
                &label,
                self.system_prompt.as_deref(),
                prompt,
                options,
            )
            .await;

            match result {
                Ok(text) => return Ok(text),
                Err(e) => {
                    log_failure("Gemini", attempt, &policy, &e);
                    if !primary.using_fallback && attempt >= threshold {
                        warn!(
                            "[Gemini] Switching from {} to fallback model {}",
                            primary.model, primary.fallback_model
                        );
                        primary.using_fallback = true;
                        self.state = CallState::CallingFallbackModel;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AnalysisError::Config("max_retries is 0".to_string())))
    }

    async fn run_secondary(
        &mut self,
        backend: &Backend,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let policy = self.policy.clone();
        let label = backend.label();
        let mut last_error = None;

        for attempt in 0..policy.max_attempts {
            if attempt > 0 {
                let delay = policy.backoff_duration(attempt);
                info!(
                    "[OpenAI] Retry {}/{} after {:.1}s",
                    attempt + 1,
                    policy.max_attempts,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            self.last_attempts += 1;
            match request(
                backend.provider.as_ref(),
                &backend.model,
                &label,
                self.system_prompt.as_deref(),
                prompt,
                options,
            )
            .await
            {
                Ok(text) => return Ok(text),
                Err(e) => {
                    log_failure("OpenAI", attempt, &policy, &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AnalysisError::Config("max_retries is 0".to_string())))
    }

    /// Ready secondary, creating it on first need
    fn resolve_secondary(&mut self) -> Option<Backend> {
        match std::mem::replace(&mut self.secondary, SecondarySlot::Absent) {
            SecondarySlot::Ready(backend) => {
                self.secondary = SecondarySlot::Ready(backend.clone());
                Some(backend)
            }
            SecondarySlot::Lazy(mut factory) => {
                info!("[OpenAI] Secondary backend not configured, trying lazy initialisation");
                match factory() {
                    Some(ready) => {
                        self.secondary = SecondarySlot::Ready(ready.clone());
                        Some(ready)
                    }
                    None => {
                        warn!("[OpenAI] Lazy initialisation found no usable credential");
                        self.secondary = SecondarySlot::Lazy(factory);
                        None
                    }
                }
            }
            SecondarySlot::Absent => None,
        }
    }

    fn succeed(&mut self, text: String) -> String {
        self.state = CallState::Success;
        debug!("[LLM] Success after {} attempts", self.last_attempts);
        text
    }

    /// State reached by the most recent call
    pub fn state(&self) -> CallState {
        self.state
    }

    /// Attempts made by the most recent call, across all backends
    pub fn last_attempts(&self) -> u32 {
        self.last_attempts
    }

    /// At least one backend is installed or can be created lazily
    pub fn is_available(&self) -> bool {
        self.primary.is_some() || !matches!(self.secondary, SecondarySlot::Absent)
    }

    /// The sticky switch to provider A's fallback model has happened
    pub fn using_fallback_model(&self) -> bool {
        self.primary.as_ref().is_some_and(|p| p.using_fallback)
    }

    /// Model provider A will be asked next
    pub fn primary_model(&self) -> Option<&str> {
        self.primary.as_ref().map(PrimaryLadder::current_model)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secondary = match &self.secondary {
            SecondarySlot::Ready(backend) => backend.label(),
            SecondarySlot::Lazy(_) => "lazy".to_string(),
            SecondarySlot::Absent => "none".to_string(),
        };
        f.debug_struct("ProviderRouter")
            .field("primary", &self.primary.as_ref().map(PrimaryLadder::label))
            .field("secondary", &secondary)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// One completion request; blank text counts as a failure
async fn request(
    provider: &dyn LLMProvider,
    model: &str,
    label: &str,
    system: Option<&str>,
    prompt: &str,
    options: &GenerationOptions,
) -> Result<String> {
    let mut builder = CompletionRequest::builder(model)
        .add_message(Message::user(prompt))
        .max_tokens(options.max_output_tokens)
        .temperature(options.temperature);
    if let Some(system) = system {
        builder = builder.system(system);
    }

    let response = provider
        .complete(builder.build())
        .await
        .map_err(|e| AnalysisError::from_llm(label, e))?;

    let text = response.text();
    if text.trim().is_empty() {
        return Err(AnalysisError::from_llm(
            label,
            LLMError::EmptyResponse(label.to_string()),
        ));
    }
    Ok(text.to_string())
}

fn log_failure(tag: &str, attempt: u32, policy: &RetryPolicy, error: &AnalysisError) {
    if error.is_rate_limited() {
        warn!(
            "[{tag}] Rate limited on attempt {}/{}: {error}",
            attempt + 1,
            policy.max_attempts
        );
    } else {
        warn!(
            "[{tag}] Attempt {}/{} failed: {error}",
            attempt + 1,
            policy.max_attempts
        );
    }
}

fn openai_backend(config: &AnalyzerConfig) -> Result<Backend> {
    let key = config
        .openai_api_key
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| AnalysisError::CredentialMissing("OPENAI_API_KEY".to_string()))?;

    let mut openai = OpenAIConfig::new(key);
    if let Some(base) = config.openai_base_url.as_deref() {
        openai = openai.with_api_base(base.trim_end_matches('/'));
    }

    let provider = OpenAIProvider::with_config(openai)
        .map_err(|e| AnalysisError::Config(format!("Failed to create OpenAI client: {e}")))?;
    Ok(Backend::new(Arc::new(provider), &config.openai_model))
}

/// Re-read the environment for a secondary credential
fn lazy_openai_backend() -> Option<Backend> {
    let config = match AnalyzerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!("[OpenAI] Could not reload configuration: {e}");
            return None;
        }
    };
    if !config.has_openai() {
        return None;
    }
    openai_backend(&config)
        .inspect_err(|e| warn!("[OpenAI] Lazy initialisation failed: {e}"))
        .ok()
}

/// Builder for [`ProviderRouter`]
#[derive(Default)]
pub struct ProviderRouterBuilder {
    primary: Option<PrimaryLadder>,
    secondary: Option<SecondarySlot>,
    policy: Option<RetryPolicy>,
    system_prompt: Option<String>,
}

impl ProviderRouterBuilder {
    /// Provider A with its primary and fallback models
    pub fn primary(
        mut self,
        provider: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        self.primary = Some(PrimaryLadder {
            provider,
            model: model.into(),
            fallback_model: fallback_model.into(),
            using_fallback: false,
        });
        self
    }

    /// Provider B, ready at construction
    pub fn secondary(mut self, backend: Backend) -> Self {
        self.secondary = Some(SecondarySlot::Ready(backend));
        self
    }

    /// Provider B, created on first need
    pub fn lazy_secondary<F>(mut self, factory: F) -> Self
    where
        F: FnMut() -> Option<Backend> + Send + 'static,
    {
        self.secondary = Some(SecondarySlot::Lazy(Box::new(factory)));
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Persona instruction sent with every request
    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn build(self) -> ProviderRouter {
        ProviderRouter {
            primary: self.primary,
            secondary: self.secondary.unwrap_or(SecondarySlot::Absent),
            policy: self.policy.unwrap_or_default(),
            system_prompt: self.system_prompt,
            state: CallState::CallingPrimary,
            last_attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashboard_llm::{CompletionResponse, StopReason};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Replays a script of replies, then repeats the last one
    struct Scripted {
        name: &'static str,
        replies: Mutex<Vec<Option<&'static str>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(name: &'static str, replies: Vec<Option<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn models(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.model.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> dashboard_llm::Result<CompletionResponse> {
            self.requests.lock().unwrap().push(request);
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.remove(0)
            } else {
                replies.first().copied().flatten()
            };
            match reply {
                Some(text) => Ok(CompletionResponse {
                    message: Message::assistant(text),
                    stop_reason: StopReason::EndTurn,
                    usage: None,
                }),
                None => Err(LLMError::RequestFailed("HTTP 503: unavailable".to_string())),
            }
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_success_first_try() {
        let gemini = Scripted::new("gemini", vec![Some("{\"ok\": true}")]);
        let mut router = ProviderRouter::builder()
            .primary(gemini.clone(), "main", "backup")
            .policy(fast_policy(3))
            .system_prompt("persona")
            .build();

        let text = router.call("prompt", &GenerationOptions::default()).await.unwrap();

        assert_eq!(text, "{\"ok\": true}");
        assert_eq!(router.state(), CallState::Success);
        assert_eq!(router.last_attempts(), 1);

        let request = gemini.requests.lock().unwrap()[0].clone();
        assert_eq!(request.system.as_deref(), Some("persona"));
        assert_eq!(request.prompt(), Some("prompt"));
        assert_eq!(request.max_tokens, 8192);
        assert_eq!(request.temperature, Some(0.7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_model_is_sticky() {
        let gemini = Scripted::new("gemini", vec![None, None, None, Some("done"), Some("again")]);
        let mut router = ProviderRouter::builder()
            .primary(gemini.clone(), "main", "backup")
            .policy(fast_policy(5))
            .build();

        router.call("p", &GenerationOptions::default()).await.unwrap();
        assert!(router.using_fallback_model());
        assert_eq!(router.primary_model(), Some("backup"));

        router.call("p", &GenerationOptions::default()).await.unwrap();
        assert_eq!(gemini.models(), ["main", "main", "main", "backup", "backup"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_is_retried() {
        let gemini = Scripted::new("gemini", vec![Some("   "), Some("text")]);
        let mut router = ProviderRouter::builder()
            .primary(gemini, "main", "backup")
            .policy(fast_policy(3))
            .build();

        assert_eq!(router.call("p", &GenerationOptions::default()).await.unwrap(), "text");
        assert_eq!(router.last_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_secondary_created_once() {
        let gemini = Scripted::new("gemini", vec![None]);
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let mut router = ProviderRouter::builder()
            .primary(gemini, "main", "backup")
            .lazy_secondary(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(Backend::new(Scripted::new("openai", vec![Some("from b")]), "gpt"))
            })
            .policy(fast_policy(2))
            .build();

        assert_eq!(router.call("p", &GenerationOptions::default()).await.unwrap(), "from b");
        assert_eq!(router.state(), CallState::Success);
        router.call("p", &GenerationOptions::default()).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_secondary_without_credential_exhausts() {
        let gemini = Scripted::new("gemini", vec![None]);
        let mut router = ProviderRouter::builder()
            .primary(gemini, "main", "backup")
            .lazy_secondary(|| None)
            .policy(fast_policy(2))
            .build();

        let err = router.call("p", &GenerationOptions::default()).await.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(router.state(), CallState::ExhaustedFailure);
        assert_eq!(router.last_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_secondary_rechecked_after_missing_credential() {
        let gemini = Scripted::new("gemini", vec![None]);
        let tries = Arc::new(AtomicUsize::new(0));
        let counter = tries.clone();
        let mut router = ProviderRouter::builder()
            .primary(gemini, "main", "backup")
            .lazy_secondary(move || {
                // The credential appears before the second exhausted call
                (counter.fetch_add(1, Ordering::SeqCst) > 0)
                    .then(|| Backend::new(Scripted::new("openai", vec![Some("late b")]), "gpt"))
            })
            .policy(fast_policy(2))
            .build();

        assert!(router.call("p", &GenerationOptions::default()).await.is_err());
        assert!(router.is_available());

        assert_eq!(router.call("p", &GenerationOptions::default()).await.unwrap(), "late b");
        assert_eq!(tries.load(Ordering::SeqCst), 2);

        router.call("p", &GenerationOptions::default()).await.unwrap();
        assert_eq!(tries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_only() {
        let openai = Scripted::new("openai", vec![Some("direct")]);
        let mut router = ProviderRouter::builder()
            .secondary(Backend::new(openai, "gpt"))
            .build();

        assert_eq!(router.call("p", &GenerationOptions::default()).await.unwrap(), "direct");
        assert_eq!(router.primary_model(), None);
    }

    #[test]
    fn test_backend_label() {
        let backend = Backend::new(Scripted::new("openai", vec![None]), "gpt-4o-mini");
        assert_eq!(backend.label(), "openai/gpt-4o-mini");
        assert_eq!(backend.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_from_config_without_credentials() {
        let router = ProviderRouter::from_config(&AnalyzerConfig::default()).unwrap();
        assert_eq!(router.primary_model(), None);
        // The lazy secondary slot keeps the router available
        assert!(router.is_available());
    }

    #[test]
    fn test_from_config_with_both_providers() {
        let config = AnalyzerConfig::builder()
            .gemini_api_key("AIza-test-key-0123456789")
            .openai_api_key("sk-test-key-0123456789")
            .openai_base_url("https://llm.example.com/v1/")
            .build()
            .unwrap();
        let router = ProviderRouter::from_config(&config).unwrap();

        assert_eq!(router.primary_model(), Some("gemini-2.5-flash"));
        assert!(format!("{router:?}").contains("openai/gpt-4o-mini"));
    }
}
