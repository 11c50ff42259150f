//! Scripted providers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dashboard_core::{AnalyzerConfig, Backend, ProviderRouter, RetryPolicy};
use dashboard_llm::{CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, StopReason};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// What the provider does on one call
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    RateLimited,
    Failure,
    Empty,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// A recorded request
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub prompt: String,
    pub at: Instant,
}

/// Plays back queued replies, then repeats a default reply forever
pub struct ScriptedProvider {
    name: &'static str,
    queue: Mutex<VecDeque<Reply>>,
    repeat: Reply,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, queue: Vec<Reply>, repeat: Reply) -> Arc<Self> {
        Arc::new(Self {
            name,
            queue: Mutex::new(queue.into()),
            repeat,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with the same reply
    pub fn always(name: &'static str, reply: Reply) -> Arc<Self> {
        Self::new(name, Vec::new(), reply)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn models(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> dashboard_llm::Result<CompletionResponse> {
        self.calls.lock().unwrap().push(Call {
            model: request.model.clone(),
            prompt: request.prompt().unwrap_or_default().to_string(),
            at: Instant::now(),
        });

        let reply = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.repeat.clone());

        let text = match reply {
            Reply::Text(text) => text,
            Reply::Empty => String::new(),
            Reply::RateLimited => {
                return Err(LLMError::RateLimitExceeded("429 Too Many Requests".to_string()));
            }
            Reply::Failure => {
                return Err(LLMError::RequestFailed("HTTP 503: unavailable".to_string()));
            }
        };

        Ok(CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: None,
        })
    }

    fn name(&self) -> &str {
        self.name
    }
}

pub fn policy(max_attempts: u32, base: Duration) -> RetryPolicy {
    RetryPolicy::new(max_attempts, base)
}

/// Router with provider A (models `primary` / `fallback`) and optional B
pub fn router(
    gemini: Option<Arc<ScriptedProvider>>,
    openai: Option<Arc<ScriptedProvider>>,
    policy: RetryPolicy,
) -> ProviderRouter {
    let mut builder = ProviderRouter::builder().policy(policy);
    if let Some(gemini) = gemini {
        builder = builder.primary(gemini, "primary", "fallback");
    }
    if let Some(openai) = openai {
        builder = builder.secondary(Backend::new(openai, "secondary"));
    }
    builder.build()
}

/// Configuration with a usable provider A credential
pub fn configured(max_retries: u32) -> AnalyzerConfig {
    AnalyzerConfig::builder()
        .gemini_api_key("test-gemini-key-0123456789")
        .max_retries(max_retries)
        .retry_base_delay(Duration::from_millis(100))
        .build()
        .unwrap()
}

/// A well-formed model answer
pub fn bullish_document() -> String {
    serde_json::json!({
        "sentiment_score": 78,
        "trend_prediction": "看多",
        "operation_advice": "买入",
        "confidence_level": "高",
        "dashboard": {
            "core_conclusion": {"one_sentence": "多头排列，回踩MA5可介入"},
            "battle_plan": {"short_term": {"buy": "1800", "sell": "1900", "stop_loss": "1750"}}
        },
        "analysis_summary": "趋势向上，量价配合",
        "detailed_analysis": "# 深度报告",
        "risk_warning": "估值偏高"
    })
    .to_string()
}
