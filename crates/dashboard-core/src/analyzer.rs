//! Single-stock analysis pipeline: prompt, route, parse

use crate::config::{AnalyzerConfig, GenerationOptions};
use crate::context::AnalysisContext;
use crate::error::Result;
use crate::parser::ResponseParser;
use crate::prompt::PromptBuilder;
use crate::result::AnalysisResult;
use crate::router::ProviderRouter;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

const PROMPT_PREVIEW_CHARS: usize = 500;
const RESPONSE_PREVIEW_CHARS: usize = 300;

/// Runs one analysis per call through the provider ladder
#[derive(Debug)]
pub struct StockAnalyzer {
    router: ProviderRouter,
    prompt_builder: PromptBuilder,
    parser: ResponseParser,
    generation: GenerationOptions,
    request_delay: Duration,
    /// Set when no backend had a usable credential at construction
    missing_credential: Option<String>,
}

impl StockAnalyzer {
    /// Create an analyzer with the provider ladder described by `config`
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let router = ProviderRouter::from_config(config)?;
        Ok(Self::with_router(router, config))
    }

    /// Create an analyzer around an existing router
    ///
    /// Credential availability, pacing and generation options are still
    /// taken from `config`.
    pub fn with_router(router: ProviderRouter, config: &AnalyzerConfig) -> Self {
        let missing_credential = config.missing_credential();
        if let Some(missing) = &missing_credential {
            warn!("[LLM] {missing} not configured, AI analysis disabled");
        }

        Self {
            router,
            prompt_builder: PromptBuilder::new(),
            parser: ResponseParser::new(),
            generation: config.generation,
            request_delay: config.request_delay,
            missing_credential,
        }
    }

    /// Create an analyzer from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(&AnalyzerConfig::from_env()?)
    }

    /// Some backend has a usable credential
    pub fn is_available(&self) -> bool {
        self.missing_credential.is_none()
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Analyse one stock
    ///
    /// Without usable credentials this returns the fixed unavailable payload
    /// and makes no network call.
    ///
    /// # Errors
    ///
    /// [`crate::AnalysisError::Exhausted`] when every backend failed.
    /// Malformed model output is never an error.
    #[instrument(skip_all, fields(code = %context.code))]
    pub async fn analyze(
        &mut self,
        context: &AnalysisContext,
        news: Option<&str>,
    ) -> Result<AnalysisResult> {
        let code = context.code.as_str();
        let name = context.display_name();

        if let Some(missing) = &self.missing_credential {
            warn!("[LLM] Skipping {name}({code}): no usable credential");
            return Ok(AnalysisResult::unavailable(code, name, missing));
        }

        if !self.request_delay.is_zero() {
            debug!(
                "[LLM] Waiting {:.1}s before request",
                self.request_delay.as_secs_f64()
            );
            tokio::time::sleep(self.request_delay).await;
        }

        let news = news.map(str::trim).filter(|n| !n.is_empty());
        let prompt = self.prompt_builder.build(context, &name, news);

        info!(
            "[LLM] Analysing {name}({code}): prompt {} chars, news {}",
            prompt.chars().count(),
            if news.is_some() { "included" } else { "none" }
        );
        info!("[LLM] Prompt preview:\n{}", preview(&prompt, PROMPT_PREVIEW_CHARS));
        debug!("[LLM] Full prompt:\n{prompt}");

        let started = Instant::now();
        let raw = self.router.call(&prompt, &self.generation).await?;
        let elapsed = started.elapsed();

        info!(
            "[LLM] Response for {code} in {:.2}s, {} chars",
            elapsed.as_secs_f64(),
            raw.chars().count()
        );
        info!("[LLM] Response preview:\n{}", preview(&raw, RESPONSE_PREVIEW_CHARS));
        debug!("[LLM] Full response:\n{raw}");

        let mut result = self.parser.parse(&raw, code, &name);
        result.raw_response = Some(raw);
        result.search_performed = news.is_some();

        info!(
            "[LLM] {name}({code}) done: {} {}, score {}",
            result.trend_prediction, result.operation_advice, result.sentiment_score
        );
        Ok(result)
    }
}

/// First `max_chars` characters, with an ellipsis when cut
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ConfidenceLevel, OperationAdvice};

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("贵州茅台分析", 4), "贵州茅台...");
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[tokio::test]
    async fn test_unavailable_without_credentials() {
        let mut analyzer = StockAnalyzer::new(&AnalyzerConfig::default()).unwrap();
        assert!(!analyzer.is_available());

        let context = AnalysisContext::new("600519");
        let result = analyzer.analyze(&context, Some("news")).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.name, "贵州茅台");
        assert_eq!(result.sentiment_score.value(), 50);
        assert_eq!(result.operation_advice, OperationAdvice::Hold);
        assert_eq!(result.confidence_level, ConfidenceLevel::Low);
        assert!(result.raw_response.is_none());
    }
}
