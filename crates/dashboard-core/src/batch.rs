//! Sequential, paced analysis of many stocks

use crate::analyzer::StockAnalyzer;
use crate::context::AnalysisContext;
use crate::error::Result;
use crate::result::AnalysisResult;
use std::time::Duration;
use tracing::{error, info};

/// One stock to analyse with its optional news excerpt
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub context: AnalysisContext,
    pub news: Option<String>,
}

impl BatchItem {
    pub fn new(context: AnalysisContext) -> Self {
        Self {
            context,
            news: None,
        }
    }

    pub fn with_news(mut self, news: impl Into<String>) -> Self {
        self.news = Some(news.into());
        self
    }
}

impl From<AnalysisContext> for BatchItem {
    fn from(context: AnalysisContext) -> Self {
        Self::new(context)
    }
}

/// Runs the analyzer over a list of stocks, one at a time
#[derive(Debug)]
pub struct BatchCoordinator {
    analyzer: StockAnalyzer,
}

impl BatchCoordinator {
    pub fn new(analyzer: StockAnalyzer) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &StockAnalyzer {
        &self.analyzer
    }

    pub fn into_inner(self) -> StockAnalyzer {
        self.analyzer
    }

    /// Analyse every item in order
    ///
    /// Sleeps `delay_between` before every item except the first. Results
    /// keep the input order.
    ///
    /// # Errors
    ///
    /// Stops at the first failed item and returns its error; results of the
    /// items before it are discarded.
    pub async fn analyze_all(
        &mut self,
        items: &[BatchItem],
        delay_between: Duration,
    ) -> Result<Vec<AnalysisResult>> {
        let total = items.len();
        let mut results = Vec::with_capacity(total);

        for (index, item) in items.iter().enumerate() {
            if index > 0 && !delay_between.is_zero() {
                info!(
                    "[LLM] Waiting {:.1}s before next stock",
                    delay_between.as_secs_f64()
                );
                tokio::time::sleep(delay_between).await;
            }

            info!("[LLM] Batch {}/{total}: {}", index + 1, item.context.code);
            let result = self
                .analyzer
                .analyze(&item.context, item.news.as_deref())
                .await
                .inspect_err(|e| {
                    error!(
                        "[LLM] Batch aborted at {}/{total} ({}): {e}",
                        index + 1,
                        item.context.code
                    );
                })?;
            results.push(result);
        }

        info!("[LLM] Batch finished: {total} stocks");
        Ok(results)
    }
}
