//! Caller-facing analysis API
//!
//! [`AnalysisService::submit_analysis`] validates a stock code, fetches its
//! context through a [`ContextSource`], runs the analyzer and shapes the
//! outcome into a [`SubmitResponse`]. Failures of the backend ladder become
//! a neutral failure payload instead of an error.

use crate::analyzer::StockAnalyzer;
use crate::context::{AnalysisContext, well_known_name};
use crate::error::{AnalysisError, Result};
use crate::result::AnalysisResult;
use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn};

static STOCK_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{6}|hk\d{5})$").expect("Should compile: stock code pattern")
});

/// Normalise and validate a stock code
///
/// Accepts six-digit A-share codes and `hk` plus five digits, after
/// trimming and lowercasing.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_lowercase();
    STOCK_CODE.is_match(&code).then_some(code)
}

/// Amount of detail in the returned payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// Omits the Markdown report and the raw model output
    #[default]
    Simple,
    Full,
}

impl ReportType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "simple" => Ok(Self::Simple),
            "full" | "detailed" => Ok(Self::Full),
            other => Err(AnalysisError::Config(format!(
                "Unknown report type: {other} (expected simple or full)"
            ))),
        }
    }
}

/// Supplies the precomputed context and optional news for a stock
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn fetch(&self, code: &str) -> Result<(AnalysisContext, Option<String>)>;
}

/// Reads `<dir>/<code>.json` and, when present, `<dir>/<code>.news.txt`
#[derive(Debug, Clone)]
pub struct JsonFileContextSource {
    dir: PathBuf,
}

impl JsonFileContextSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ContextSource for JsonFileContextSource {
    async fn fetch(&self, code: &str) -> Result<(AnalysisContext, Option<String>)> {
        let path = self.dir.join(format!("{code}.json"));
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AnalysisError::Context {
                code: code.to_string(),
                reason: format!("{}: {e}", path.display()),
            })?;

        let mut context: AnalysisContext = serde_json::from_str(&text)?;
        if context.code.trim().is_empty() {
            context.code = code.to_string();
        }

        let news_path = self.dir.join(format!("{code}.news.txt"));
        let news = match tokio::fs::read_to_string(&news_path).await {
            Ok(news) => Some(news.trim().to_string()).filter(|n| !n.is_empty()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok((context, news))
    }
}

/// Outcome of one submitted analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub report_type: ReportType,
    /// Flat result payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    fn rejected(code: &str, report_type: ReportType, error: String) -> Self {
        Self {
            success: false,
            message: "请求参数无效".to_string(),
            code: code.to_string(),
            task_id: None,
            report_type,
            result: None,
            error: Some(error),
        }
    }
}

/// Validates requests and runs them through the analyzer
pub struct AnalysisService {
    analyzer: StockAnalyzer,
    source: Arc<dyn ContextSource>,
}

impl AnalysisService {
    pub fn new(analyzer: StockAnalyzer, source: Arc<dyn ContextSource>) -> Self {
        Self { analyzer, source }
    }

    pub fn analyzer(&self) -> &StockAnalyzer {
        &self.analyzer
    }

    /// Analyse one stock and shape the payload for the caller
    ///
    /// An invalid code is rejected before any context fetch or backend
    /// call. A failed context fetch or an exhausted backend ladder yields a
    /// neutral failure payload with `success = false`.
    pub async fn submit_analysis(&mut self, code: &str, report_type: ReportType) -> SubmitResponse {
        let raw = code.trim();
        if raw.is_empty() {
            return SubmitResponse::rejected(raw, report_type, "缺少必填参数: code (股票代码)".to_string());
        }
        let Some(code) = normalize_code(raw) else {
            let shown = raw.to_lowercase();
            warn!("Rejected invalid stock code: {shown}");
            return SubmitResponse::rejected(
                &shown,
                report_type,
                format!("无效的股票代码格式: {shown} (A股6位数字 或 港股hk+5位数字)"),
            );
        };

        let task_id = format!("{code}_{}", Local::now().format("%Y%m%d_%H%M%S"));
        info!("Analysis task {task_id} submitted ({report_type})");

        let outcome = match self.source.fetch(&code).await {
            Ok((context, news)) => self
                .analyzer
                .analyze(&context, news.as_deref())
                .await
                .map_err(|e| (context.display_name(), e)),
            Err(e) => Err((fallback_name(&code), e)),
        };

        let (result, error) = match outcome {
            Ok(result) => {
                let error = result.error_message.clone();
                (result, error)
            }
            Err((name, e)) => {
                error!("Analysis task {task_id} failed: {e}");
                let message = e.to_string();
                (AnalysisResult::failure(&code, name, &message), Some(message))
            }
        };

        let success = result.success;
        SubmitResponse {
            success,
            message: if success { "分析完成" } else { "分析失败" }.to_string(),
            code,
            task_id: Some(task_id),
            report_type,
            result: Some(payload(&result, report_type)),
            error,
        }
    }
}

fn fallback_name(code: &str) -> String {
    well_known_name(code).map_or_else(|| format!("股票{code}"), str::to_string)
}

/// Flat payload, trimmed for simple reports
fn payload(result: &AnalysisResult, report_type: ReportType) -> Map<String, Value> {
    let mut map = result.to_flat_map();
    if report_type == ReportType::Simple {
        map.remove("detailed_analysis");
        map.remove("raw_response");
    }
    map
}
