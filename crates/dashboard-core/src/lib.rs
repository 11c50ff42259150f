//! Analysis core for stock-dashboard
//!
//! Turns precomputed market context plus an optional news excerpt into a
//! structured "decision dashboard" report by asking a remote text-generation
//! service:
//!
//! - [`prompt`]: deterministic prompt assembly
//! - [`router`]: retry, model failover and provider failover
//! - [`parser`]: tolerant three-tier response parsing
//! - [`result`]: the typed report and its accessors
//! - [`analyzer`], [`batch`], [`service`]: the entry points

pub mod analyzer;
pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod parser;
pub mod prompt;
pub mod result;
pub mod retry;
pub mod router;
pub mod service;

mod lenient;

pub use analyzer::StockAnalyzer;
pub use batch::{BatchCoordinator, BatchItem};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder, GenerationOptions, is_valid_credential};
pub use context::AnalysisContext;
pub use error::{AnalysisError, Result};
pub use parser::ResponseParser;
pub use prompt::{PromptBuilder, SYSTEM_PROMPT};
pub use result::{
    AnalysisResult, ConfidenceLevel, Dashboard, OperationAdvice, SentimentScore, TrendPrediction,
};
pub use retry::RetryPolicy;
pub use router::{Backend, CallState, ProviderRouter};
pub use service::{
    AnalysisService, ContextSource, JsonFileContextSource, ReportType, SubmitResponse,
    normalize_code,
};
