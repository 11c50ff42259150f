//! Text-generation provider layer for stock-dashboard
//!
//! This crate provides the provider-agnostic pieces the analysis core needs to
//! talk to a remote text-generation service:
//!
//! - Message types for a single analysis exchange
//! - Completion request/response types
//! - Provider trait for backend implementations
//! - Concrete backends (behind feature flags): a Gemini-style
//!   prompt + system-instruction API and an OpenAI-compatible chat API

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(any(feature = "gemini", feature = "openai"))]
pub mod providers;
