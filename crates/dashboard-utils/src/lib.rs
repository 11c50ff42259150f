//! Shared utilities for stock-dashboard
//!
//! This crate provides common functionality used across the workspace:
//! tracing setup and small helpers for reading typed settings from the
//! environment.

pub mod config;
pub mod logging;

pub use config::{env_parse, env_string};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
