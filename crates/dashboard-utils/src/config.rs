//! Environment configuration helpers
//!
//! Settings are plain environment variables (optionally populated from a
//! `.env` file by the launcher). Blank values count as unset.

use std::str::FromStr;

/// Read a non-blank string variable
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, falling back to `default` when unset or unparsable
pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env_string(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable value for {key}: {raw:?}");
            default
        }),
        None => default,
    }
}
