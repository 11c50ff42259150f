//! Field extraction from text that is not valid JSON

use crate::result::SentimentScore;
use regex::Regex;
use std::sync::LazyLock;

static SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""sentiment_score"\s*:\s*"?(-?\d+(?:\.\d+)?)"#)
        .expect("Should compile: sentiment score pattern")
});

static TREND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""trend_prediction"\s*:\s*"([^"]+)""#).expect("Should compile: trend pattern")
});

static ADVICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""operation_advice"\s*:\s*"([^"]+)""#).expect("Should compile: advice pattern")
});

static ONE_SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""one_sentence"\s*:\s*"([^"]+)""#).expect("Should compile: one_sentence pattern")
});

static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""analysis_summary"\s*:\s*"([^"]+)""#)
        .expect("Should compile: analysis_summary pattern")
});

/// Key fields recovered by pattern matching
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub score: Option<SentimentScore>,
    pub trend: Option<String>,
    pub advice: Option<String>,
    /// `one_sentence`, else `analysis_summary`
    pub summary: Option<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Pull the key fields out of arbitrary text
pub fn extract_fields(text: &str) -> ExtractedFields {
    ExtractedFields {
        score: capture(&SCORE, text)
            .and_then(|s| s.parse::<f64>().ok())
            .map(SentimentScore::from_f64),
        trend: capture(&TREND, text),
        advice: capture(&ADVICE, text),
        summary: capture(&ONE_SENTENCE, text).or_else(|| capture(&SUMMARY, text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_broken_document() {
        let text = r#"{"sentiment_score": 78, "trend_prediction": "看多", "operation_advice": "买入",
            "dashboard": {"core_conclusion": {"one_sentence": "放量突破平台"  "signal_type": }"#;
        let fields = extract_fields(text);

        assert_eq!(fields.score, Some(SentimentScore::new(78)));
        assert_eq!(fields.trend.as_deref(), Some("看多"));
        assert_eq!(fields.advice.as_deref(), Some("买入"));
        assert_eq!(fields.summary.as_deref(), Some("放量突破平台"));
    }

    #[test]
    fn test_score_variants_clamped() {
        assert_eq!(
            extract_fields(r#""sentiment_score": 250"#).score,
            Some(SentimentScore::new(100))
        );
        assert_eq!(
            extract_fields(r#""sentiment_score":"66.6""#).score,
            Some(SentimentScore::new(67))
        );
        assert_eq!(
            extract_fields(r#""sentiment_score": -3"#).score,
            Some(SentimentScore::new(0))
        );
    }

    #[test]
    fn test_summary_fallback_key() {
        let fields = extract_fields(r#""analysis_summary": "震荡整理""#);
        assert_eq!(fields.summary.as_deref(), Some("震荡整理"));
    }

    #[test]
    fn test_nothing_found() {
        assert!(extract_fields("the model rambled without any structure").is_empty());
    }
}
