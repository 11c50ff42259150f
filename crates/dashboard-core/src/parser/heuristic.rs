//! Last-resort interpretation of free text

use crate::result::{OperationAdvice, SentimentScore, TrendPrediction};
use regex::Regex;
use std::sync::LazyLock;

const POSITIVE_KEYWORDS: &[&str] = &[
    "看多", "买入", "上涨", "突破", "强势", "利好", "加仓", "bullish", "buy",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "看空", "卖出", "下跌", "跌破", "弱势", "利空", "减仓", "bearish", "sell",
];

const EXCERPT_SCAN_CHARS: usize = 500;
const EXCERPT_MIN_CHARS: usize = 10;
const RAW_EXCERPT_CHARS: usize = 200;

static JSON_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["{}\[\],]"#).expect("Should compile: JSON punctuation pattern")
});

static KEY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+:").expect("Should compile: key prefix pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Should compile: whitespace pattern"));

/// Direction implied by keyword counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordSignal {
    Bullish,
    Bearish,
    Neutral,
}

impl KeywordSignal {
    /// Count distinct positive and negative keywords; one side must lead
    /// by more than one to count as a signal
    pub fn detect(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let count = |keywords: &[&str]| keywords.iter().filter(|k| lowered.contains(*k)).count();
        let positive = count(POSITIVE_KEYWORDS);
        let negative = count(NEGATIVE_KEYWORDS);

        if positive > negative + 1 {
            Self::Bullish
        } else if negative > positive + 1 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    /// Score, trend and advice implied by the signal
    pub fn verdict(self) -> (SentimentScore, TrendPrediction, OperationAdvice) {
        match self {
            Self::Bullish => (
                SentimentScore::new(65),
                TrendPrediction::Bullish,
                OperationAdvice::Buy,
            ),
            Self::Bearish => (
                SentimentScore::new(35),
                TrendPrediction::Bearish,
                OperationAdvice::Sell,
            ),
            Self::Neutral => (
                SentimentScore::NEUTRAL,
                TrendPrediction::Neutral,
                OperationAdvice::Hold,
            ),
        }
    }
}

/// Readable excerpt of a response with JSON scaffolding removed
pub fn clean_excerpt(raw: &str) -> String {
    let head: String = raw.chars().take(EXCERPT_SCAN_CHARS).collect();
    let stripped = JSON_PUNCTUATION.replace_all(&head, " ");
    let stripped = KEY_PREFIX.replace_all(&stripped, " ");
    let cleaned = WHITESPACE.replace_all(&stripped, " ").trim().to_string();

    if cleaned.chars().count() < EXCERPT_MIN_CHARS {
        raw.chars().take(RAW_EXCERPT_CHARS).collect()
    } else {
        cleaned
    }
}

/// Markdown report used when no structured document was recovered
pub fn fallback_report(
    name: &str,
    code: &str,
    score: SentimentScore,
    trend: TrendPrediction,
    advice: OperationAdvice,
    summary: &str,
) -> String {
    format!(
        "# {name}({code}) 投资分析报告\n\n\
         ## 评分: {score}/100\n\n\
         ## 趋势: {trend}\n\n\
         ## 建议: {advice}\n\n\
         ## 分析摘要\n\n{summary}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_needs_margin() {
        assert_eq!(
            KeywordSignal::detect("趋势看多，放量突破，建议买入"),
            KeywordSignal::Bullish
        );
        assert_eq!(
            KeywordSignal::detect("Bearish setup, SELL on rallies, 跌破支撑"),
            KeywordSignal::Bearish
        );
        // One keyword ahead is not enough
        assert_eq!(KeywordSignal::detect("看多 但 看空 买入"), KeywordSignal::Neutral);
        assert_eq!(KeywordSignal::detect(""), KeywordSignal::Neutral);
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        assert_eq!(KeywordSignal::detect("买入 买入 买入"), KeywordSignal::Neutral);
    }

    #[test]
    fn test_verdicts() {
        assert_eq!(
            KeywordSignal::Bullish.verdict(),
            (SentimentScore::new(65), TrendPrediction::Bullish, OperationAdvice::Buy)
        );
        assert_eq!(KeywordSignal::Bearish.verdict().0.value(), 35);
        assert_eq!(KeywordSignal::Neutral.verdict().0, SentimentScore::NEUTRAL);
    }

    #[test]
    fn test_clean_excerpt() {
        let cleaned = clean_excerpt(r#"{"note": "市场情绪偏谨慎, 等待回踩确认", "extra": [1, 2]}"#);
        assert!(!cleaned.contains('{'));
        assert!(!cleaned.contains('"'));
        assert!(cleaned.contains("市场情绪偏谨慎"));

        // Too little left after cleaning: raw head instead
        assert_eq!(clean_excerpt("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_fallback_report_sections() {
        let report = fallback_report(
            "贵州茅台",
            "600519",
            SentimentScore::new(65),
            TrendPrediction::Bullish,
            OperationAdvice::Buy,
            "量价齐升",
        );
        assert!(report.starts_with("# 贵州茅台(600519) 投资分析报告"));
        assert!(report.contains("## 评分: 65/100"));
        assert!(report.contains("## 趋势: 看多"));
        assert!(report.contains("## 建议: 买入"));
        assert!(report.contains("量价齐升"));
    }
}
