//! The decision-dashboard report
//!
//! [`AnalysisResult`] is built once per analysis, either by the response
//! parser or by one of the fixed neutral constructors, and is treated as an
//! immutable value afterwards. Enum fields serialise to the Chinese labels
//! the prompt asks the model for.

use crate::lenient::{opt_object, opt_text, text_list, text_map};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Sentiment score, always an integer in `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct SentimentScore(u8);

impl SentimentScore {
    /// Neutral midpoint
    pub const NEUTRAL: Self = Self(50);

    /// Clamp any integer into range
    pub fn new(raw: i64) -> Self {
        Self(raw.clamp(0, 100) as u8)
    }

    /// Round and clamp a float; NaN maps to neutral
    pub fn from_f64(raw: f64) -> Self {
        if raw.is_nan() {
            Self::NEUTRAL
        } else {
            Self(raw.round().clamp(0.0, 100.0) as u8)
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for SentimentScore {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl From<i64> for SentimentScore {
    fn from(raw: i64) -> Self {
        Self::new(raw)
    }
}

impl From<SentimentScore> for u8 {
    fn from(score: SentimentScore) -> Self {
        score.0
    }
}

impl fmt::Display for SentimentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalise a label for lenient matching
fn label_key(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_lowercase()
        .replace(['-', '_', ' '], "")
}

/// First fragment contained in a free-form label
///
/// Negated wording is never guessed.
fn contained_label<T: Copy>(raw: &str, fragments: &[(&str, T)]) -> Option<T> {
    let key = label_key(raw);
    if key.contains(['不', '勿', '别']) || key.contains("not") {
        return None;
    }
    fragments
        .iter()
        .find(|(fragment, _)| key.contains(fragment))
        .map(|&(_, value)| value)
}

/// Predicted price trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrendPrediction {
    #[serde(rename = "强烈看多", alias = "strongly_bullish")]
    StronglyBullish,
    #[serde(rename = "看多", alias = "bullish")]
    Bullish,
    #[default]
    #[serde(rename = "震荡", alias = "neutral")]
    Neutral,
    #[serde(rename = "看空", alias = "bearish")]
    Bearish,
    #[serde(rename = "强烈看空", alias = "strongly_bearish")]
    StronglyBearish,
}

impl TrendPrediction {
    pub fn label(self) -> &'static str {
        match self {
            Self::StronglyBullish => "强烈看多",
            Self::Bullish => "看多",
            Self::Neutral => "震荡",
            Self::Bearish => "看空",
            Self::StronglyBearish => "强烈看空",
        }
    }

    /// Match a Chinese or English spelling
    pub fn parse_label(raw: &str) -> Option<Self> {
        match label_key(raw).as_str() {
            "强烈看多" | "强势看多" | "stronglybullish" | "strongbullish" | "verybullish" => {
                Some(Self::StronglyBullish)
            }
            "看多" | "看涨" | "偏多" | "bullish" | "up" | "uptrend" => Some(Self::Bullish),
            "震荡" | "中性" | "横盘" | "neutral" | "sideways" | "range" => Some(Self::Neutral),
            "看空" | "看跌" | "偏空" | "bearish" | "down" | "downtrend" => Some(Self::Bearish),
            "强烈看空" | "强势看空" | "stronglybearish" | "strongbearish" | "verybearish" => {
                Some(Self::StronglyBearish)
            }
            _ => None,
        }
    }

    /// Exact spelling first, then a known label inside free-form wording
    /// such as `谨慎看多`
    pub fn match_label(raw: &str) -> Option<Self> {
        Self::parse_label(raw).or_else(|| contained_label(raw, Self::FRAGMENTS))
    }

    const FRAGMENTS: &'static [(&'static str, Self)] = &[
        ("强烈看多", Self::StronglyBullish),
        ("强势看多", Self::StronglyBullish),
        ("stronglybullish", Self::StronglyBullish),
        ("强烈看空", Self::StronglyBearish),
        ("强势看空", Self::StronglyBearish),
        ("stronglybearish", Self::StronglyBearish),
        ("看空", Self::Bearish),
        ("看跌", Self::Bearish),
        ("偏空", Self::Bearish),
        ("bearish", Self::Bearish),
        ("看多", Self::Bullish),
        ("看涨", Self::Bullish),
        ("偏多", Self::Bullish),
        ("bullish", Self::Bullish),
        ("震荡", Self::Neutral),
        ("中性", Self::Neutral),
        ("横盘", Self::Neutral),
        ("neutral", Self::Neutral),
        ("sideways", Self::Neutral),
    ];
}

/// Recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OperationAdvice {
    #[serde(rename = "买入", alias = "buy")]
    Buy,
    #[serde(rename = "加仓", alias = "accumulate")]
    Accumulate,
    #[default]
    #[serde(rename = "持有", alias = "hold")]
    Hold,
    #[serde(rename = "减仓", alias = "reduce")]
    Reduce,
    #[serde(rename = "卖出", alias = "sell")]
    Sell,
    #[serde(rename = "观望", alias = "wait")]
    Wait,
}

impl OperationAdvice {
    pub fn label(self) -> &'static str {
        match self {
            Self::Buy => "买入",
            Self::Accumulate => "加仓",
            Self::Hold => "持有",
            Self::Reduce => "减仓",
            Self::Sell => "卖出",
            Self::Wait => "观望",
        }
    }

    /// Match a Chinese or English spelling
    pub fn parse_label(raw: &str) -> Option<Self> {
        match label_key(raw).as_str() {
            "买入" | "强烈买入" | "buy" | "strongbuy" => Some(Self::Buy),
            "加仓" | "增持" | "accumulate" | "add" => Some(Self::Accumulate),
            "持有" | "hold" | "keep" => Some(Self::Hold),
            "减仓" | "减持" | "reduce" | "trim" => Some(Self::Reduce),
            "卖出" | "强烈卖出" | "清仓" | "sell" | "strongsell" => Some(Self::Sell),
            "观望" | "wait" | "watch" | "waitandsee" => Some(Self::Wait),
            _ => None,
        }
    }

    /// Exact spelling first, then a known action inside free-form wording
    /// such as `逢低买入`
    pub fn match_label(raw: &str) -> Option<Self> {
        Self::parse_label(raw).or_else(|| contained_label(raw, Self::FRAGMENTS))
    }

    const FRAGMENTS: &'static [(&'static str, Self)] = &[
        ("清仓", Self::Sell),
        ("卖出", Self::Sell),
        ("sell", Self::Sell),
        ("减仓", Self::Reduce),
        ("减持", Self::Reduce),
        ("reduce", Self::Reduce),
        ("加仓", Self::Accumulate),
        ("增持", Self::Accumulate),
        ("accumulate", Self::Accumulate),
        ("买入", Self::Buy),
        ("建仓", Self::Buy),
        ("低吸", Self::Buy),
        ("buy", Self::Buy),
        ("持有", Self::Hold),
        ("hold", Self::Hold),
        ("观望", Self::Wait),
        ("wait", Self::Wait),
    ];

    /// Emoji used in dashboard headers
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Buy | Self::Accumulate => "🟢",
            Self::Hold => "🟡",
            Self::Wait => "⚪",
            Self::Reduce => "🟠",
            Self::Sell => "🔴",
        }
    }
}

/// Model's confidence in its own call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "高", alias = "high")]
    High,
    #[default]
    #[serde(rename = "中", alias = "medium")]
    Medium,
    #[serde(rename = "低", alias = "low")]
    Low,
}

impl ConfidenceLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "高",
            Self::Medium => "中",
            Self::Low => "低",
        }
    }

    /// Match a Chinese or English spelling
    pub fn parse_label(raw: &str) -> Option<Self> {
        match label_key(raw).as_str() {
            "高" | "high" => Some(Self::High),
            "中" | "中等" | "medium" | "mid" | "moderate" => Some(Self::Medium),
            "低" | "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn stars(self) -> &'static str {
        match self {
            Self::High => "⭐⭐⭐",
            Self::Medium => "⭐⭐",
            Self::Low => "⭐",
        }
    }
}

macro_rules! impl_label_display {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

impl_label_display!(TrendPrediction, OperationAdvice, ConfidenceLevel);

// ============================================================================
// Dashboard sections
// ============================================================================

/// Nested structured sub-report
///
/// Every section and every field is optional. A field of the wrong shape is
/// dropped on its own; the rest of its section is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    #[serde(default, deserialize_with = "opt_object", skip_serializing_if = "Option::is_none")]
    pub core_conclusion: Option<CoreConclusion>,
    #[serde(default, deserialize_with = "opt_object", skip_serializing_if = "Option::is_none")]
    pub data_perspective: Option<DataPerspective>,
    #[serde(default, deserialize_with = "opt_object", skip_serializing_if = "Option::is_none")]
    pub intelligence: Option<Intelligence>,
    #[serde(default, deserialize_with = "opt_object", skip_serializing_if = "Option::is_none")]
    pub battle_plan: Option<BattlePlan>,
    #[serde(default, deserialize_with = "opt_object", skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
}

impl Dashboard {
    /// Decode a dashboard object section by section
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            core_conclusion: section(object, "core_conclusion"),
            data_perspective: section(object, "data_perspective"),
            intelligence: section(object, "intelligence"),
            battle_plan: section(object, "battle_plan"),
            risk_assessment: section(object, "risk_assessment"),
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn section<T: serde::de::DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Option<T> {
    let value = object.get(key).filter(|v| v.is_object())?;
    match serde_json::from_value(value.clone()) {
        Ok(section) => Some(section),
        Err(e) => {
            tracing::warn!("Dropping malformed dashboard section {key}: {e}");
            None
        }
    }
}

/// One-line verdict and position guidance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreConclusion {
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub one_sentence: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub time_sensitivity: Option<String>,
    #[serde(default, deserialize_with = "opt_object", skip_serializing_if = "Option::is_none")]
    pub position_advice: Option<PositionAdvice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionAdvice {
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub no_position: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub has_position: Option<String>,
}

/// Data snapshot the model based its verdict on
///
/// Sub-blocks keep the model's scalar values as given (numbers or text).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPerspective {
    #[serde(default, deserialize_with = "text_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub trend_status: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "text_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub price_position: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "text_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub volume_analysis: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "text_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub chip_structure: BTreeMap<String, String>,
}

/// News and sentiment intelligence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intelligence {
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub latest_news: Option<String>,
    #[serde(default, deserialize_with = "text_list", skip_serializing_if = "Vec::is_empty")]
    pub risk_alerts: Vec<String>,
    #[serde(default, deserialize_with = "text_list", skip_serializing_if = "Vec::is_empty")]
    pub positive_catalysts: Vec<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub earnings_outlook: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub sentiment_summary: Option<String>,
}

/// Concrete trading plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattlePlan {
    #[serde(default, deserialize_with = "text_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub sniper_points: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "text_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub position_strategy: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "text_list", skip_serializing_if = "Vec::is_empty")]
    pub action_checklist: Vec<String>,
    #[serde(default, deserialize_with = "opt_object", skip_serializing_if = "Option::is_none")]
    pub short_term: Option<TermPlan>,
    #[serde(default, deserialize_with = "opt_object", skip_serializing_if = "Option::is_none")]
    pub long_term: Option<TermPlan>,
}

/// Price levels for one horizon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermPlan {
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub buy: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub sell: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub main_risk: Option<String>,
}

// ============================================================================
// AnalysisResult
// ============================================================================

/// Structured analysis report for one stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub code: String,
    pub name: String,

    // Core metrics
    pub sentiment_score: SentimentScore,
    pub trend_prediction: TrendPrediction,
    pub operation_advice: OperationAdvice,
    pub confidence_level: ConfidenceLevel,
    /// Model's trend wording when it differs from the matched label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_prediction_raw: Option<String>,
    /// Model's advice wording when it differs from the matched label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_advice_raw: Option<String>,

    pub dashboard: Option<Dashboard>,

    // Trend
    pub trend_analysis: String,
    pub short_term_outlook: String,
    pub medium_term_outlook: String,

    // Technicals
    pub technical_analysis: String,
    pub ma_analysis: String,
    pub volume_analysis: String,
    pub pattern_analysis: String,

    // Fundamentals
    pub fundamental_analysis: String,
    pub sector_position: String,
    pub company_highlights: String,

    // News and sentiment
    pub news_summary: String,
    pub market_sentiment: String,
    pub hot_topics: String,

    // Synthesis
    pub analysis_summary: String,
    /// Full Markdown report
    pub detailed_analysis: String,
    pub key_points: String,
    pub risk_warning: String,
    pub buy_reason: String,

    // Trade plan; flat fields are the legacy short-horizon levels
    pub buy_price: String,
    pub sell_price: String,
    pub stop_loss_price: String,
    pub short_term_buy: String,
    pub short_term_sell: String,
    pub long_term_buy: String,
    pub long_term_sell: String,

    // Plain-language one-liners
    pub plain_talk_short: String,
    pub plain_talk_long: String,

    // Metadata
    /// Unparsed model output, diagnostics only
    pub raw_response: Option<String>,
    /// A news excerpt was part of the prompt
    pub search_performed: bool,
    pub data_sources: String,
    /// False only when no backend produced a usable answer
    pub success: bool,
    pub error_message: Option<String>,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self::neutral("", "")
    }
}

impl AnalysisResult {
    /// Neutral result with every narrative field empty
    pub fn neutral(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            sentiment_score: SentimentScore::NEUTRAL,
            trend_prediction: TrendPrediction::Neutral,
            operation_advice: OperationAdvice::Hold,
            confidence_level: ConfidenceLevel::Medium,
            trend_prediction_raw: None,
            operation_advice_raw: None,
            dashboard: None,
            trend_analysis: String::new(),
            short_term_outlook: String::new(),
            medium_term_outlook: String::new(),
            technical_analysis: String::new(),
            ma_analysis: String::new(),
            volume_analysis: String::new(),
            pattern_analysis: String::new(),
            fundamental_analysis: String::new(),
            sector_position: String::new(),
            company_highlights: String::new(),
            news_summary: String::new(),
            market_sentiment: String::new(),
            hot_topics: String::new(),
            analysis_summary: String::new(),
            detailed_analysis: String::new(),
            key_points: String::new(),
            risk_warning: String::new(),
            buy_reason: String::new(),
            buy_price: String::new(),
            sell_price: String::new(),
            stop_loss_price: String::new(),
            short_term_buy: String::new(),
            short_term_sell: String::new(),
            long_term_buy: String::new(),
            long_term_sell: String::new(),
            plain_talk_short: String::new(),
            plain_talk_long: String::new(),
            raw_response: None,
            search_performed: false,
            data_sources: String::new(),
            success: true,
            error_message: None,
        }
    }

    /// Fixed payload returned when no backend has a usable credential
    pub fn unavailable(code: impl Into<String>, name: impl Into<String>, missing: &str) -> Self {
        Self {
            confidence_level: ConfidenceLevel::Low,
            analysis_summary: "AI 分析功能未启用（未配置 API Key）".to_string(),
            risk_warning: format!("请配置 {missing} 后重试"),
            success: false,
            error_message: Some(format!("{missing} 未配置")),
            ..Self::neutral(code, name)
        }
    }

    /// Fixed payload returned when every backend failed
    pub fn failure(code: impl Into<String>, name: impl Into<String>, error: &str) -> Self {
        let short: String = error.chars().take(100).collect();
        Self {
            confidence_level: ConfidenceLevel::Low,
            analysis_summary: format!("分析过程出错: {short}"),
            risk_warning: "分析失败，请稍后重试或手动分析".to_string(),
            success: false,
            error_message: Some(error.to_string()),
            ..Self::neutral(code, name)
        }
    }

    /// One-sentence verdict, falling back to the summary
    pub fn core_conclusion(&self) -> &str {
        self.core_section()
            .and_then(|c| c.one_sentence.as_deref())
            .unwrap_or(&self.analysis_summary)
    }

    /// Position-specific guidance, falling back to the advice label
    pub fn position_advice(&self, has_position: bool) -> &str {
        self.core_section()
            .and_then(|c| c.position_advice.as_ref())
            .and_then(|p| {
                if has_position {
                    p.has_position.as_deref()
                } else {
                    p.no_position.as_deref()
                }
            })
            .unwrap_or_else(|| self.operation_advice.label())
    }

    /// Named entry/exit levels from the battle plan
    pub fn sniper_points(&self) -> Option<&BTreeMap<String, String>> {
        self.battle_plan()
            .map(|b| &b.sniper_points)
            .filter(|p| !p.is_empty())
    }

    /// Pre-trade checklist lines
    pub fn checklist(&self) -> &[String] {
        self.battle_plan()
            .map(|b| b.action_checklist.as_slice())
            .unwrap_or_default()
    }

    /// Risk alerts from the intelligence section
    pub fn risk_alerts(&self) -> &[String] {
        self.dashboard
            .as_ref()
            .and_then(|d| d.intelligence.as_ref())
            .map(|i| i.risk_alerts.as_slice())
            .unwrap_or_default()
    }

    pub fn emoji(&self) -> &'static str {
        self.operation_advice.emoji()
    }

    pub fn confidence_stars(&self) -> &'static str {
        self.confidence_level.stars()
    }

    /// Flat key/value mapping in the wire schema
    pub fn to_flat_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    fn core_section(&self) -> Option<&CoreConclusion> {
        self.dashboard.as_ref()?.core_conclusion.as_ref()
    }

    fn battle_plan(&self) -> Option<&BattlePlan> {
        self.dashboard.as_ref()?.battle_plan.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_clamped() {
        assert_eq!(SentimentScore::new(-5).value(), 0);
        assert_eq!(SentimentScore::new(150).value(), 100);
        assert_eq!(SentimentScore::from_f64(72.6).value(), 73);
        assert_eq!(SentimentScore::from_f64(f64::NAN), SentimentScore::NEUTRAL);

        let score: SentimentScore = serde_json::from_value(json!(250)).unwrap();
        assert_eq!(score.value(), 100);
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(TrendPrediction::parse_label("看多"), Some(TrendPrediction::Bullish));
        assert_eq!(
            TrendPrediction::parse_label("Strongly-Bearish"),
            Some(TrendPrediction::StronglyBearish)
        );
        assert_eq!(TrendPrediction::parse_label(" 震荡 "), Some(TrendPrediction::Neutral));
        assert_eq!(TrendPrediction::parse_label("moonshot"), None);

        assert_eq!(OperationAdvice::parse_label("强烈买入"), Some(OperationAdvice::Buy));
        assert_eq!(OperationAdvice::parse_label("HOLD"), Some(OperationAdvice::Hold));
        assert_eq!(OperationAdvice::parse_label("观望"), Some(OperationAdvice::Wait));

        assert_eq!(ConfidenceLevel::parse_label("中"), Some(ConfidenceLevel::Medium));
        assert_eq!(ConfidenceLevel::parse_label("High"), Some(ConfidenceLevel::High));
    }

    #[test]
    fn test_free_form_label_matching() {
        assert_eq!(TrendPrediction::parse_label("谨慎看多"), None);
        assert_eq!(TrendPrediction::match_label("谨慎看多"), Some(TrendPrediction::Bullish));
        assert_eq!(
            TrendPrediction::match_label("短期强烈看空"),
            Some(TrendPrediction::StronglyBearish)
        );
        assert_eq!(
            TrendPrediction::match_label("Cautiously bullish"),
            Some(TrendPrediction::Bullish)
        );
        assert_eq!(TrendPrediction::match_label("宽幅震荡"), Some(TrendPrediction::Neutral));
        assert_eq!(TrendPrediction::match_label("to the moon"), None);

        assert_eq!(OperationAdvice::match_label("逢低买入"), Some(OperationAdvice::Buy));
        assert_eq!(OperationAdvice::match_label("逢高减仓"), Some(OperationAdvice::Reduce));
        assert_eq!(OperationAdvice::match_label("继续持有"), Some(OperationAdvice::Hold));
        assert_eq!(OperationAdvice::match_label("不建议买入"), None);
        assert_eq!(OperationAdvice::match_label("do not buy"), None);
    }

    #[test]
    fn test_enum_wire_labels() {
        assert_eq!(
            serde_json::to_value(TrendPrediction::StronglyBullish).unwrap(),
            json!("强烈看多")
        );
        assert_eq!(serde_json::to_value(OperationAdvice::Reduce).unwrap(), json!("减仓"));
        let advice: OperationAdvice = serde_json::from_value(json!("sell")).unwrap();
        assert_eq!(advice, OperationAdvice::Sell);
        assert_eq!(ConfidenceLevel::Low.to_string(), "低");
    }

    #[test]
    fn test_unavailable_payload() {
        let result = AnalysisResult::unavailable("600519", "贵州茅台", "GEMINI_API_KEY");
        assert!(!result.success);
        assert_eq!(result.sentiment_score.value(), 50);
        assert_eq!(result.trend_prediction, TrendPrediction::Neutral);
        assert_eq!(result.operation_advice, OperationAdvice::Hold);
        assert_eq!(result.confidence_level, ConfidenceLevel::Low);
        assert!(result.error_message.unwrap().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_failure_payload_truncates_summary() {
        let error = "x".repeat(300);
        let result = AnalysisResult::failure("600519", "贵州茅台", &error);
        assert!(!result.success);
        assert_eq!(result.analysis_summary.chars().count(), "分析过程出错: ".chars().count() + 100);
        assert_eq!(result.error_message.as_deref(), Some(error.as_str()));
    }

    #[test]
    fn test_accessors_without_dashboard() {
        let mut result = AnalysisResult::neutral("600519", "贵州茅台");
        result.analysis_summary = "summary".to_string();

        assert_eq!(result.core_conclusion(), "summary");
        assert_eq!(result.position_advice(true), "持有");
        assert!(result.sniper_points().is_none());
        assert!(result.checklist().is_empty());
        assert!(result.risk_alerts().is_empty());
        assert_eq!(result.emoji(), "🟡");
        assert_eq!(result.confidence_stars(), "⭐⭐");
    }

    #[test]
    fn test_accessors_with_dashboard() {
        let dashboard = Dashboard::from_value(&json!({
            "core_conclusion": {
                "one_sentence": "缩量回踩MA5，可轻仓介入",
                "position_advice": {"no_position": "1800附近建仓", "has_position": "继续持有"}
            },
            "intelligence": {"risk_alerts": ["高位减持"]},
            "battle_plan": {
                "sniper_points": {"ideal_buy": 1800, "stop_loss": "1750"},
                "action_checklist": ["✅ 多头排列", "⚠️ 量能一般"]
            }
        }))
        .unwrap();

        let result = AnalysisResult {
            dashboard: Some(dashboard),
            ..AnalysisResult::neutral("600519", "贵州茅台")
        };

        assert_eq!(result.core_conclusion(), "缩量回踩MA5，可轻仓介入");
        assert_eq!(result.position_advice(false), "1800附近建仓");
        assert_eq!(result.position_advice(true), "继续持有");
        assert_eq!(result.sniper_points().unwrap()["ideal_buy"], "1800");
        assert_eq!(result.checklist().len(), 2);
        assert_eq!(result.risk_alerts(), ["高位减持".to_string()]);
    }

    #[test]
    fn test_malformed_leaf_dropped_alone() {
        let dashboard = Dashboard::from_value(&json!({
            "core_conclusion": {"one_sentence": "缩量回踩可低吸", "position_advice": "空仓者观望"},
            "battle_plan": {
                "sniper_points": {"ideal_buy": "1800"},
                "action_checklist": ["✅ 多头排列"],
                "short_term": "not an object",
                "long_term": {"buy": "1700", "sell": "2200"}
            },
            "risk_assessment": "高"
        }))
        .unwrap();

        let core = dashboard.core_conclusion.unwrap();
        assert_eq!(core.one_sentence.as_deref(), Some("缩量回踩可低吸"));
        assert!(core.position_advice.is_none());

        let plan = dashboard.battle_plan.unwrap();
        assert!(plan.short_term.is_none());
        assert_eq!(plan.sniper_points["ideal_buy"], "1800");
        assert_eq!(plan.action_checklist.len(), 1);
        assert_eq!(plan.long_term.unwrap().sell.as_deref(), Some("2200"));

        assert!(dashboard.risk_assessment.is_none());
        assert!(Dashboard::from_value(&json!("text")).is_none());
    }

    #[test]
    fn test_flat_map_schema() {
        let map = AnalysisResult::unavailable("600519", "贵州茅台", "KEY").to_flat_map();
        for key in [
            "code",
            "name",
            "sentiment_score",
            "trend_prediction",
            "operation_advice",
            "confidence_level",
            "dashboard",
            "analysis_summary",
            "detailed_analysis",
            "key_points",
            "risk_warning",
            "buy_price",
            "sell_price",
            "stop_loss_price",
            "plain_talk_short",
            "plain_talk_long",
            "search_performed",
            "data_sources",
            "success",
            "error_message",
        ] {
            assert!(map.contains_key(key), "missing {key}");
        }
        assert_eq!(map["sentiment_score"], json!(50));
        assert_eq!(map["trend_prediction"], json!("震荡"));
        assert_eq!(map["dashboard"], Value::Null);
    }

    #[test]
    fn test_wire_round_trip() {
        let original = AnalysisResult::failure("000001", "平安银行", "boom");
        let decoded: AnalysisResult =
            serde_json::from_value(Value::Object(original.to_flat_map())).unwrap();
        assert_eq!(decoded, original);
    }
}
