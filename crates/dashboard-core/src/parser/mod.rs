//! Three-tier interpretation of model output
//!
//! 1. Structured: locate the JSON document, repair it, map every field.
//! 2. Pattern: pull the key fields out with regular expressions.
//! 3. Heuristic: infer direction from keywords and wrap the text in a
//!    minimal Markdown report.
//!
//! Parsing never fails; the lower tiers mark the result low-confidence.

pub mod extract;
pub mod heuristic;
pub mod repair;

use crate::lenient::{value_to_f64, value_to_text};
use crate::result::{
    AnalysisResult, BattlePlan, ConfidenceLevel, Dashboard, OperationAdvice, SentimentScore,
    TrendPrediction,
};
use extract::{ExtractedFields, extract_fields};
use heuristic::{KeywordSignal, clean_excerpt, fallback_report};
use repair::{json_span, repair_json, strip_code_fences};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Turns raw model output into an [`AnalysisResult`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a response; always yields a result with `success = true`
    pub fn parse(&self, raw: &str, code: &str, name: &str) -> AnalysisResult {
        match structured_document(raw) {
            Some(document) => {
                debug!("Parsed structured response for {code}");
                map_document(&document, code, name)
            }
            None => {
                warn!("No JSON document recovered for {code}, falling back to text extraction");
                degraded(raw, code, name)
            }
        }
    }
}

/// Locate, repair and decode the JSON object in a response
fn structured_document(raw: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_code_fences(raw);
    let span = json_span(&cleaned)?;
    match serde_json::from_str::<Value>(&repair_json(span)) {
        Ok(Value::Object(document)) => Some(document),
        Ok(_) => None,
        Err(e) => {
            warn!("Repaired response is still not valid JSON: {e}");
            None
        }
    }
}

/// Text of a field; lists of scalars are joined
fn text_field(document: &Map<String, Value>, key: &str) -> String {
    match document.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join("；"),
        Some(value) => value_to_text(value).unwrap_or_default(),
        None => String::new(),
    }
}

fn score_field(document: &Map<String, Value>) -> SentimentScore {
    document
        .get("sentiment_score")
        .and_then(value_to_f64)
        .map_or(SentimentScore::NEUTRAL, SentimentScore::from_f64)
}

/// Match a label field; the model's own wording comes back alongside
fn label_field<T: Default>(
    document: &Map<String, Value>,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> (T, Option<String>) {
    let Some(raw) = document.get(key).and_then(value_to_text) else {
        return (T::default(), None);
    };
    (match_or_default(key, &raw, parse), Some(raw))
}

fn match_or_default<T: Default>(key: &str, raw: &str, parse: fn(&str) -> Option<T>) -> T {
    parse(raw).unwrap_or_else(|| {
        warn!("Unrecognized {key} value {raw:?}, using default");
        T::default()
    })
}

/// Wording worth keeping: non-empty and not already the canonical label
fn verbatim(raw: Option<String>, label: &str) -> Option<String> {
    raw.map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty() && r != label)
}

fn first_non_empty(candidates: impl IntoIterator<Item = Option<String>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .unwrap_or_default()
}

/// Map a decoded document onto the result model
fn map_document(document: &Map<String, Value>, code: &str, name: &str) -> AnalysisResult {
    let dashboard = document.get("dashboard").and_then(Dashboard::from_value);

    // Trade levels live under dashboard.battle_plan; a top-level battle_plan
    // is accepted as well
    let battle_plan: Option<BattlePlan> = dashboard
        .as_ref()
        .and_then(|d| d.battle_plan.clone())
        .or_else(|| {
            document
                .get("battle_plan")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
        });
    let short_term = battle_plan.as_ref().and_then(|b| b.short_term.clone());
    let long_term = battle_plan.as_ref().and_then(|b| b.long_term.clone());

    let one_sentence = dashboard
        .as_ref()
        .and_then(|d| d.core_conclusion.as_ref())
        .and_then(|c| c.one_sentence.clone());
    let main_risk = dashboard
        .as_ref()
        .and_then(|d| d.risk_assessment.as_ref())
        .and_then(|r| r.main_risk.clone());

    let (trend_prediction, trend_raw) =
        label_field(document, "trend_prediction", TrendPrediction::match_label);
    let (operation_advice, advice_raw) =
        label_field(document, "operation_advice", OperationAdvice::match_label);
    let (confidence_level, _) =
        label_field(document, "confidence_level", ConfidenceLevel::parse_label);

    let text = |key: &str| Some(text_field(document, key));
    let short = |pick: fn(&crate::result::TermPlan) -> Option<String>| {
        short_term.as_ref().and_then(pick)
    };
    let long = |pick: fn(&crate::result::TermPlan) -> Option<String>| {
        long_term.as_ref().and_then(pick)
    };

    AnalysisResult {
        code: code.to_string(),
        name: name.to_string(),
        sentiment_score: score_field(document),
        trend_prediction,
        operation_advice,
        confidence_level,
        trend_prediction_raw: verbatim(trend_raw, trend_prediction.label()),
        operation_advice_raw: verbatim(advice_raw, operation_advice.label()),

        trend_analysis: text_field(document, "trend_analysis"),
        short_term_outlook: text_field(document, "short_term_outlook"),
        medium_term_outlook: text_field(document, "medium_term_outlook"),
        technical_analysis: text_field(document, "technical_analysis"),
        ma_analysis: text_field(document, "ma_analysis"),
        volume_analysis: text_field(document, "volume_analysis"),
        pattern_analysis: text_field(document, "pattern_analysis"),
        fundamental_analysis: text_field(document, "fundamental_analysis"),
        sector_position: text_field(document, "sector_position"),
        company_highlights: text_field(document, "company_highlights"),
        news_summary: text_field(document, "news_summary"),
        market_sentiment: text_field(document, "market_sentiment"),
        hot_topics: text_field(document, "hot_topics"),

        analysis_summary: first_non_empty([text("analysis_summary"), one_sentence]),
        detailed_analysis: text_field(document, "detailed_analysis"),
        key_points: text_field(document, "key_points"),
        risk_warning: first_non_empty([text("risk_warning"), main_risk]),
        buy_reason: text_field(document, "buy_reason"),

        buy_price: first_non_empty([short(|t| t.buy.clone()), text("buy_price")]),
        sell_price: first_non_empty([short(|t| t.sell.clone()), text("sell_price")]),
        stop_loss_price: first_non_empty([
            short(|t| t.stop_loss.clone()),
            text("stop_loss_price"),
        ]),
        short_term_buy: first_non_empty([short(|t| t.buy.clone()), text("short_term_buy")]),
        short_term_sell: first_non_empty([short(|t| t.sell.clone()), text("short_term_sell")]),
        long_term_buy: first_non_empty([long(|t| t.buy.clone()), text("long_term_buy")]),
        long_term_sell: first_non_empty([long(|t| t.sell.clone()), text("long_term_sell")]),

        plain_talk_short: text_field(document, "plain_talk_short"),
        plain_talk_long: text_field(document, "plain_talk_long"),

        search_performed: document
            .get("search_performed")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        data_sources: text_field(document, "data_sources"),
        dashboard,
        ..AnalysisResult::neutral(code, name)
    }
}

/// Pattern and heuristic tiers
fn degraded(raw: &str, code: &str, name: &str) -> AnalysisResult {
    let ExtractedFields {
        score: found_score,
        trend: trend_label,
        advice: advice_label,
        summary,
    } = extract_fields(raw);
    let (mut score, mut trend, mut advice) = KeywordSignal::Neutral.verdict();
    let (mut trend_raw, mut advice_raw) = (None, None);

    if let Some(found) = found_score {
        score = found;
    }
    if let Some(label) = trend_label {
        trend = match_or_default("trend_prediction", &label, TrendPrediction::match_label);
        trend_raw = verbatim(Some(label), trend.label());
    }
    if let Some(label) = advice_label {
        advice = match_or_default("operation_advice", &label, OperationAdvice::match_label);
        advice_raw = verbatim(Some(label), advice.label());
    }

    if found_score.is_none() {
        let signal = KeywordSignal::detect(raw);
        if signal != KeywordSignal::Neutral {
            debug!("Keyword signal for {code}: {signal:?}");
            (score, trend, advice) = signal.verdict();
            (trend_raw, advice_raw) = (None, None);
        }
    }

    let summary = summary.unwrap_or_else(|| clean_excerpt(raw));
    let report = fallback_report(name, code, score, trend, advice, &summary);

    AnalysisResult {
        sentiment_score: score,
        trend_prediction: trend,
        operation_advice: advice,
        trend_prediction_raw: trend_raw,
        operation_advice_raw: advice_raw,
        confidence_level: ConfidenceLevel::Low,
        analysis_summary: summary,
        detailed_analysis: report,
        ..AnalysisResult::neutral(code, name)
    }
}
