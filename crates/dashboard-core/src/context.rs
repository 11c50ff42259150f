//! Input context for one analysis
//!
//! The context is produced upstream (market-data fetch, indicator
//! computation) and handed over as JSON. Field names follow the upstream
//! pipeline; Chinese keys emitted by the financial data source are accepted
//! as aliases.

use crate::lenient::{opt_number, opt_text};
use serde::{Deserialize, Serialize};

/// Names of frequently analysed A-share codes, used when the context carries
/// no usable name.
const WELL_KNOWN_NAMES: &[(&str, &str)] = &[
    ("600519", "贵州茅台"),
    ("000001", "平安银行"),
    ("300750", "宁德时代"),
    ("002594", "比亚迪"),
    ("600036", "招商银行"),
    ("601318", "中国平安"),
    ("000858", "五粮液"),
    ("600276", "恒瑞医药"),
    ("601012", "隆基绿能"),
    ("002475", "立讯精密"),
    ("300059", "东方财富"),
    ("002415", "海康威视"),
    ("600900", "长江电力"),
    ("601166", "兴业银行"),
    ("600028", "中国石化"),
];

/// Look up a well-known stock name by code
pub fn well_known_name(code: &str) -> Option<&'static str> {
    WELL_KNOWN_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Market and fundamental data for one stock
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Stock code, e.g. `600519` or `hk00700`
    #[serde(default)]
    pub code: String,

    /// Display name supplied by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_name: Option<String>,

    /// Trading date of the snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Latest daily bar with moving averages
    #[serde(default)]
    pub today: DailyBar,

    /// Moving-average alignment description, e.g. "多头排列"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ma_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<RealtimeQuote>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chip: Option<ChipDistribution>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_analysis: Option<TrendSnapshot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_abstract: Option<FinancialAbstract>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_info: Option<CompanyInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital_flow: Option<CapitalFlow>,
}

/// Daily OHLCV bar plus moving averages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    #[serde(default, deserialize_with = "opt_number")]
    pub open: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub high: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub low: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub close: Option<f64>,
    /// Shares traded
    #[serde(default, deserialize_with = "opt_number")]
    pub volume: Option<f64>,
    /// Turnover in currency units
    #[serde(default, deserialize_with = "opt_number")]
    pub amount: Option<f64>,
    /// Percentage change versus previous close
    #[serde(default, deserialize_with = "opt_number")]
    pub pct_chg: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub ma5: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub ma10: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub ma20: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub volume_ratio: Option<f64>,
}

/// Real-time quote fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeQuote {
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_number")]
    pub volume_ratio: Option<f64>,
    /// Turnover rate in percent
    #[serde(default, deserialize_with = "opt_number")]
    pub turnover_rate: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub pe_ratio: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub pb_ratio: Option<f64>,
    /// Total market value in currency units
    #[serde(default, deserialize_with = "opt_number")]
    pub total_mv: Option<f64>,
}

/// Chip (cost) distribution; ratios are fractions in `0..=1`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChipDistribution {
    #[serde(default, deserialize_with = "opt_number")]
    pub profit_ratio: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub avg_cost: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub concentration_90: Option<f64>,
    #[serde(default, deserialize_with = "opt_text")]
    pub chip_status: Option<String>,
}

/// Output of the upstream trend classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    #[serde(default, deserialize_with = "opt_text")]
    pub trend_status: Option<String>,
    /// Deviation from MA5 in percent
    #[serde(default, deserialize_with = "opt_number")]
    pub bias_ma5: Option<f64>,
}

/// Financial summary; growth and ROE figures are percentages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialAbstract {
    #[serde(default, alias = "营业总收入", deserialize_with = "opt_number")]
    pub revenue: Option<f64>,
    #[serde(default, alias = "营业总收入增长率", deserialize_with = "opt_number")]
    pub revenue_growth: Option<f64>,
    #[serde(default, alias = "归母净利润", deserialize_with = "opt_number")]
    pub net_profit: Option<f64>,
    #[serde(
        default,
        alias = "归属母公司净利润增长率",
        deserialize_with = "opt_number"
    )]
    pub profit_growth: Option<f64>,
    #[serde(default, alias = "净资产收益率(ROE)", deserialize_with = "opt_number")]
    pub roe: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(default, alias = "所属行业", deserialize_with = "opt_text")]
    pub industry: Option<String>,
    #[serde(default, alias = "主营业务", deserialize_with = "opt_text")]
    pub main_business: Option<String>,
}

/// Recent daily capital flow, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapitalFlow {
    #[serde(default)]
    pub recent_flow: Vec<FlowEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowEntry {
    #[serde(default, alias = "日期", deserialize_with = "opt_text")]
    pub date: Option<String>,
    /// Main-force net inflow as a percentage of turnover
    #[serde(default, alias = "主力净流入占比", deserialize_with = "opt_number")]
    pub main_net_inflow_ratio: Option<f64>,
}

impl AnalysisContext {
    /// Create an empty context for a code
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Set the caller-supplied display name
    pub fn with_stock_name(mut self, name: impl Into<String>) -> Self {
        self.stock_name = Some(name.into());
        self
    }

    /// Name shown in prompts and reports
    ///
    /// Order: caller-supplied name unless blank or a generic `股票…`
    /// placeholder, then the real-time quote name, then the built-in table,
    /// then `股票{code}`.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.stock_name.as_deref().map(str::trim) {
            if !name.is_empty() && !name.starts_with("股票") {
                return name.to_string();
            }
        }

        if let Some(name) = self
            .realtime
            .as_ref()
            .and_then(|rt| rt.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            return name.to_string();
        }

        well_known_name(&self.code).map_or_else(|| format!("股票{}", self.code), str::to_string)
    }

    /// At least one fundamentals section is present
    pub fn has_fundamentals(&self) -> bool {
        self.financial_abstract.is_some()
            || self.company_info.is_some()
            || self.capital_flow.is_some()
    }
}
