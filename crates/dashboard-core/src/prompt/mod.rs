//! Prompt assembly
//!
//! [`PromptBuilder::build`] is a pure function of its inputs: the same
//! context, name and news always produce the same prompt. Missing values
//! render as `N/A`; there is no error path.

mod system;

pub use system::{OUTPUT_SCHEMA, SYSTEM_PROMPT};

use crate::context::{AnalysisContext, CapitalFlow, CompanyInfo, FinancialAbstract};

/// Token used for any missing value
pub const NOT_AVAILABLE: &str = "N/A";

/// Sentence used when no news excerpt was supplied
pub const NO_NEWS_PLACEHOLDER: &str = "暂无重大近期新闻，请基于行业一般认知分析";

/// Builds the user prompt for one analysis
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Persona instruction to send alongside the prompt
    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// Assemble the prompt
    pub fn build(&self, context: &AnalysisContext, display_name: &str, news: Option<&str>) -> String {
        let code = &context.code;
        let mut prompt = format!(
            "# 角色设定\n\
             你是一位拥有20年经验的资深A股基金经理，擅长“基本面选股 + 技术面择时”。\n\
             现在的任务是为 **{display_name}({code})** 生成一份【决策仪表盘】报告。\n\n\
             # 输入数据\n\n"
        );

        prompt.push_str(&technical_section(context));
        prompt.push_str("\n## 2. 基本面 & 资金\n");
        if context.has_fundamentals() {
            prompt.push_str(&fundamentals_section(context));
        } else {
            prompt.push_str("未提供基本面数据\n");
        }

        let news = news.map(str::trim).filter(|n| !n.is_empty());
        prompt.push_str(&format!(
            "\n## 3. 舆情与政策（近7日）\n```text\n{}\n```\n\n---\n\n",
            news.unwrap_or(NO_NEWS_PLACEHOLDER)
        ));

        prompt.push_str(
            "# 分析指令\n\n\
             综合以上所有维度，输出一份 JSON 格式的决策报告。\n\
             1. 不要罗列指标数值，直接给出观点，例如“均线多头排列，上涨趋势确立”。\n\
             2. 解释涨跌时结合基本面、政策面与技术面。\n\
             3. 结合个股历史股性或行业周期位置。\n\n\
             ## JSON 输出要求\n严格按照以下结构填充字段：\n\n",
        );
        prompt.push_str(OUTPUT_SCHEMA);
        prompt.push_str("\n\n确保 JSON 格式合法，不要输出 JSON 以外的内容。\n");
        prompt
    }
}

fn technical_section(context: &AnalysisContext) -> String {
    let today = &context.today;
    let rt = context.realtime.as_ref();
    let chip = context.chip.as_ref();
    let trend = context.trend_analysis.as_ref();

    let ma_status = context.ma_status.as_deref().unwrap_or("未知");
    let chip_status = chip.and_then(|c| c.chip_status.as_deref()).unwrap_or("未知");
    let trend_status = trend.and_then(|t| t.trend_status.as_deref()).unwrap_or("未知");

    format!(
        "## 1. 技术面\n\
         - 价格: {close} (涨跌 {pct}) | 开 {open} 高 {high} 低 {low}\n\
         - 成交: 成交量 {volume} | 成交额 {amount}\n\
         - 均线: MA5:{ma5} MA10:{ma10} MA20:{ma20} ({ma_status})\n\
         - 量能: 量比 {volume_ratio} | 换手率 {turnover}\n\
         - 估值: 市盈率 {pe} | 市净率 {pb} | 总市值 {total_mv}\n\
         - 筹码: 获利比例 {profit_ratio} | 平均成本 {avg_cost} | 90%集中度 {concentration} ({chip_status})\n\
         - 趋势预判(系统自动): {trend_status} | 乖离率(MA5) {bias}\n",
        close = price(today.close),
        pct = percent(today.pct_chg),
        open = price(today.open),
        high = price(today.high),
        low = price(today.low),
        volume = scaled(today.volume, "股"),
        amount = scaled(today.amount, "元"),
        ma5 = price(today.ma5),
        ma10 = price(today.ma10),
        ma20 = price(today.ma20),
        volume_ratio = price(rt.and_then(|r| r.volume_ratio).or(today.volume_ratio)),
        turnover = percent(rt.and_then(|r| r.turnover_rate)),
        pe = price(rt.and_then(|r| r.pe_ratio)),
        pb = price(rt.and_then(|r| r.pb_ratio)),
        total_mv = scaled(rt.and_then(|r| r.total_mv), "元"),
        profit_ratio = fraction(chip.and_then(|c| c.profit_ratio), 1),
        avg_cost = price(chip.and_then(|c| c.avg_cost)),
        concentration = fraction(chip.and_then(|c| c.concentration_90), 2),
        bias = signed_percent(trend.and_then(|t| t.bias_ma5)),
    )
}

fn fundamentals_section(context: &AnalysisContext) -> String {
    let fin = context.financial_abstract.clone().unwrap_or_default();
    let info = context.company_info.clone().unwrap_or_default();
    let pe = price(context.realtime.as_ref().and_then(|r| r.pe_ratio));

    format!(
        "【公司画像】\n\
         - 行业地位: {industry} | {business}\n\
         - 核心财务: {financials}, 市盈率{pe}\n\
         - 资金面: {flow}\n",
        industry = info.industry.as_deref().unwrap_or(NOT_AVAILABLE),
        business = main_business(&info),
        financials = financial_summary(&fin),
        flow = flow_summary(context.capital_flow.as_ref()),
    )
}

fn main_business(info: &CompanyInfo) -> String {
    info.main_business
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map_or_else(|| NOT_AVAILABLE.to_string(), |b| b.chars().take(30).collect())
}

fn financial_summary(fin: &FinancialAbstract) -> String {
    format!(
        "营收{}(增长{}), 净利{}(增长{}), ROE={}",
        scaled(fin.revenue, "元"),
        percent(fin.revenue_growth),
        scaled(fin.net_profit, "元"),
        percent(fin.profit_growth),
        percent(fin.roe),
    )
}

/// Summarise the last three flow entries, newest last
fn flow_summary(flow: Option<&CapitalFlow>) -> String {
    let ratios: Vec<f64> = flow
        .map(|f| {
            let recent = &f.recent_flow[f.recent_flow.len().saturating_sub(3)..];
            recent.iter().filter_map(|e| e.main_net_inflow_ratio).collect()
        })
        .unwrap_or_default();

    match ratios.last() {
        Some(latest) => {
            let series: Vec<String> = ratios.iter().map(|r| format!("{r:.2}%")).collect();
            format!(
                "近{}日主力净流入占比 {}，最新主力流入占比{latest:.2}%",
                ratios.len(),
                series.join(" / ")
            )
        }
        None => "无资金明显异动".to_string(),
    }
}

// ============================================================================
// Number formatting
// ============================================================================

/// Two decimals
fn price(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.2}"))
}

/// Value already in percent, two decimals
fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.2}%"))
}

/// Percent with explicit sign
fn signed_percent(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:+.2}%"))
}

/// Fraction in `0..=1` rendered as a percentage
fn fraction(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |v| format!("{:.*}%", decimals, v * 100.0),
    )
}

/// Scale large magnitudes to 亿 (1e8) or 万 (1e4)
pub fn scaled(value: Option<f64>, unit: &str) -> String {
    let Some(v) = value else {
        return NOT_AVAILABLE.to_string();
    };
    let magnitude = v.abs();
    if magnitude >= 1e8 {
        format!("{:.2} 亿{unit}", v / 1e8)
    } else if magnitude >= 1e4 {
        format!("{:.2} 万{unit}", v / 1e4)
    } else {
        format!("{v:.0} {unit}")
    }
}
