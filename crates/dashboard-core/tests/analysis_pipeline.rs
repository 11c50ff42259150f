mod common;

use common::{Reply, ScriptedProvider, bullish_document, configured, policy, router};
use dashboard_core::{
    AnalysisContext, AnalysisService, AnalyzerConfig, BatchCoordinator, BatchItem,
    ConfidenceLevel, JsonFileContextSource, OperationAdvice, ReportType, StockAnalyzer,
    TrendPrediction,
};
use std::sync::Arc;
use std::time::Duration;

fn analyzer_with(gemini: Arc<ScriptedProvider>, max_retries: u32) -> StockAnalyzer {
    let config = configured(max_retries);
    let router = router(
        Some(gemini),
        None,
        policy(max_retries, Duration::from_millis(100)),
    );
    StockAnalyzer::with_router(router, &config)
}

fn context(code: &str) -> AnalysisContext {
    let mut context = AnalysisContext::new(code);
    context.today.close = Some(1820.0);
    context.today.ma5 = Some(1810.0);
    context.ma_status = Some("多头排列".to_string());
    context
}

#[tokio::test(start_paused = true)]
async fn analyze_maps_document_and_stamps_metadata() {
    let gemini = ScriptedProvider::always("gemini", Reply::text(bullish_document()));
    let mut analyzer = analyzer_with(gemini.clone(), 3);

    let result = analyzer
        .analyze(&context("600519"), Some("三季度业绩预增"))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.name, "贵州茅台");
    assert_eq!(result.sentiment_score.value(), 78);
    assert_eq!(result.trend_prediction, TrendPrediction::Bullish);
    assert_eq!(result.operation_advice, OperationAdvice::Buy);
    assert_eq!(result.confidence_level, ConfidenceLevel::High);
    assert_eq!(result.buy_price, "1800");
    assert_eq!(result.stop_loss_price, "1750");
    assert!(result.search_performed);
    assert_eq!(result.raw_response.as_deref(), Some(bullish_document().as_str()));

    let calls = gemini.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].prompt.contains("贵州茅台(600519)"));
    assert!(calls[0].prompt.contains("三季度业绩预增"));
}

#[tokio::test(start_paused = true)]
async fn analyze_without_news_marks_no_search() {
    let gemini = ScriptedProvider::always("gemini", Reply::text(bullish_document()));
    let mut analyzer = analyzer_with(gemini, 3);

    let result = analyzer.analyze(&context("000001"), Some("   ")).await.unwrap();

    assert!(!result.search_performed);
    assert_eq!(result.name, "平安银行");
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_skip_every_call() {
    let gemini = ScriptedProvider::always("gemini", Reply::text(bullish_document()));
    let router = router(Some(gemini.clone()), None, policy(3, Duration::from_millis(10)));
    let mut analyzer = StockAnalyzer::with_router(router, &AnalyzerConfig::default());

    let result = analyzer.analyze(&context("600519"), None).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.sentiment_score.value(), 50);
    assert_eq!(result.trend_prediction, TrendPrediction::Neutral);
    assert_eq!(result.operation_advice, OperationAdvice::Hold);
    assert_eq!(result.confidence_level, ConfidenceLevel::Low);
    assert!(result.error_message.unwrap().contains("GEMINI_API_KEY"));
    assert_eq!(gemini.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unparseable_answer_still_succeeds() {
    let gemini = ScriptedProvider::always("gemini", Reply::text("没有结构化输出，整体看空，建议卖出，已跌破支撑"));
    let mut analyzer = analyzer_with(gemini, 3);

    let result = analyzer.analyze(&context("600519"), None).await.unwrap();

    assert!(result.success);
    assert_eq!(result.sentiment_score.value(), 35);
    assert_eq!(result.trend_prediction, TrendPrediction::Bearish);
    assert_eq!(result.confidence_level, ConfidenceLevel::Low);
    assert!(!result.detailed_analysis.is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_ladder_surfaces_as_error() {
    let gemini = ScriptedProvider::always("gemini", Reply::Failure);
    let mut analyzer = analyzer_with(gemini.clone(), 2);

    let err = analyzer.analyze(&context("600519"), None).await.unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(gemini.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn batch_paces_items_and_keeps_order() {
    let gemini = ScriptedProvider::always("gemini", Reply::text(bullish_document()));
    let mut batch = BatchCoordinator::new(analyzer_with(gemini.clone(), 3));
    let items: Vec<BatchItem> = ["600519", "000001", "300750"]
        .into_iter()
        .map(|code| BatchItem::new(context(code)))
        .collect();

    let started = tokio::time::Instant::now();
    let results = batch
        .analyze_all(&items, Duration::from_secs(2))
        .await
        .unwrap();

    let codes: Vec<_> = results.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, ["600519", "000001", "300750"]);

    let calls = gemini.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].at - started < Duration::from_millis(1));
    assert!(calls[1].at - calls[0].at >= Duration::from_secs(2));
    assert!(calls[2].at - calls[1].at >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn batch_aborts_on_first_exhausted_item() {
    let gemini = ScriptedProvider::new(
        "gemini",
        vec![Reply::text(bullish_document())],
        Reply::Failure,
    );
    let mut batch = BatchCoordinator::new(analyzer_with(gemini.clone(), 2));
    let items: Vec<BatchItem> = ["600519", "000001", "300750"]
        .into_iter()
        .map(|code| context(code).into())
        .collect();

    let err = batch
        .analyze_all(&items, Duration::from_millis(500))
        .await
        .unwrap_err();

    assert!(err.is_exhausted());
    // One success, then two failed attempts on the second item; the third is never tried
    assert_eq!(gemini.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn service_rejects_invalid_code_without_calls() {
    let gemini = ScriptedProvider::always("gemini", Reply::text(bullish_document()));
    let dir = tempfile::tempdir().unwrap();
    let mut service = AnalysisService::new(
        analyzer_with(gemini.clone(), 3),
        Arc::new(JsonFileContextSource::new(dir.path())),
    );

    for code in ["60051", "AAPL", "hk123", ""] {
        let response = service.submit_analysis(code, ReportType::Simple).await;
        assert!(!response.success);
        assert!(response.error.is_some());
        assert!(response.task_id.is_none());
    }
    assert_eq!(gemini.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn service_returns_simple_payload() {
    let gemini = ScriptedProvider::always("gemini", Reply::text(bullish_document()));
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("hk00700.json"),
        r#"{"stock_name": "腾讯控股", "today": {"close": 420.2}}"#,
    )
    .unwrap();
    let mut service = AnalysisService::new(
        analyzer_with(gemini, 3),
        Arc::new(JsonFileContextSource::new(dir.path())),
    );

    let response = service.submit_analysis(" HK00700 ", ReportType::Simple).await;

    assert!(response.success);
    assert_eq!(response.code, "hk00700");
    assert!(response.task_id.as_deref().unwrap().starts_with("hk00700_"));
    let payload = response.result.unwrap();
    assert_eq!(payload["name"], "腾讯控股");
    assert_eq!(payload["sentiment_score"], 78);
    assert!(!payload.contains_key("detailed_analysis"));
    assert!(!payload.contains_key("raw_response"));
}

#[tokio::test(start_paused = true)]
async fn service_turns_exhaustion_into_failure_payload() {
    let gemini = ScriptedProvider::always("gemini", Reply::RateLimited);
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("600519.json"), "{}").unwrap();
    let mut service = AnalysisService::new(
        analyzer_with(gemini, 2),
        Arc::new(JsonFileContextSource::new(dir.path())),
    );

    let response = service.submit_analysis("600519", ReportType::Full).await;

    assert!(!response.success);
    assert!(response.error.as_deref().unwrap().contains("exhausted"));
    let payload = response.result.unwrap();
    assert_eq!(payload["success"], false);
    assert_eq!(payload["sentiment_score"], 50);
    assert_eq!(payload["operation_advice"], "持有");
    assert_eq!(payload["name"], "贵州茅台");
    assert!(payload.contains_key("detailed_analysis"));
}
