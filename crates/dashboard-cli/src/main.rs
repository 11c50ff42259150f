//! Command-line interface for stock-dashboard
//!
//! Reads precomputed context files (`<dir>/<code>.json`, optional
//! `<dir>/<code>.news.txt`) and prints the decision dashboard as JSON.
//!
//! # Usage
//!
//! ```bash
//! export GEMINI_API_KEY="..."
//! dashboard analyze 600519 --data-dir ./data --report-type full
//! dashboard batch 600519 000001 hk00700 --data-dir ./data --delay-secs 3
//! ```

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dashboard_core::{
    AnalysisService, BatchCoordinator, BatchItem, ContextSource, JsonFileContextSource,
    ReportType, StockAnalyzer, normalize_code,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dashboard", version)]
#[command(about = "Decision-dashboard analysis for A-share and HK stocks", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one stock
    Analyze {
        /// Stock code: 6 digits (A-share) or hk + 5 digits
        code: String,

        /// Directory holding the context files
        #[arg(long)]
        data_dir: PathBuf,

        /// simple or full
        #[arg(long, default_value = "simple")]
        report_type: ReportType,
    },

    /// Analyse several stocks in order
    Batch {
        #[arg(required = true)]
        codes: Vec<String>,

        /// Directory holding the context files
        #[arg(long)]
        data_dir: PathBuf,

        /// Pause between stocks
        #[arg(long, default_value_t = 0.0)]
        delay_secs: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dashboard_utils::init_tracing();

    let args = Args::parse();
    let analyzer = StockAnalyzer::from_env().context("Failed to configure analyzer")?;

    match args.command {
        Command::Analyze {
            code,
            data_dir,
            report_type,
        } => {
            info!("Analysing {code} from {}", data_dir.display());
            let source = Arc::new(JsonFileContextSource::new(data_dir));
            let mut service = AnalysisService::new(analyzer, source);

            let response = service.submit_analysis(&code, report_type).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Batch {
            codes,
            data_dir,
            delay_secs,
        } => {
            let delay = Duration::try_from_secs_f64(delay_secs)
                .context("--delay-secs must be a non-negative number")?;
            let source = JsonFileContextSource::new(data_dir);

            let mut items = Vec::with_capacity(codes.len());
            for raw in &codes {
                let Some(code) = normalize_code(raw) else {
                    bail!("Invalid stock code: {raw} (6 digits or hk + 5 digits)");
                };
                let (context, news) = source
                    .fetch(&code)
                    .await
                    .with_context(|| format!("Failed to load context for {code}"))?;
                let item = BatchItem::new(context);
                items.push(match news {
                    Some(news) => item.with_news(news),
                    None => item,
                });
            }

            info!("Analysing {} stocks", items.len());
            let mut batch = BatchCoordinator::new(analyzer);
            let results = batch.analyze_all(&items, delay).await?;

            let payload: Vec<_> = results.iter().map(|r| r.to_flat_map()).collect();
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}
