use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::Config;
use engine::{AnalysisEngine, CancelToken, run_backtest};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use market_data::{CsvStore, PriceSource, StooqClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod export;

/// The main entry point for the Meridian portfolio analytics application.
#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    // Configuration problems are fatal before any instrument is touched.
    let config = configuration::load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from '{}'", cli.config))?;

    match cli.command {
        Commands::Analyze(args) => handle_analyze(args, config).await,
        Commands::Backfill(args) => handle_backfill(args, config).await,
        Commands::Train(args) => handle_train(args, config),
        Commands::Backtest(args) => handle_backtest(args, config),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Explainable portfolio health analytics over daily equity prices.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the portfolio and write the health report.
    Analyze(AnalyzeArgs),
    /// Download daily price history into the local store.
    Backfill(BackfillArgs),
    /// Train one instrument's model and persist the artifact.
    Train(TrainArgs),
    /// Walk-forward evaluation of one instrument's predicted regimes.
    Backtest(BacktestArgs),
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// Tickers to analyze (comma-separated); defaults to the configured portfolio.
    #[arg(long, value_delimiter = ',')]
    tickers: Option<Vec<String>>,

    /// Where to write the reports; defaults to the configured reports directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct BackfillArgs {
    /// Tickers to download (comma-separated); defaults to the configured portfolio.
    #[arg(long, value_delimiter = ',')]
    tickers: Option<Vec<String>>,
}

#[derive(Parser)]
struct TrainArgs {
    /// The ticker to train a model for (e.g., "AAPL").
    #[arg(long)]
    ticker: String,

    /// The output file path for the trained model artifact.
    #[arg(long, short)]
    output: PathBuf,
}

#[derive(Parser)]
struct BacktestArgs {
    /// The ticker to backtest (e.g., "AAPL").
    #[arg(long)]
    ticker: String,
}

// ==============================================================================
// Command Handlers
// ==============================================================================

/// Runs the full pipeline over the portfolio and prints/exports the result.
async fn handle_analyze(args: AnalyzeArgs, config: Config) -> Result<()> {
    let tickers = args
        .tickers
        .unwrap_or_else(|| config.portfolio.tickers.clone());
    let reports_dir = args
        .output_dir
        .unwrap_or_else(|| PathBuf::from(&config.data.reports_dir));

    let store = CsvStore::new(&config.data.cache_dir);
    let engine = AnalysisEngine::new(config, Arc::new(store))?;

    // Ctrl-C stops scheduling new instruments; in-flight work finishes.
    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nCancellation requested; waiting for in-flight instruments...");
            signal_token.cancel();
        }
    });

    println!("Analyzing {} instruments...", tickers.len());
    let result = engine.run(&tickers, &cancel).await?;

    // --- Portfolio summary table ---
    let mut table = Table::new();
    table.set_header(vec![
        "Ticker",
        "State",
        "Confidence",
        "Contribution",
        "Flags",
        "Top reason",
    ]);
    for entry in &result.breakdown {
        let r = &entry.result;
        let flags = r
            .flags
            .iter()
            .map(|f| f.code.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            r.ticker.clone(),
            r.state.to_string(),
            format!("{:.0}%", r.confidence * 100.0),
            format!("{:+.2}", entry.contribution),
            flags,
            r.explanations.first().cloned().unwrap_or_default(),
        ]);
    }
    println!("\n{table}");

    for excluded in &result.excluded {
        println!("excluded {}: {}", excluded.ticker, excluded.reason);
    }

    println!("\nPORTFOLIO HEALTH SCORE");
    println!("======================");
    println!("Score: {} / 100 ({})", result.health_score, result.verdict);

    let (csv_path, json_path) = export::write_reports(&result, &reports_dir)?;
    println!("\nReports saved:");
    println!("  {}", csv_path.display());
    println!("  {}", json_path.display());

    Ok(())
}

/// Downloads daily history for each ticker into the CSV store concurrently.
async fn handle_backfill(args: BackfillArgs, config: Config) -> Result<()> {
    let tickers = args
        .tickers
        .unwrap_or_else(|| config.portfolio.tickers.clone());

    let client = StooqClient::new(Duration::from_secs(config.engine.retrieval_timeout_secs));
    let store = CsvStore::new(&config.data.cache_dir);

    let progress_bar = ProgressBar::new(tickers.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let tasks: Vec<_> = tickers
        .into_iter()
        .map(|ticker| {
            let client = client.clone();
            let store = store.clone();
            let pb = progress_bar.clone();

            tokio::spawn(async move {
                pb.set_message(format!("Fetching {ticker}..."));
                let series = client.fetch_daily(&ticker).await?;
                store.save(&series)?;
                pb.inc(1);
                Ok::<String, market_data::MarketDataError>(ticker)
            })
        })
        .collect();

    let results = join_all(tasks).await;
    progress_bar.finish_with_message("Backfill complete");

    for result in results {
        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => eprintln!("A download failed: {e}"),
            Err(e) => eprintln!("A task failed: {e}"),
        }
    }

    Ok(())
}

/// Trains one instrument's model from the local store and saves the artifact.
fn handle_train(args: TrainArgs, config: Config) -> Result<()> {
    let store = CsvStore::new(&config.data.cache_dir);
    let series = store
        .load(&args.ticker)
        .with_context(|| format!("No stored history for '{}'; run backfill first", args.ticker))?;

    println!("--- Training model for {} ---", args.ticker);
    let model = classifier::train(
        &series,
        &config.indicators,
        &config.labeling,
        &config.classifier,
    )?;

    let meta = model.metadata();
    println!("Training samples:    {}", meta.training_samples);
    println!("Validation samples:  {}", meta.validation_samples);
    println!("Class distribution:  {:?}", meta.class_distribution);
    match meta.validation_accuracy {
        Some(accuracy) => println!("Validation accuracy: {:.3}", accuracy),
        None => println!("Validation accuracy: n/a"),
    }

    classifier::save_model(&model, &args.output)?;
    println!("Model saved to: {:?}", args.output);

    Ok(())
}

/// Prints the average realized forward returns per predicted state.
fn handle_backtest(args: BacktestArgs, config: Config) -> Result<()> {
    let store = CsvStore::new(&config.data.cache_dir);
    let series = store
        .load(&args.ticker)
        .with_context(|| format!("No stored history for '{}'; run backfill first", args.ticker))?;

    let result = run_backtest(&series, &config)?;

    println!(
        "Backtest for {}: trained on {} samples, walked {} bars",
        result.ticker, result.training_samples, result.evaluated
    );

    let mut table = Table::new();
    table.set_header(vec!["State", "Samples", "Avg 5D %", "Avg 10D %", "Avg 20D %"]);
    for row in &result.per_state {
        table.add_row(vec![
            row.state.to_string(),
            row.samples.to_string(),
            percent(row.mean_return_5d),
            percent(row.mean_return_10d),
            percent(row.mean_return_20d),
        ]);
    }
    println!("{table}");

    Ok(())
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:+.2}", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}
