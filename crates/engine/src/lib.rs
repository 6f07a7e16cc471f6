//! # Analysis Engine
//!
//! Orchestrates the per-instrument pipeline (retrieve -> features -> train ->
//! predict -> explain -> flag) across the portfolio and joins the results
//! into one `PortfolioResult`.
//!
//! Instruments are independent, so they are processed on a bounded worker
//! pool; the only synchronization point is the aggregation barrier at the
//! end. A failing instrument is excluded with a recorded reason while the
//! run continues - only configuration, cancellation and an effectively empty
//! portfolio are fatal.

pub mod backtest;
pub mod cancel;
pub mod error;

pub use backtest::{RegimeBacktest, StateReturns, run_backtest};
pub use cancel::CancelToken;
pub use error::{EngineError, InstrumentError};

use analytics::risk_metrics;
use configuration::Config;
use core_types::{ExcludedInstrument, InstrumentResult, PortfolioResult};
use explainer::{ExplanationRule, default_rules, explain};
use futures::StreamExt;
use indicators::compute_features;
use market_data::PriceSource;
use risk::RiskDetector;
use std::sync::Arc;
use std::time::Duration;

/// The per-instrument outcome collected at the aggregation barrier.
enum Outcome {
    Completed(Box<InstrumentResult>),
    Excluded(ExcludedInstrument),
    /// Never scheduled because the run was cancelled first.
    Skipped,
}

/// The central orchestrator for one or more analysis runs.
pub struct AnalysisEngine {
    config: Config,
    source: Arc<dyn PriceSource>,
    detector: RiskDetector,
    explanation_rules: Vec<ExplanationRule>,
}

impl AnalysisEngine {
    /// Builds an engine from a validated configuration and a price source.
    pub fn new(config: Config, source: Arc<dyn PriceSource>) -> Result<Self, EngineError> {
        let detector = RiskDetector::new(&config.risk, &config.indicators)?;
        let explanation_rules = default_rules(&config.indicators, &config.risk);
        Ok(Self {
            config,
            source,
            detector,
            explanation_rules,
        })
    }

    /// Analyzes the given tickers and aggregates them into a portfolio
    /// result.
    ///
    /// Per-instrument processing fans out onto at most `engine.workers`
    /// concurrent tasks, which also caps how many trained committees are
    /// resident at once. Aggregation happens strictly after every scheduled
    /// instrument has finished; there is no partial aggregation.
    pub async fn run(
        &self,
        tickers: &[String],
        cancel: &CancelToken,
    ) -> Result<PortfolioResult, EngineError> {
        let outcomes: Vec<Outcome> = futures::stream::iter(
            tickers
                .iter()
                .map(|ticker| self.process_instrument(ticker.clone(), cancel.clone())),
        )
        .buffer_unordered(self.config.engine.workers)
        .collect()
        .await;

        // The join barrier has passed; every in-flight instrument finished.
        if cancel.is_cancelled() {
            tracing::warn!("analysis run cancelled; discarding partial results");
            return Err(EngineError::Cancelled);
        }

        let mut results = Vec::new();
        let mut excluded = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Completed(result) => results.push(*result),
                Outcome::Excluded(exclusion) => excluded.push(exclusion),
                Outcome::Skipped => {}
            }
        }
        // buffer_unordered yields in completion order; sort exclusions so the
        // report is stable across runs.
        excluded.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        Ok(analytics::aggregate(
            results,
            excluded,
            &self.config.scoring,
        )?)
    }

    /// Guards one instrument's pipeline: skipped if the run was cancelled
    /// before it was scheduled, excluded (with the reason) if it fails.
    async fn process_instrument(&self, ticker: String, cancel: CancelToken) -> Outcome {
        if cancel.is_cancelled() {
            tracing::debug!(ticker = %ticker, "skipping instrument; run cancelled");
            return Outcome::Skipped;
        }

        match self.analyze_instrument(&ticker).await {
            Ok(result) => Outcome::Completed(Box::new(result)),
            Err(err) => {
                tracing::warn!(ticker = %ticker, error = %err, "instrument excluded from run");
                Outcome::Excluded(ExcludedInstrument {
                    ticker,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// The full single-instrument pipeline.
    #[tracing::instrument(name = "analyze_instrument", skip(self))]
    async fn analyze_instrument(&self, ticker: &str) -> Result<InstrumentResult, InstrumentError> {
        // 1. Retrieve the validated price history, under a timeout. Retries
        //    and backoff belong to the source, not to this pipeline.
        let timeout = Duration::from_secs(self.config.engine.retrieval_timeout_secs);
        let series = tokio::time::timeout(timeout, self.source.fetch_daily(ticker))
            .await
            .map_err(|_| InstrumentError::RetrievalTimeout(self.config.engine.retrieval_timeout_secs))??;

        let last_bar = series.last_bar().ok_or(InstrumentError::EmptySeries)?;
        let as_of = last_bar.date;

        // 2. Train the per-instrument model over its full usable history.
        let model = classifier::train(
            &series,
            &self.config.indicators,
            &self.config.labeling,
            &self.config.classifier,
        )?;

        // 3. Features at the most recent bar, then the prediction.
        let features = compute_features(&series, as_of, &self.config.indicators)?;
        let prediction = model.predict(&features)?;

        // 4. Explanations and risk flags are derived from the same inputs the
        //    model saw; neither re-invokes the model.
        let explanations = explain(
            &features,
            prediction.state,
            prediction.confidence,
            &self.explanation_rules,
        );
        let flags = self
            .detector
            .detect(&features, prediction.state, prediction.confidence);

        // 5. Descriptive risk statistics for the report.
        let metrics = risk_metrics(&series, &self.config.scoring)?;

        tracing::info!(
            ticker,
            state = %prediction.state,
            confidence = prediction.confidence,
            flags = flags.len(),
            "instrument analysis complete"
        );

        Ok(InstrumentResult {
            ticker: ticker.to_string(),
            date: as_of,
            state: prediction.state,
            confidence: prediction.confidence,
            features,
            explanations,
            flags,
            metrics,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use configuration::{Config, DataParams, Portfolio};
    use core_types::{PriceBar, PriceSeries};
    use market_data::MarketDataError;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    /// An in-memory price source for engine tests.
    struct StaticSource {
        series: HashMap<String, PriceSeries>,
    }

    #[async_trait]
    impl PriceSource for StaticSource {
        async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries, MarketDataError> {
            self.series
                .get(ticker)
                .cloned()
                .ok_or_else(|| MarketDataError::SeriesNotFound(ticker.to_string()))
        }
    }

    fn series_from_closes(ticker: &str, closes: &[f64]) -> PriceSeries {
        let bars: Vec<PriceBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let close = Decimal::try_from(close).unwrap();
                PriceBar {
                    date: NaiveDate::from_ymd_opt(2022, 1, 3)
                        .unwrap()
                        .checked_add_days(chrono::Days::new(i as u64))
                        .unwrap(),
                    open: close,
                    high: close * Decimal::try_from(1.01).unwrap(),
                    low: close * Decimal::try_from(0.99).unwrap(),
                    close,
                    volume: Decimal::from(10_000 + (i as i64 % 9) * 500),
                }
            })
            .collect();
        PriceSeries::new(ticker, bars).unwrap()
    }

    /// Alternating up/down regimes with enough bars to train on.
    fn regime_closes(segments: usize, segment_len: usize) -> Vec<f64> {
        let mut closes = Vec::new();
        let mut price = 100.0f64;
        for segment in 0..segments {
            let up = segment % 2 == 0;
            for step in 0..segment_len {
                let drift = match (up, step % 2 == 0) {
                    (true, true) => 1.015,
                    (true, false) => 0.997,
                    (false, true) => 0.985,
                    (false, false) => 1.003,
                };
                price *= drift;
                closes.push(price);
            }
        }
        closes
    }

    fn config(tickers: &[&str]) -> Config {
        Config {
            portfolio: Portfolio {
                tickers: tickers.iter().map(|t| t.to_string()).collect(),
            },
            indicators: Default::default(),
            labeling: Default::default(),
            classifier: Default::default(),
            risk: Default::default(),
            scoring: Default::default(),
            engine: Default::default(),
            data: DataParams::default(),
        }
    }

    fn engine_with(series: Vec<PriceSeries>, tickers: &[&str]) -> AnalysisEngine {
        let source = StaticSource {
            series: series
                .into_iter()
                .map(|s| (s.ticker().to_string(), s))
                .collect(),
        };
        AnalysisEngine::new(config(tickers), Arc::new(source)).unwrap()
    }

    #[tokio::test]
    async fn run_aggregates_all_healthy_instruments() {
        let closes = regime_closes(4, 60);
        let engine = engine_with(
            vec![
                series_from_closes("AAA", &closes),
                series_from_closes("BBB", &closes),
            ],
            &["AAA", "BBB"],
        );

        let tickers = engine.config().portfolio.tickers.clone();
        let result = engine.run(&tickers, &CancelToken::new()).await.unwrap();

        assert_eq!(result.breakdown.len(), 2);
        assert!(result.excluded.is_empty());
        assert!(result.health_score <= 100);
        for entry in &result.breakdown {
            assert!(!entry.result.explanations.is_empty());
            assert!(entry.result.features.is_complete());
        }
    }

    #[tokio::test]
    async fn failing_instruments_are_isolated_not_fatal() {
        let engine = engine_with(
            vec![
                series_from_closes("GOOD", &regime_closes(4, 60)),
                // Far too short to train on.
                series_from_closes("SHORT", &[100.0, 101.0, 102.0]),
            ],
            &["GOOD", "SHORT", "MISSING"],
        );

        let tickers = engine.config().portfolio.tickers.clone();
        let result = engine.run(&tickers, &CancelToken::new()).await.unwrap();

        assert_eq!(result.breakdown.len(), 1);
        assert_eq!(result.breakdown[0].result.ticker, "GOOD");
        assert_eq!(result.excluded.len(), 2);
        // Exclusions are sorted by ticker and carry a reason.
        assert_eq!(result.excluded[0].ticker, "MISSING");
        assert_eq!(result.excluded[1].ticker, "SHORT");
        assert!(!result.excluded[0].reason.is_empty());
    }

    #[tokio::test]
    async fn all_instruments_failing_is_an_empty_portfolio() {
        let engine = engine_with(vec![], &["GHOST"]);
        let tickers = engine.config().portfolio.tickers.clone();
        let err = engine.run(&tickers, &CancelToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Aggregation(analytics::AnalyticsError::EmptyPortfolio)
        ));
    }

    #[tokio::test]
    async fn cancelled_runs_never_yield_a_result() {
        let engine = engine_with(
            vec![series_from_closes("AAA", &regime_closes(4, 60))],
            &["AAA"],
        );
        let cancel = CancelToken::new();
        cancel.cancel();

        let tickers = engine.config().portfolio.tickers.clone();
        let err = engine.run(&tickers, &cancel).await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }
}
