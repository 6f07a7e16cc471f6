use analytics::AnalyticsError;
use classifier::ClassifierError;
use indicators::IndicatorError;
use market_data::MarketDataError;
use risk::RiskError;
use thiserror::Error;

/// Run-fatal errors. Per-instrument failures never surface here; they are
/// isolated into the result's exclusion list instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    Aggregation(#[from] AnalyticsError),

    #[error("analysis run was cancelled")]
    Cancelled,
}

/// Everything that can go wrong while analyzing a single instrument.
///
/// These are recorded as the exclusion reason for that instrument; the run
/// continues for the rest of the portfolio.
#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("price retrieval timed out after {0}s")]
    RetrievalTimeout(u64),

    #[error("price retrieval failed: {0}")]
    Retrieval(#[from] MarketDataError),

    #[error("price series is empty")]
    EmptySeries,

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Metrics(#[from] AnalyticsError),

    #[error(transparent)]
    Core(#[from] core_types::CoreError),
}
