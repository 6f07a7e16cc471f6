use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("no cached price series for '{0}'")]
    SeriesNotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status} for '{ticker}'")]
    Status {
        status: reqwest::StatusCode,
        ticker: String,
    },

    #[error("failed to parse price data for '{ticker}': {reason}")]
    Parse { ticker: String, reason: String },

    #[error(transparent)]
    Series(#[from] core_types::CoreError),

    #[error("price store I/O error: {0}")]
    Io(#[from] std::io::Error),
}
