use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("price series for '{ticker}' is invalid: {reason}")]
    InvalidSeries { ticker: String, reason: String },

    #[error("price value for '{0}' cannot be represented as a finite number")]
    NonFinitePrice(String),
}
