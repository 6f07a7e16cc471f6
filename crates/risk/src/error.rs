use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Risk detector received invalid parameters: {0}")]
    InvalidParameters(String),
}
