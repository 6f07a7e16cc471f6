use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("cannot aggregate an empty portfolio")]
    EmptyPortfolio,

    #[error(transparent)]
    Core(#[from] core_types::CoreError),
}
