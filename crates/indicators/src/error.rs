use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("date {date} is not a trading day in the series for '{ticker}'")]
    UnknownDate { ticker: String, date: NaiveDate },

    #[error(transparent)]
    Core(#[from] core_types::CoreError),
}
