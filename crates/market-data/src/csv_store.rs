use crate::error::MarketDataError;
use crate::PriceSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{PriceBar, PriceSeries};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One row of a stored price CSV. Field order is the on-disk column order.
#[derive(Debug, Serialize, Deserialize)]
struct CsvBar {
    date: NaiveDate,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

/// A directory of per-ticker daily price CSVs (`{TICKER}.csv`).
///
/// This is the local cache the backfill command writes into and the analyze
/// command reads from. Files are validated into a `PriceSeries` on load, so a
/// hand-edited file with unordered dates or non-positive prices is rejected
/// rather than silently analyzed.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The on-disk path for a ticker's series.
    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker.to_uppercase()))
    }

    /// Loads and validates a ticker's series from the store.
    pub fn load(&self, ticker: &str) -> Result<PriceSeries, MarketDataError> {
        let path = self.path_for(ticker);
        let mut reader = csv::Reader::from_path(&path).map_err(|e| match e.kind() {
            csv::ErrorKind::Io(io) if io.kind() == ErrorKind::NotFound => {
                MarketDataError::SeriesNotFound(ticker.to_string())
            }
            _ => MarketDataError::Parse {
                ticker: ticker.to_string(),
                reason: e.to_string(),
            },
        })?;

        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvBar>() {
            let row = row.map_err(|e| MarketDataError::Parse {
                ticker: ticker.to_string(),
                reason: e.to_string(),
            })?;
            bars.push(PriceBar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        Ok(PriceSeries::new(ticker, bars)?)
    }

    /// Writes a series into the store, creating the directory if needed.
    /// Columns are written in a fixed order so repeated saves of the same
    /// series are byte-identical.
    pub fn save(&self, series: &PriceSeries) -> Result<(), MarketDataError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(series.ticker());
        let mut writer = csv::Writer::from_path(&path).map_err(|e| MarketDataError::Parse {
            ticker: series.ticker().to_string(),
            reason: e.to_string(),
        })?;

        for bar in series.bars() {
            let row = CsvBar {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            };
            writer.serialize(row).map_err(|e| MarketDataError::Parse {
                ticker: series.ticker().to_string(),
                reason: e.to_string(),
            })?;
        }
        writer.flush()?;

        tracing::debug!(
            ticker = series.ticker(),
            bars = series.len(),
            path = %path.display(),
            "saved price series to store"
        );
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl PriceSource for CsvStore {
    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries, MarketDataError> {
        self.load(ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_series() -> PriceSeries {
        let bars = vec![
            PriceBar {
                date: "2024-01-02".parse().unwrap(),
                open: Decimal::from(100),
                high: Decimal::from(103),
                low: Decimal::from(99),
                close: Decimal::from(102),
                volume: Decimal::from(10_000),
            },
            PriceBar {
                date: "2024-01-03".parse().unwrap(),
                open: Decimal::from(102),
                high: Decimal::from(105),
                low: Decimal::from(101),
                close: Decimal::from(104),
                volume: Decimal::from(12_500),
            },
        ];
        PriceSeries::new("ACME", bars).unwrap()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());

        let series = sample_series();
        store.save(&series).unwrap();
        let loaded = store.load("ACME").unwrap();

        assert_eq!(loaded, series);
    }

    #[test]
    fn repeated_saves_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let series = sample_series();

        store.save(&series).unwrap();
        let first = std::fs::read(store.path_for("ACME")).unwrap();
        store.save(&series).unwrap();
        let second = std::fs::read(store.path_for("ACME")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_ticker_is_series_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let err = store.load("NOPE").unwrap_err();
        assert!(matches!(err, MarketDataError::SeriesNotFound(t) if t == "NOPE"));
    }

    #[test]
    fn corrupt_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        std::fs::write(
            store.path_for("BAD"),
            "date,open,high,low,close,volume\n2024-01-02,abc,1,1,1,1\n",
        )
        .unwrap();

        assert!(matches!(
            store.load("BAD"),
            Err(MarketDataError::Parse { .. })
        ));
    }

    #[test]
    fn unordered_dates_fail_series_validation() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        std::fs::write(
            store.path_for("ORD"),
            "date,open,high,low,close,volume\n\
             2024-01-03,100,101,99,100,1000\n\
             2024-01-02,100,101,99,100,1000\n",
        )
        .unwrap();

        assert!(matches!(store.load("ORD"), Err(MarketDataError::Series(_))));
    }
}
