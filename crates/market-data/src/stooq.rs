use crate::error::MarketDataError;
use crate::PriceSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{PriceBar, PriceSeries};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// A concrete `PriceSource` backed by Stooq's keyless daily-history endpoint.
///
/// The endpoint answers `GET /q/d/l/?s={symbol}&i=d` with a plain CSV body
/// (`Date,Open,High,Low,Close,Volume`), oldest bar first. Transient failures
/// are retried with bounded exponential backoff before one final error is
/// surfaced to the caller.
#[derive(Clone)]
pub struct StooqClient {
    client: reqwest::Client,
    base_url: String,
    max_attempts: u32,
    initial_backoff: Duration,
}

/// One row of the provider's CSV response.
#[derive(Debug, Deserialize)]
struct StooqRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Open")]
    open: Decimal,
    #[serde(rename = "High")]
    high: Decimal,
    #[serde(rename = "Low")]
    low: Decimal,
    #[serde(rename = "Close")]
    close: Decimal,
    #[serde(rename = "Volume", default)]
    volume: Option<Decimal>,
}

impl StooqClient {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: "https://stooq.com".to_string(),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }

    /// Maps a plain ticker to the provider's symbol convention: bare symbols
    /// are assumed to be US listings (`AAPL` -> `aapl.us`); symbols that
    /// already carry a market suffix pass through unchanged.
    fn provider_symbol(ticker: &str) -> String {
        let lower = ticker.to_lowercase();
        if lower.contains('.') {
            lower
        } else {
            format!("{lower}.us")
        }
    }

    async fn fetch_once(&self, ticker: &str) -> Result<PriceSeries, MarketDataError> {
        let url = format!(
            "{}/q/d/l/?s={}&i=d",
            self.base_url,
            Self::provider_symbol(ticker)
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::Status {
                status,
                ticker: ticker.to_string(),
            });
        }

        let body = response.text().await?;
        parse_daily_csv(ticker, &body)
    }
}

/// Parses the provider's CSV body into a validated series.
fn parse_daily_csv(ticker: &str, body: &str) -> Result<PriceSeries, MarketDataError> {
    // The endpoint answers "No data" (no header row) for unknown symbols.
    if !body.starts_with("Date,") {
        return Err(MarketDataError::Parse {
            ticker: ticker.to_string(),
            reason: format!("unexpected response body: {}", body.lines().next().unwrap_or("")),
        });
    }

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut bars = Vec::new();
    for row in reader.deserialize::<StooqRow>() {
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
            volume: row.volume.unwrap_or(Decimal::ZERO),
        });
    }

    Ok(PriceSeries::new(ticker, bars)?)
}

#[async_trait]
impl PriceSource for StooqClient {
    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries, MarketDataError> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.fetch_once(ticker).await {
                Ok(series) => {
                    tracing::info!(ticker, bars = series.len(), "fetched daily history");
                    return Ok(series);
                }
                Err(err) if attempt < self.max_attempts && is_transient(&err) => {
                    tracing::warn!(
                        ticker,
                        attempt,
                        error = %err,
                        "price retrieval failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Only network-level and server-side failures are worth retrying; a parse
/// failure or an unknown symbol will not improve on the next attempt.
fn is_transient(err: &MarketDataError) -> bool {
    match err {
        MarketDataError::Http(_) => true,
        MarketDataError::Status { status, .. } => status.is_server_error(),
        _ => false,
    }
}
