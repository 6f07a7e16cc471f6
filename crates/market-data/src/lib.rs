//! # Market Data Collaborators
//!
//! Price retrieval lives strictly outside the analytics pipeline: the engine
//! sees only the `PriceSource` trait and the validated `PriceSeries` it
//! yields. Two sources are provided - a keyless daily-history HTTP provider
//! and a local CSV store the provider's output is cached into.
//!
//! Transient provider failures are retried with bounded backoff *here*, in
//! the collaborator; the pipeline only ever sees the final success or
//! failure.

pub mod csv_store;
pub mod error;
pub mod stooq;

pub use csv_store::CsvStore;
pub use error::MarketDataError;
pub use stooq::StooqClient;

use async_trait::async_trait;
use core_types::PriceSeries;

/// The generic, abstract interface for anything that can produce a daily
/// price history for a ticker.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetches the full available daily history, oldest bar first.
    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries, MarketDataError>;
}
