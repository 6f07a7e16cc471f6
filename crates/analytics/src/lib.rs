//! # Portfolio Analytics
//!
//! Combines the per-instrument results of an analysis run into one
//! `PortfolioResult` (the Portfolio Aggregator), and derives descriptive
//! risk statistics from a price history.
//!
//! The health score mapping is fixed and documented in `aggregator`: it is
//! strictly monotonic, bounded to 0-100, and independent of instrument
//! ordering.

pub mod aggregator;
pub mod error;
pub mod metrics;

pub use aggregator::{aggregate, instrument_contribution};
pub use error::AnalyticsError;
pub use metrics::risk_metrics;
