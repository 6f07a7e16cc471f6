pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{FlagCode, HealthBand, Severity, StateLabel};
pub use error::CoreError;
pub use structs::{
    ExcludedInstrument, FeatureValue, FeatureVector, FlagCount, InstrumentContribution,
    InstrumentResult, PortfolioResult, PriceBar, PriceSeries, RiskFlag, RiskMetrics,
};
