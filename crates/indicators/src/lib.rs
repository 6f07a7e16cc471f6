//! # Indicator Engine
//!
//! Computes technical features from an ordered daily price series. All
//! computation is pure: the same series, date, and parameters always produce
//! the same `FeatureVector`, and no indicator ever reads a bar dated after
//! the target date.
//!
//! Where a trailing window does not yet have enough bars, the feature is
//! emitted as an explicit `FeatureValue::InsufficientHistory` marker rather
//! than a placeholder number.

pub mod error;
pub mod features;

pub use error::IndicatorError;
pub use features::{FeatureFrame, compute_features};
pub use features::{PRICE, RETURN_1D, feature_names, ma_name, rsi_name, volatility_name, volume_z_name};
