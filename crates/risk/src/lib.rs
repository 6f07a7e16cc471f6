//! # Risk Flag Detector
//!
//! Applies a fixed, exhaustively enumerated set of threshold and consistency
//! rules over the feature vector and the classifier output, emitting zero or
//! more risk flags per prediction.
//!
//! Flags are additive and independent: every rule in the table is evaluated
//! on every call, never short-circuiting after the first match.

pub mod detector;
pub mod error;

pub use detector::{FlagRule, RiskDetector, Trigger};
pub use error::RiskError;
