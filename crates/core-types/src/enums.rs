use serde::{Deserialize, Serialize};
use std::fmt;

/// The discrete market regime predicted for a single instrument.
///
/// This enumeration is closed and exhaustive: an instrument is always in
/// exactly one of these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateLabel {
    Bullish,
    Sideways,
    Bearish,
}

impl StateLabel {
    /// All states, in the fixed order used for deterministic tie-breaking.
    pub const ALL: [StateLabel; 3] = [StateLabel::Bearish, StateLabel::Sideways, StateLabel::Bullish];

    /// The integer class code used at the model boundary.
    pub fn code(&self) -> i32 {
        match self {
            StateLabel::Bullish => 1,
            StateLabel::Sideways => 0,
            StateLabel::Bearish => -1,
        }
    }

    /// Maps a model class code back to a state.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(StateLabel::Bullish),
            0 => Some(StateLabel::Sideways),
            -1 => Some(StateLabel::Bearish),
            _ => None,
        }
    }

    /// The direction this state contributes to the portfolio score.
    pub fn direction(&self) -> f64 {
        f64::from(self.code())
    }
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateLabel::Bullish => write!(f, "Bullish"),
            StateLabel::Sideways => write!(f, "Sideways"),
            StateLabel::Bearish => write!(f, "Bearish"),
        }
    }
}

/// The reason code attached to a risk flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagCode {
    /// The model's confidence fell below the configured threshold.
    LowConfidence,
    /// Realized volatility exceeded the configured threshold.
    HighVolatility,
    /// The predicted state disagrees with the price-vs-moving-average heuristic.
    IndicatorDivergence,
}

impl FlagCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagCode::LowConfidence => "low_confidence",
            FlagCode::HighVolatility => "high_volatility",
            FlagCode::IndicatorDivergence => "indicator_divergence",
        }
    }
}

impl fmt::Display for FlagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How strongly a risk flag should reduce trust in a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A coarse verdict band over the 0-100 health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthBand {
    Strong,
    Moderate,
    Weak,
}

impl HealthBand {
    /// Bands: >= 75 Strong, >= 50 Moderate, below that Weak.
    pub fn from_score(score: u8) -> Self {
        if score >= 75 {
            HealthBand::Strong
        } else if score >= 50 {
            HealthBand::Moderate
        } else {
            HealthBand::Weak
        }
    }
}

impl fmt::Display for HealthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthBand::Strong => write!(f, "Strong"),
            HealthBand::Moderate => write!(f, "Moderate"),
            HealthBand::Weak => write!(f, "Weak"),
        }
    }
}
