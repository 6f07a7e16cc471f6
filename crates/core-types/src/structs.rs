use crate::enums::{FlagCode, HealthBand, Severity, StateLabel};
use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One trading day of OHLCV data for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl PriceBar {
    /// The closing price as an `f64` for feature math.
    ///
    /// Fails rather than substituting a placeholder when the decimal does not
    /// fit a finite float.
    pub fn close_f64(&self) -> Result<f64, CoreError> {
        decimal_to_f64(self.close, "close")
    }

    /// The traded volume as an `f64` for feature math.
    pub fn volume_f64(&self) -> Result<f64, CoreError> {
        decimal_to_f64(self.volume, "volume")
    }
}

fn decimal_to_f64(value: Decimal, field: &str) -> Result<f64, CoreError> {
    value
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoreError::NonFinitePrice(field.to_string()))
}

/// A chronologically ordered, validated price history for one instrument.
///
/// The series is immutable once constructed; downstream stages borrow a
/// read-only view of its bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validates and wraps a bar sequence.
    ///
    /// Invariants enforced here so no later stage has to re-check them:
    /// dates strictly increasing (no duplicates), all prices positive,
    /// high >= low, volume non-negative.
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, CoreError> {
        let ticker = ticker.into();
        let invalid = |reason: String| CoreError::InvalidSeries {
            ticker: ticker.clone(),
            reason,
        };

        for (i, bar) in bars.iter().enumerate() {
            if bar.open <= Decimal::ZERO
                || bar.high <= Decimal::ZERO
                || bar.low <= Decimal::ZERO
                || bar.close <= Decimal::ZERO
            {
                return Err(invalid(format!("non-positive price on {}", bar.date)));
            }
            if bar.high < bar.low {
                return Err(invalid(format!("high below low on {}", bar.date)));
            }
            if bar.volume < Decimal::ZERO {
                return Err(invalid(format!("negative volume on {}", bar.date)));
            }
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(invalid(format!(
                    "dates not strictly increasing at {} -> {}",
                    bars[i - 1].date,
                    bar.date
                )));
            }
        }

        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The position of `date` within the series, if it is a trading day.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |bar| bar.date).ok()
    }

    /// The most recent bar, if any.
    pub fn last_bar(&self) -> Option<&PriceBar> {
        self.bars.last()
    }
}

/// A single engineered feature: either a finite number or an explicit marker
/// that the trailing window did not yet have enough bars.
///
/// The marker exists so that "not computable" is never silently encoded as
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Finite(f64),
    InsufficientHistory,
}

impl FeatureValue {
    pub fn as_finite(&self) -> Option<f64> {
        match self {
            FeatureValue::Finite(v) => Some(*v),
            FeatureValue::InsufficientHistory => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, FeatureValue::Finite(_))
    }
}

/// The engineered features for one instrument at one date.
///
/// Keys are indicator names (`ma20`, `rsi14`, ...). A `BTreeMap` keeps the
/// iteration order deterministic, which both the model input assembly and the
/// diffable export rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    date: NaiveDate,
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureVector {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FeatureValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<FeatureValue> {
        self.values.get(name).copied()
    }

    /// The feature's finite value, or `None` if absent or marked insufficient.
    pub fn finite(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_finite())
    }

    pub fn values(&self) -> &BTreeMap<String, FeatureValue> {
        &self.values
    }

    /// True when every entry is a finite number (no insufficient-history
    /// markers), i.e. the vector is usable for model inference.
    pub fn is_complete(&self) -> bool {
        !self.values.is_empty() && self.values.values().all(|v| v.is_finite())
    }
}

/// A discrete warning attached to a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RiskFlag {
    pub code: FlagCode,
    pub severity: Severity,
}

/// Descriptive risk statistics for one instrument's full history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Compound annual growth rate; `None` for series under one year.
    pub cagr: Option<f64>,
    /// Standard deviation of daily returns, annualized by sqrt(252).
    pub annualized_volatility: Option<f64>,
    /// Mean excess daily return over its standard deviation, annualized.
    pub sharpe_ratio: Option<f64>,
    /// Worst peak-to-trough decline, as a negative percentage.
    pub max_drawdown_pct: f64,
}

/// The per-instrument output of one analysis run. Read-only after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentResult {
    pub ticker: String,
    pub date: NaiveDate,
    pub state: StateLabel,
    pub confidence: f64,
    pub features: FeatureVector,
    pub explanations: Vec<String>,
    pub flags: Vec<RiskFlag>,
    pub metrics: RiskMetrics,
}

/// One instrument's entry in the ranked portfolio breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentContribution {
    pub contribution: f64,
    pub result: InstrumentResult,
}

/// An instrument that was dropped from the run, with the recorded reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedInstrument {
    pub ticker: String,
    pub reason: String,
}

/// How many instruments raised a given flag code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCount {
    pub code: FlagCode,
    pub count: usize,
}

/// The portfolio-level result of one analysis run.
///
/// Constructed atomically from the complete set of instrument results and
/// never mutated afterwards; a new run produces a new result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioResult {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub health_score: u8,
    pub verdict: HealthBand,
    pub breakdown: Vec<InstrumentContribution>,
    pub aggregate_flags: Vec<FlagCount>,
    pub excluded: Vec<ExcludedInstrument>,
}
