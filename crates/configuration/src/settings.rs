use crate::error::ConfigError;
use core_types::Severity;
use serde::Deserialize;

/// The root configuration structure for the entire application.
///
/// Every section carries `#[serde(default)]` so a partial `config.toml` works
/// out of the box; the documented defaults live in the `Default` impls below.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub portfolio: Portfolio,
    #[serde(default)]
    pub indicators: IndicatorParams,
    #[serde(default)]
    pub labeling: LabelingParams,
    #[serde(default)]
    pub classifier: ClassifierParams,
    #[serde(default)]
    pub risk: RiskParams,
    #[serde(default)]
    pub scoring: ScoringParams,
    #[serde(default)]
    pub engine: EngineParams,
    #[serde(default)]
    pub data: DataParams,
}

/// The set of instruments analyzed in a run.
#[derive(Debug, Clone, Deserialize)]
pub struct Portfolio {
    pub tickers: Vec<String>,
}

/// Trailing-window lengths for the indicator engine.
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorParams {
    /// Moving average window, in bars.
    pub ma_window: usize,
    /// RSI window, in bars (Wilder smoothing needs rsi_window + 1 bars).
    pub rsi_window: usize,
    /// Window for the realized-volatility feature, in bars.
    pub volatility_window: usize,
    /// Window for the volume z-score feature, in bars.
    pub volume_window: usize,
}

/// The ground-truth labeling rule used to build training sets.
///
/// A bar is labeled by the sign of the forward return over `horizon` bars:
/// above `threshold` is Bullish, below `-threshold` is Bearish, anything in
/// between is Sideways.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelingParams {
    pub horizon: usize,
    pub threshold: f64,
}

/// Training parameters for the market state classifier.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierParams {
    /// Minimum number of labeled samples required to train at all.
    pub min_training_samples: usize,
    /// Fraction of the (chronologically last) samples held out for validation.
    pub validation_fraction: f64,
    /// Number of independently seeded forests voting on each prediction.
    pub committee_size: usize,
    /// Trees per forest.
    pub n_trees: u16,
    /// Maximum tree depth.
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    /// Base seed; committee member `i` trains with `seed_base + i`.
    pub seed_base: u64,
}

/// Thresholds and severities for the risk flag detector.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskParams {
    /// Predictions below this confidence raise `low_confidence`.
    pub confidence_threshold: f64,
    /// Annualized volatility above this raises `high_volatility`.
    pub volatility_threshold: f64,
    #[serde(default)]
    pub severities: FlagSeverities,
}

/// Severity assigned to each flag code.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagSeverities {
    pub low_confidence: Severity,
    pub high_volatility: Severity,
    pub indicator_divergence: Severity,
}

/// Parameters for the portfolio aggregator and risk metrics.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringParams {
    /// Annual risk-free rate used by the Sharpe ratio.
    pub risk_free_rate: f64,
    #[serde(default)]
    pub severity_weights: SeverityWeights,
}

/// Score penalty per flag, keyed by severity. Must be non-negative.
#[derive(Debug, Clone, Deserialize)]
pub struct SeverityWeights {
    pub info: f64,
    pub warning: f64,
    pub critical: f64,
}

impl SeverityWeights {
    pub fn weight_for(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Info => self.info,
            Severity::Warning => self.warning,
            Severity::Critical => self.critical,
        }
    }
}

/// Concurrency and I/O bounds for the analysis engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineParams {
    /// Maximum number of instruments processed concurrently. This caps the
    /// number of classifier committees resident in memory at once.
    pub workers: usize,
    /// Timeout applied to each price retrieval call.
    pub retrieval_timeout_secs: u64,
}

/// Filesystem locations used by the collaborators.
#[derive(Debug, Clone, Deserialize)]
pub struct DataParams {
    /// Directory of cached per-ticker price CSVs.
    pub cache_dir: String,
    /// Directory where analysis reports are written.
    pub reports_dir: String,
}

// --- Default Implementations ---
// These are the documented defaults; a user can omit any section except
// [portfolio] from their config.toml.

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_window: 20,
            rsi_window: 14,
            volatility_window: 20,
            volume_window: 20,
        }
    }
}

impl Default for LabelingParams {
    fn default() -> Self {
        Self {
            horizon: 5,
            threshold: 0.015,
        }
    }
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            min_training_samples: 120,
            validation_fraction: 0.25,
            committee_size: 5,
            n_trees: 50,
            max_depth: 5,
            min_samples_leaf: 5,
            min_samples_split: 2,
            seed_base: 42,
        }
    }
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.55,
            volatility_threshold: 0.40,
            severities: FlagSeverities::default(),
        }
    }
}

impl Default for FlagSeverities {
    fn default() -> Self {
        Self {
            low_confidence: Severity::Warning,
            high_volatility: Severity::Warning,
            indicator_divergence: Severity::Critical,
        }
    }
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            severity_weights: SeverityWeights::default(),
        }
    }
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            info: 0.02,
            warning: 0.05,
            critical: 0.10,
        }
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            workers: 4,
            retrieval_timeout_secs: 30,
        }
    }
}

impl Default for DataParams {
    fn default() -> Self {
        Self {
            cache_dir: "data".to_string(),
            reports_dir: "reports".to_string(),
        }
    }
}

impl Config {
    /// Rejects illogical parameter combinations before any instrument is
    /// processed. Called by `load_config`; exposed for programmatic configs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::Validation(msg.to_string()));

        if self.portfolio.tickers.is_empty() {
            return fail("portfolio.tickers must not be empty");
        }
        if self.indicators.ma_window < 2 {
            return fail("indicators.ma_window must be at least 2");
        }
        if self.indicators.rsi_window < 2 {
            return fail("indicators.rsi_window must be at least 2");
        }
        if self.indicators.volatility_window < 2 {
            return fail("indicators.volatility_window must be at least 2");
        }
        if self.indicators.volume_window < 2 {
            return fail("indicators.volume_window must be at least 2");
        }
        if self.labeling.horizon == 0 {
            return fail("labeling.horizon must be positive");
        }
        if self.labeling.threshold <= 0.0 {
            return fail("labeling.threshold must be positive");
        }
        if self.classifier.min_training_samples < 20 {
            return fail("classifier.min_training_samples must be at least 20");
        }
        if !(self.classifier.validation_fraction > 0.0 && self.classifier.validation_fraction < 1.0)
        {
            return fail("classifier.validation_fraction must be in (0, 1)");
        }
        if self.classifier.committee_size == 0 {
            return fail("classifier.committee_size must be positive");
        }
        if self.classifier.n_trees == 0 {
            return fail("classifier.n_trees must be positive");
        }
        if self.classifier.max_depth == 0 {
            return fail("classifier.max_depth must be positive");
        }
        if !(self.risk.confidence_threshold > 0.0 && self.risk.confidence_threshold < 1.0) {
            return fail("risk.confidence_threshold must be in (0, 1)");
        }
        if self.risk.volatility_threshold <= 0.0 {
            return fail("risk.volatility_threshold must be positive");
        }
        let w = &self.scoring.severity_weights;
        if w.info < 0.0 || w.warning < 0.0 || w.critical < 0.0 {
            return fail("scoring.severity_weights must be non-negative");
        }
        if self.engine.workers == 0 {
            return fail("engine.workers must be positive");
        }
        if self.engine.retrieval_timeout_secs == 0 {
            return fail("engine.retrieval_timeout_secs must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            portfolio: Portfolio {
                tickers: vec!["ACME".to_string()],
            },
            indicators: IndicatorParams::default(),
            labeling: LabelingParams::default(),
            classifier: ClassifierParams::default(),
            risk: RiskParams::default(),
            scoring: ScoringParams::default(),
            engine: EngineParams::default(),
            data: DataParams::default(),
        }
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_portfolio_is_rejected() {
        let mut config = base_config();
        config.portfolio.tickers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_windows_are_rejected() {
        let mut config = base_config();
        config.indicators.ma_window = 1;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.indicators.rsi_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let mut config = base_config();
        config.risk.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.classifier.validation_fraction = 0.0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.scoring.severity_weights.critical = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_are_rejected() {
        let mut config = base_config();
        config.engine.workers = 0;
        assert!(config.validate().is_err());
    }
}
