use crate::error::RiskError;
use configuration::{IndicatorParams, RiskParams};
use core_types::{FeatureVector, FlagCode, RiskFlag, StateLabel};
use indicators::{PRICE, ma_name, volatility_name};
use serde::{Deserialize, Serialize};

/// The condition under which a flag rule fires.
///
/// Like the explanation rules, triggers are plain data so the full rule set
/// can be enumerated and audited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    /// Fires when the model's confidence is below the threshold.
    ConfidenceBelow { threshold: f64 },
    /// Fires when a named feature exceeds the threshold.
    FeatureAbove { feature: String, threshold: f64 },
    /// Fires when the predicted state disagrees with the simple
    /// price-vs-moving-average heuristic: Bullish while price sits below the
    /// average, or Bearish while price sits above it.
    StateContradictsTrend { price: String, average: String },
}

/// One entry of the risk rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRule {
    pub code: FlagCode,
    pub severity: core_types::Severity,
    pub trigger: Trigger,
}

impl FlagRule {
    fn matches(&self, features: &FeatureVector, state: StateLabel, confidence: f64) -> bool {
        match &self.trigger {
            Trigger::ConfidenceBelow { threshold } => confidence < *threshold,
            Trigger::FeatureAbove { feature, threshold } => features
                .finite(feature)
                .is_some_and(|value| value > *threshold),
            Trigger::StateContradictsTrend { price, average } => {
                let (Some(price), Some(average)) =
                    (features.finite(price), features.finite(average))
                else {
                    // With the trend unavailable there is no divergence to report.
                    return false;
                };
                match state {
                    StateLabel::Bullish => price < average,
                    StateLabel::Bearish => price > average,
                    StateLabel::Sideways => false,
                }
            }
        }
    }
}

/// Evaluates the full flag rule table against each prediction.
#[derive(Debug, Clone)]
pub struct RiskDetector {
    rules: Vec<FlagRule>,
}

impl RiskDetector {
    /// Builds the default rule table from configuration.
    ///
    /// Thresholds are re-checked here so a detector constructed from a
    /// hand-built config fails just as fast as one from `load_config`.
    pub fn new(risk: &RiskParams, indicators: &IndicatorParams) -> Result<Self, RiskError> {
        if !(risk.confidence_threshold > 0.0 && risk.confidence_threshold < 1.0) {
            return Err(RiskError::InvalidParameters(
                "confidence_threshold must be between 0 and 1".to_string(),
            ));
        }
        if risk.volatility_threshold <= 0.0 {
            return Err(RiskError::InvalidParameters(
                "volatility_threshold must be greater than 0".to_string(),
            ));
        }

        let rules = vec![
            FlagRule {
                code: FlagCode::LowConfidence,
                severity: risk.severities.low_confidence,
                trigger: Trigger::ConfidenceBelow {
                    threshold: risk.confidence_threshold,
                },
            },
            FlagRule {
                code: FlagCode::HighVolatility,
                severity: risk.severities.high_volatility,
                trigger: Trigger::FeatureAbove {
                    feature: volatility_name(indicators.volatility_window),
                    threshold: risk.volatility_threshold,
                },
            },
            FlagRule {
                code: FlagCode::IndicatorDivergence,
                severity: risk.severities.indicator_divergence,
                trigger: Trigger::StateContradictsTrend {
                    price: PRICE.to_string(),
                    average: ma_name(indicators.ma_window),
                },
            },
        ];

        Ok(Self { rules })
    }

    /// Returns every flag whose rule matches. All rules are always evaluated;
    /// a prediction may carry zero, one, or many flags.
    pub fn detect(
        &self,
        features: &FeatureVector,
        state: StateLabel,
        confidence: f64,
    ) -> Vec<RiskFlag> {
        let flags: Vec<RiskFlag> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(features, state, confidence))
            .map(|rule| RiskFlag {
                code: rule.code,
                severity: rule.severity,
            })
            .collect();

        if !flags.is_empty() {
            tracing::debug!(state = %state, flags = flags.len(), "risk flags raised");
        }
        flags
    }

    pub fn rules(&self) -> &[FlagRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::{FeatureValue, Severity};

    fn detector() -> RiskDetector {
        RiskDetector::new(&RiskParams::default(), &IndicatorParams::default()).unwrap()
    }

    fn features(entries: &[(&str, f64)]) -> FeatureVector {
        let mut fv = FeatureVector::new(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        for (name, value) in entries {
            fv.insert(*name, FeatureValue::Finite(*value));
        }
        fv
    }

    #[test]
    fn clean_prediction_raises_no_flags() {
        let fv = features(&[("price", 110.0), ("ma20", 100.0), ("volatility20", 0.2)]);
        assert!(detector().detect(&fv, StateLabel::Bullish, 0.9).is_empty());
    }

    #[test]
    fn low_confidence_is_flagged() {
        let fv = features(&[("price", 110.0), ("ma20", 100.0), ("volatility20", 0.2)]);
        let flags = detector().detect(&fv, StateLabel::Bullish, 0.4);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].code, FlagCode::LowConfidence);
        assert_eq!(flags[0].severity, Severity::Warning);
    }

    #[test]
    fn divergence_fires_when_state_contradicts_trend() {
        let below_ma = features(&[("price", 90.0), ("ma20", 100.0), ("volatility20", 0.2)]);
        let flags = detector().detect(&below_ma, StateLabel::Bullish, 0.9);
        assert_eq!(flags, vec![RiskFlag {
            code: FlagCode::IndicatorDivergence,
            severity: Severity::Critical,
        }]);

        let above_ma = features(&[("price", 110.0), ("ma20", 100.0), ("volatility20", 0.2)]);
        let flags = detector().detect(&above_ma, StateLabel::Bearish, 0.9);
        assert_eq!(flags[0].code, FlagCode::IndicatorDivergence);

        // A sideways call never diverges from the trend heuristic.
        assert!(detector().detect(&below_ma, StateLabel::Sideways, 0.9).is_empty());
    }

    #[test]
    fn all_rules_are_evaluated_without_short_circuit() {
        // Low confidence AND high volatility AND divergence at once.
        let fv = features(&[("price", 90.0), ("ma20", 100.0), ("volatility20", 0.8)]);
        let flags = detector().detect(&fv, StateLabel::Bullish, 0.3);

        let codes: Vec<FlagCode> = flags.iter().map(|f| f.code).collect();
        assert_eq!(
            codes,
            vec![
                FlagCode::LowConfidence,
                FlagCode::HighVolatility,
                FlagCode::IndicatorDivergence
            ]
        );
    }

    #[test]
    fn missing_features_do_not_raise_feature_flags() {
        let fv = features(&[("price", 90.0)]);
        let flags = detector().detect(&fv, StateLabel::Bullish, 0.9);
        assert!(flags.is_empty());
    }

    #[test]
    fn severities_follow_configuration() {
        let mut params = RiskParams::default();
        params.severities.low_confidence = Severity::Critical;
        let detector = RiskDetector::new(&params, &IndicatorParams::default()).unwrap();

        let fv = features(&[("price", 110.0), ("ma20", 100.0)]);
        let flags = detector.detect(&fv, StateLabel::Bullish, 0.1);
        assert_eq!(flags[0].severity, Severity::Critical);
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let mut params = RiskParams::default();
        params.confidence_threshold = 0.0;
        assert!(RiskDetector::new(&params, &IndicatorParams::default()).is_err());

        let mut params = RiskParams::default();
        params.volatility_threshold = -1.0;
        assert!(RiskDetector::new(&params, &IndicatorParams::default()).is_err());
    }
}
