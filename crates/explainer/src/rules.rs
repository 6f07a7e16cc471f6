use configuration::{IndicatorParams, RiskParams};
use core_types::{FeatureVector, StateLabel};
use indicators::{PRICE, ma_name, rsi_name, volatility_name, volume_z_name};
use serde::{Deserialize, Serialize};

/// A single comparison over the feature vector or the classifier output.
///
/// Conditions are plain data so the whole rule table can be enumerated,
/// serialized and audited; there is no conditional logic outside this enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// `feature >= threshold`
    FeatureAtLeast { feature: String, threshold: f64 },
    /// `feature <= threshold`
    FeatureAtMost { feature: String, threshold: f64 },
    /// `low <= feature < high`
    FeatureBetween { feature: String, low: f64, high: f64 },
    /// `feature > reference` (both must be present and finite)
    FeatureAboveFeature { feature: String, reference: String },
    /// `feature < reference`
    FeatureBelowFeature { feature: String, reference: String },
    /// `confidence >= threshold`
    ConfidenceAtLeast { threshold: f64 },
    /// `confidence < threshold`
    ConfidenceBelow { threshold: f64 },
}

impl Condition {
    /// Evaluates the condition, returning the primary numeric value the
    /// rendered message refers to. A feature that is absent or still marked
    /// insufficient-history never matches; a reason is never fabricated from
    /// a value that does not exist.
    fn evaluate(&self, features: &FeatureVector, confidence: f64) -> Option<f64> {
        match self {
            Condition::FeatureAtLeast { feature, threshold } => {
                features.finite(feature).filter(|v| v >= threshold)
            }
            Condition::FeatureAtMost { feature, threshold } => {
                features.finite(feature).filter(|v| v <= threshold)
            }
            Condition::FeatureBetween { feature, low, high } => {
                features.finite(feature).filter(|v| v >= low && v < high)
            }
            Condition::FeatureAboveFeature { feature, reference } => {
                let value = features.finite(feature)?;
                let reference = features.finite(reference)?;
                (value > reference).then_some(value)
            }
            Condition::FeatureBelowFeature { feature, reference } => {
                let value = features.finite(feature)?;
                let reference = features.finite(reference)?;
                (value < reference).then_some(value)
            }
            Condition::ConfidenceAtLeast { threshold } => {
                (confidence >= *threshold).then_some(confidence)
            }
            Condition::ConfidenceBelow { threshold } => {
                (confidence < *threshold).then_some(confidence)
            }
        }
    }
}

/// One entry of the explanation rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationRule {
    /// Stable identifier, used for auditing which rule produced a string.
    pub id: String,
    /// When set, the rule only applies to predictions of this state.
    pub state_gate: Option<StateLabel>,
    pub condition: Condition,
    /// Message template. Supported placeholders: `{value:.0}`, `{value:.1}`,
    /// `{value:.2}` (the condition's primary value) and
    /// `{confidence_pct:.0}` (confidence scaled to percent).
    pub template: String,
}

impl ExplanationRule {
    /// Renders the rule against the inputs, or `None` if it does not match.
    pub fn render(&self, features: &FeatureVector, confidence: f64) -> Option<String> {
        let value = self.condition.evaluate(features, confidence)?;
        let mut message = self.template.clone();
        message = message.replace("{value:.0}", &format!("{value:.0}"));
        message = message.replace("{value:.1}", &format!("{value:.1}"));
        message = message.replace("{value:.2}", &format!("{value:.2}"));
        message = message.replace("{confidence_pct:.0}", &format!("{:.0}", confidence * 100.0));
        Some(message)
    }
}

/// Builds the default rule table from the configured windows and thresholds.
///
/// Table order is rendering order. RSI bands are disjoint, so at most one of
/// the four RSI rules fires for a given vector.
pub fn default_rules(indicators: &IndicatorParams, risk: &RiskParams) -> Vec<ExplanationRule> {
    let rsi = rsi_name(indicators.rsi_window);
    let ma = ma_name(indicators.ma_window);
    let volatility = volatility_name(indicators.volatility_window);
    let volume_z = volume_z_name(indicators.volume_window);

    vec![
        ExplanationRule {
            id: "rsi_overbought".to_string(),
            state_gate: None,
            condition: Condition::FeatureAtLeast {
                feature: rsi.clone(),
                threshold: 70.0,
            },
            template: "RSI {value:.0} indicates overbought conditions".to_string(),
        },
        ExplanationRule {
            id: "rsi_momentum".to_string(),
            state_gate: None,
            condition: Condition::FeatureBetween {
                feature: rsi.clone(),
                low: 55.0,
                high: 70.0,
            },
            template: "RSI {value:.0} shows momentum strength".to_string(),
        },
        ExplanationRule {
            id: "rsi_fading".to_string(),
            state_gate: None,
            condition: Condition::FeatureBetween {
                feature: rsi.clone(),
                low: 30.0,
                high: 45.0,
            },
            template: "RSI {value:.0} shows fading momentum".to_string(),
        },
        ExplanationRule {
            id: "rsi_oversold".to_string(),
            state_gate: None,
            condition: Condition::FeatureAtMost {
                feature: rsi,
                threshold: 30.0,
            },
            template: "RSI {value:.0} indicates oversold conditions".to_string(),
        },
        ExplanationRule {
            id: "price_above_ma".to_string(),
            state_gate: None,
            condition: Condition::FeatureAboveFeature {
                feature: PRICE.to_string(),
                reference: ma.clone(),
            },
            template: format!(
                "price {{value:.2}} above {}-day moving average",
                indicators.ma_window
            ),
        },
        ExplanationRule {
            id: "price_below_ma".to_string(),
            state_gate: None,
            condition: Condition::FeatureBelowFeature {
                feature: PRICE.to_string(),
                reference: ma,
            },
            template: format!(
                "price {{value:.2}} below {}-day moving average",
                indicators.ma_window
            ),
        },
        ExplanationRule {
            id: "volatility_elevated".to_string(),
            state_gate: None,
            condition: Condition::FeatureAtLeast {
                feature: volatility,
                threshold: risk.volatility_threshold,
            },
            template: "annualized volatility {value:.2} is elevated".to_string(),
        },
        ExplanationRule {
            id: "volume_spike".to_string(),
            state_gate: None,
            condition: Condition::FeatureAtLeast {
                feature: volume_z,
                threshold: 2.0,
            },
            template: "volume {value:.1} standard deviations above its recent average"
                .to_string(),
        },
        ExplanationRule {
            id: "confidence_strong".to_string(),
            state_gate: None,
            condition: Condition::ConfidenceAtLeast { threshold: 0.8 },
            template: "model confidence {confidence_pct:.0}% is strong".to_string(),
        },
        ExplanationRule {
            id: "confidence_weak".to_string(),
            state_gate: None,
            condition: Condition::ConfidenceBelow {
                threshold: risk.confidence_threshold,
            },
            template: "model confidence {confidence_pct:.0}% is weak".to_string(),
        },
    ]
}
