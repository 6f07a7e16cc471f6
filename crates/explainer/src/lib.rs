//! # Explanation Generator
//!
//! Derives the short, human-readable reasons attached to each prediction.
//!
//! The generator is a fixed, ordered rule table walked top to bottom: every
//! rule whose condition holds contributes one rendered string, so the same
//! (features, state, confidence) always yields the same list in the same
//! order. Each string embeds the actual numeric values it was derived from
//! and maps back to exactly one rule, which keeps the output auditable. The
//! classifier is never re-invoked here.

pub mod rules;

pub use rules::{Condition, ExplanationRule, default_rules};

use core_types::{FeatureVector, StateLabel};

/// Renders every matching rule of `table`, in table order.
pub fn explain(
    features: &FeatureVector,
    state: StateLabel,
    confidence: f64,
    table: &[ExplanationRule],
) -> Vec<String> {
    let mut reasons = Vec::new();
    for rule in table {
        if let Some(gate) = rule.state_gate {
            if gate != state {
                continue;
            }
        }
        if let Some(rendered) = rule.render(features, confidence) {
            reasons.push(rendered);
        }
    }
    tracing::debug!(
        state = %state,
        reasons = reasons.len(),
        "generated explanations"
    );
    reasons
}
