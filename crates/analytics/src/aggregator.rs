use crate::error::AnalyticsError;
use chrono::Utc;
use configuration::ScoringParams;
use core_types::{
    ExcludedInstrument, FlagCount, HealthBand, InstrumentContribution, InstrumentResult,
    PortfolioResult,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A single instrument's normalized contribution to the portfolio score.
///
/// contribution = state_direction * confidence - sum(severity weights of its
/// flags), clamped to [-1, 1]. Bullish counts +1, Sideways 0, Bearish -1.
pub fn instrument_contribution(result: &InstrumentResult, params: &ScoringParams) -> f64 {
    let penalty: f64 = result
        .flags
        .iter()
        .map(|flag| params.severity_weights.weight_for(flag.severity))
        .sum();
    (result.state.direction() * result.confidence - penalty).clamp(-1.0, 1.0)
}

/// Combines a complete set of instrument results into one portfolio result.
///
/// The health score is the mean contribution mapped onto 0-100 through the
/// fixed affine transform `score = (mean + 1) / 2 * 100`, rounded to the
/// nearest integer. The mapping is strictly monotonic and, because the mean
/// is order-free, reordering the inputs cannot change the score. The
/// breakdown is then ranked by contribution (ties by ticker) so the output
/// ordering is deterministic regardless of input ordering.
///
/// An empty result set is an error, never a default score.
pub fn aggregate(
    results: Vec<InstrumentResult>,
    excluded: Vec<ExcludedInstrument>,
    params: &ScoringParams,
) -> Result<PortfolioResult, AnalyticsError> {
    if results.is_empty() {
        return Err(AnalyticsError::EmptyPortfolio);
    }

    let mut breakdown: Vec<InstrumentContribution> = results
        .into_iter()
        .map(|result| InstrumentContribution {
            contribution: instrument_contribution(&result, params),
            result,
        })
        .collect();

    let mean = breakdown
        .iter()
        .map(|entry| entry.contribution)
        .sum::<f64>()
        / breakdown.len() as f64;
    let health_score = ((mean + 1.0) / 2.0 * 100.0).round() as u8;

    breakdown.sort_by(|a, b| {
        b.contribution
            .partial_cmp(&a.contribution)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.result.ticker.cmp(&b.result.ticker))
    });

    let mut flag_counts: BTreeMap<core_types::FlagCode, usize> = BTreeMap::new();
    for entry in &breakdown {
        for flag in &entry.result.flags {
            *flag_counts.entry(flag.code).or_insert(0) += 1;
        }
    }
    let aggregate_flags: Vec<FlagCount> = flag_counts
        .into_iter()
        .map(|(code, count)| FlagCount { code, count })
        .collect();

    tracing::info!(
        health_score,
        instruments = breakdown.len(),
        excluded = excluded.len(),
        "aggregated portfolio result"
    );

    Ok(PortfolioResult {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        health_score,
        verdict: HealthBand::from_score(health_score),
        breakdown,
        aggregate_flags,
        excluded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::{
        FeatureValue, FeatureVector, FlagCode, RiskFlag, RiskMetrics, Severity, StateLabel,
    };

    fn result(ticker: &str, state: StateLabel, confidence: f64, flags: Vec<RiskFlag>) -> InstrumentResult {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let mut features = FeatureVector::new(date);
        features.insert("price", FeatureValue::Finite(100.0));
        InstrumentResult {
            ticker: ticker.to_string(),
            date,
            state,
            confidence,
            features,
            explanations: vec!["price above 20-day moving average".to_string()],
            flags,
            metrics: RiskMetrics {
                cagr: None,
                annualized_volatility: Some(0.2),
                sharpe_ratio: None,
                max_drawdown_pct: -5.0,
            },
        }
    }

    fn low_confidence_flag() -> RiskFlag {
        RiskFlag {
            code: FlagCode::LowConfidence,
            severity: Severity::Warning,
        }
    }

    #[test]
    fn empty_portfolio_is_an_error_not_a_zero_score() {
        let err = aggregate(vec![], vec![], &ScoringParams::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptyPortfolio));
    }

    #[test]
    fn score_is_independent_of_instrument_ordering() {
        let params = ScoringParams::default();
        let a = result("AAA", StateLabel::Bullish, 0.9, vec![]);
        let b = result("BBB", StateLabel::Bearish, 0.4, vec![low_confidence_flag()]);
        let c = result("CCC", StateLabel::Sideways, 0.7, vec![]);

        let forward = aggregate(vec![a.clone(), b.clone(), c.clone()], vec![], &params).unwrap();
        let reversed = aggregate(vec![c, b, a], vec![], &params).unwrap();

        assert_eq!(forward.health_score, reversed.health_score);
        let forward_order: Vec<&str> = forward
            .breakdown
            .iter()
            .map(|e| e.result.ticker.as_str())
            .collect();
        let reversed_order: Vec<&str> = reversed
            .breakdown
            .iter()
            .map(|e| e.result.ticker.as_str())
            .collect();
        assert_eq!(forward_order, reversed_order);
    }

    #[test]
    fn mixed_portfolio_scores_between_the_extremes() {
        let params = ScoringParams::default();
        let strong = result("STRONG", StateLabel::Bullish, 0.9, vec![]);
        let weak = result("WEAK", StateLabel::Bearish, 0.4, vec![low_confidence_flag()]);

        let strong_contribution = instrument_contribution(&strong, &params);
        let weak_contribution = instrument_contribution(&weak, &params);
        assert!((strong_contribution - 0.9).abs() < 1e-9);
        assert!((weak_contribution - (-0.45)).abs() < 1e-9);

        let portfolio = aggregate(vec![strong, weak], vec![], &params).unwrap();

        let high_extreme = ((strong_contribution + 1.0) / 2.0 * 100.0).round() as u8;
        let low_extreme = ((weak_contribution + 1.0) / 2.0 * 100.0).round() as u8;
        assert!(portfolio.health_score > low_extreme);
        assert!(portfolio.health_score < high_extreme);

        // Both instrument results survive in the breakdown with flags intact.
        assert_eq!(portfolio.breakdown.len(), 2);
        let weak_entry = portfolio
            .breakdown
            .iter()
            .find(|e| e.result.ticker == "WEAK")
            .unwrap();
        assert_eq!(weak_entry.result.flags.len(), 1);
        assert_eq!(weak_entry.result.flags[0].code, FlagCode::LowConfidence);
    }

    #[test]
    fn breakdown_is_ranked_by_contribution() {
        let params = ScoringParams::default();
        let portfolio = aggregate(
            vec![
                result("MID", StateLabel::Sideways, 0.8, vec![]),
                result("TOP", StateLabel::Bullish, 0.9, vec![]),
                result("BOTTOM", StateLabel::Bearish, 0.9, vec![]),
            ],
            vec![],
            &params,
        )
        .unwrap();

        let order: Vec<&str> = portfolio
            .breakdown
            .iter()
            .map(|e| e.result.ticker.as_str())
            .collect();
        assert_eq!(order, vec!["TOP", "MID", "BOTTOM"]);
    }

    #[test]
    fn heavy_penalties_clamp_at_the_floor() {
        let mut params = ScoringParams::default();
        params.severity_weights.critical = 0.9;
        let flags = vec![
            RiskFlag {
                code: FlagCode::IndicatorDivergence,
                severity: Severity::Critical,
            },
            RiskFlag {
                code: FlagCode::HighVolatility,
                severity: Severity::Critical,
            },
        ];
        let battered = result("BAD", StateLabel::Bearish, 1.0, flags);
        assert_eq!(instrument_contribution(&battered, &params), -1.0);

        let portfolio = aggregate(vec![battered], vec![], &params).unwrap();
        assert_eq!(portfolio.health_score, 0);
        assert_eq!(portfolio.verdict, HealthBand::Weak);
    }

    #[test]
    fn aggregate_flags_count_occurrences_in_stable_order() {
        let params = ScoringParams::default();
        let divergence = RiskFlag {
            code: FlagCode::IndicatorDivergence,
            severity: Severity::Critical,
        };
        let portfolio = aggregate(
            vec![
                result("A", StateLabel::Bullish, 0.4, vec![low_confidence_flag()]),
                result("B", StateLabel::Bullish, 0.3, vec![low_confidence_flag(), divergence]),
            ],
            vec![],
            &params,
        )
        .unwrap();

        assert_eq!(portfolio.aggregate_flags.len(), 2);
        assert_eq!(portfolio.aggregate_flags[0].code, FlagCode::LowConfidence);
        assert_eq!(portfolio.aggregate_flags[0].count, 2);
        assert_eq!(portfolio.aggregate_flags[1].code, FlagCode::IndicatorDivergence);
        assert_eq!(portfolio.aggregate_flags[1].count, 1);
    }

    #[test]
    fn exclusions_are_carried_into_the_result() {
        let params = ScoringParams::default();
        let portfolio = aggregate(
            vec![result("OK", StateLabel::Bullish, 0.8, vec![])],
            vec![ExcludedInstrument {
                ticker: "GONE".to_string(),
                reason: "insufficient history".to_string(),
            }],
            &params,
        )
        .unwrap();

        assert_eq!(portfolio.excluded.len(), 1);
        assert_eq!(portfolio.excluded[0].ticker, "GONE");
    }
}
