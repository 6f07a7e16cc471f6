use anyhow::{Context, Result};
use core_types::PortfolioResult;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Writes the date-stamped CSV and JSON reports for a run, returning the two
/// paths.
///
/// Field names, column order and key nesting are fixed, so two runs of
/// identical logic over identical data produce diffable output.
pub fn write_reports(result: &PortfolioResult, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create reports directory {dir:?}"))?;

    let date = result.generated_at.format("%Y-%m-%d");
    let csv_path = dir.join(format!("portfolio_report_{date}.csv"));
    let json_path = dir.join(format!("portfolio_report_{date}.json"));

    write_csv(result, &csv_path)?;
    write_json(result, &json_path)?;

    Ok((csv_path, json_path))
}

/// One row per instrument, columns in a fixed order.
fn write_csv(result: &PortfolioResult, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {path:?}"))?;

    writer.write_record([
        "ticker",
        "date",
        "state",
        "confidence",
        "contribution",
        "cagr",
        "annualized_volatility",
        "sharpe_ratio",
        "max_drawdown_pct",
        "flags",
        "explanations",
    ])?;

    for entry in &result.breakdown {
        let r = &entry.result;
        let flags = r
            .flags
            .iter()
            .map(|f| f.code.as_str())
            .collect::<Vec<_>>()
            .join(";");
        writer.write_record([
            r.ticker.clone(),
            r.date.to_string(),
            r.state.to_string(),
            format!("{:.2}", r.confidence),
            format!("{:.4}", entry.contribution),
            optional(r.metrics.cagr),
            optional(r.metrics.annualized_volatility),
            optional(r.metrics.sharpe_ratio),
            format!("{:.2}", r.metrics.max_drawdown_pct),
            flags,
            r.explanations.join(" | "),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

/// A summary object plus the full per-instrument breakdown.
fn write_json(result: &PortfolioResult, path: &Path) -> Result<()> {
    let document = serde_json::json!({
        "summary": {
            "run_id": result.run_id,
            "generated_at": result.generated_at,
            "health_score": result.health_score,
            "verdict": result.verdict,
            "instrument_count": result.breakdown.len(),
            "aggregate_flags": result.aggregate_flags,
            "excluded": result.excluded,
        },
        "instruments": result.breakdown,
    });

    let file = File::create(path).with_context(|| format!("Failed to create {path:?}"))?;
    serde_json::to_writer_pretty(file, &document)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use core_types::{
        FeatureValue, FeatureVector, FlagCode, HealthBand, InstrumentContribution,
        InstrumentResult, PortfolioResult, RiskFlag, RiskMetrics, Severity, StateLabel,
    };
    use uuid::Uuid;

    fn sample_result() -> PortfolioResult {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let mut features = FeatureVector::new(date);
        features.insert("price", FeatureValue::Finite(130.0));
        features.insert("ma20", FeatureValue::Finite(121.5));

        PortfolioResult {
            run_id: Uuid::nil(),
            generated_at: Utc.with_ymd_and_hms(2024, 6, 3, 18, 0, 0).unwrap(),
            health_score: 61,
            verdict: HealthBand::Moderate,
            breakdown: vec![InstrumentContribution {
                contribution: 0.9,
                result: InstrumentResult {
                    ticker: "ACME".to_string(),
                    date,
                    state: StateLabel::Bullish,
                    confidence: 0.9,
                    features,
                    explanations: vec![
                        "RSI 72 indicates overbought conditions".to_string(),
                        "price 130.00 above 20-day moving average".to_string(),
                    ],
                    flags: vec![RiskFlag {
                        code: FlagCode::HighVolatility,
                        severity: Severity::Warning,
                    }],
                    metrics: RiskMetrics {
                        cagr: Some(0.12),
                        annualized_volatility: Some(0.3),
                        sharpe_ratio: None,
                        max_drawdown_pct: -12.5,
                    },
                },
            }],
            aggregate_flags: vec![],
            excluded: vec![],
        }
    }

    #[test]
    fn reports_are_byte_stable_across_identical_runs() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result();

        let (csv_a, json_a) = write_reports(&result, dir.path()).unwrap();
        let csv_first = std::fs::read(&csv_a).unwrap();
        let json_first = std::fs::read(&json_a).unwrap();

        let (csv_b, json_b) = write_reports(&result, dir.path()).unwrap();
        assert_eq!(std::fs::read(&csv_b).unwrap(), csv_first);
        assert_eq!(std::fs::read(&json_b).unwrap(), json_first);
    }

    #[test]
    fn csv_rows_carry_flags_and_explanations() {
        let dir = tempfile::tempdir().unwrap();
        let (csv_path, _) = write_reports(&sample_result(), dir.path()).unwrap();
        let body = std::fs::read_to_string(csv_path).unwrap();

        assert!(body.starts_with("ticker,date,state,confidence,contribution"));
        assert!(body.contains("ACME"));
        assert!(body.contains("high_volatility"));
        assert!(body.contains("RSI 72 indicates overbought conditions | price 130.00 above"));
        // A missing Sharpe ratio is an empty cell, not a placeholder number.
        assert!(body.contains(",,-12.50,"));
    }

    #[test]
    fn json_report_nests_summary_and_instruments() {
        let dir = tempfile::tempdir().unwrap();
        let (_, json_path) = write_reports(&sample_result(), dir.path()).unwrap();
        let document: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap();

        assert_eq!(document["summary"]["health_score"], 61);
        assert_eq!(document["summary"]["instrument_count"], 1);
        assert_eq!(document["instruments"][0]["result"]["ticker"], "ACME");
        assert_eq!(
            document["instruments"][0]["result"]["flags"][0]["code"],
            "high_volatility"
        );
    }
}
