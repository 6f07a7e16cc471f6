use crate::error::AnalyticsError;
use configuration::ScoringParams;
use core_types::{PriceSeries, RiskMetrics};

/// Trading days per year, used to annualize daily statistics.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Derives descriptive risk statistics from an instrument's full history.
///
/// These are reporting metrics, not model features: CAGR, annualized
/// volatility, Sharpe ratio against the configured risk-free rate, and the
/// maximum peak-to-trough drawdown.
pub fn risk_metrics(
    series: &PriceSeries,
    params: &ScoringParams,
) -> Result<RiskMetrics, AnalyticsError> {
    let mut closes = Vec::with_capacity(series.len());
    for bar in series.bars() {
        closes.push(bar.close_f64()?);
    }

    let returns: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect();

    // --- CAGR ---
    // Undefined for histories shorter than a year; annualizing a few weeks
    // of drift produces nonsense numbers.
    let cagr = match (series.bars().first(), series.bars().last()) {
        (Some(first), Some(last)) => {
            let days = (last.date - first.date).num_days();
            if days >= 365 {
                let years = days as f64 / 365.25;
                Some((closes[closes.len() - 1] / closes[0]).powf(1.0 / years) - 1.0)
            } else {
                None
            }
        }
        _ => None,
    };

    // --- Annualized volatility and Sharpe ---
    let (annualized_volatility, sharpe_ratio) = if returns.len() < 2 {
        (None, None)
    } else {
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns
            .iter()
            .map(|r| (r - mean) * (r - mean))
            .sum::<f64>()
            / (returns.len() as f64 - 1.0);
        let std_dev = variance.sqrt();
        let volatility = std_dev * TRADING_DAYS_PER_YEAR.sqrt();

        let sharpe = if std_dev > 0.0 {
            let annual_excess = mean * TRADING_DAYS_PER_YEAR - params.risk_free_rate;
            Some(annual_excess / volatility)
        } else {
            None
        };
        (Some(volatility), sharpe)
    };

    // --- Maximum drawdown ---
    let mut peak = f64::MIN;
    let mut max_drawdown = 0.0f64;
    for &close in &closes {
        if close > peak {
            peak = close;
        }
        let drawdown = (close - peak) / peak;
        if drawdown < max_drawdown {
            max_drawdown = drawdown;
        }
    }

    Ok(RiskMetrics {
        cagr,
        annualized_volatility,
        sharpe_ratio,
        max_drawdown_pct: max_drawdown * 100.0,
    })
}
