use crate::error::InstrumentError;
use classifier::{Dataset, build_dataset, train_on_dataset};
use configuration::Config;
use core_types::{FeatureValue, FeatureVector, PriceSeries, StateLabel};
use serde::Serialize;

/// Forward-return horizons evaluated per predicted state, in bars.
const HORIZONS: [usize; 3] = [5, 10, 20];

/// Average realized forward returns for one predicted state.
#[derive(Debug, Clone, Serialize)]
pub struct StateReturns {
    pub state: StateLabel,
    /// How many walked bars the model assigned to this state.
    pub samples: usize,
    pub mean_return_5d: Option<f64>,
    pub mean_return_10d: Option<f64>,
    pub mean_return_20d: Option<f64>,
}

/// The walk-forward evaluation of one instrument's model.
#[derive(Debug, Clone, Serialize)]
pub struct RegimeBacktest {
    pub ticker: String,
    pub training_samples: usize,
    pub evaluated: usize,
    /// One entry per state, in `StateLabel::ALL` order.
    pub per_state: Vec<StateReturns>,
}

/// Trains on the chronological head of the history and walks the held-out
/// tail, bucketing realized forward returns by the state predicted for each
/// bar. Predictions only ever see features built from past bars; the realized
/// returns are what actually happened afterwards.
pub fn run_backtest(series: &PriceSeries, config: &Config) -> Result<RegimeBacktest, InstrumentError> {
    let dataset = build_dataset(series, &config.indicators, &config.labeling)?;

    let holdout = ((dataset.len() as f64) * config.classifier.validation_fraction) as usize;
    let train_len = dataset.len().saturating_sub(holdout);

    let head = Dataset {
        feature_names: dataset.feature_names.clone(),
        rows: dataset.rows[..train_len].to_vec(),
        labels: dataset.labels[..train_len].to_vec(),
        dates: dataset.dates[..train_len].to_vec(),
    };
    let model = train_on_dataset(series.ticker(), head, &config.classifier)?;

    // Realized forward returns need the raw closes.
    let mut closes = Vec::with_capacity(series.len());
    for bar in series.bars() {
        closes.push(bar.close_f64()?);
    }

    let mut sums = [[0.0f64; HORIZONS.len()]; StateLabel::ALL.len()];
    let mut counts = [[0usize; HORIZONS.len()]; StateLabel::ALL.len()];
    let mut samples = [0usize; StateLabel::ALL.len()];

    for walk_index in train_len..dataset.len() {
        let date = dataset.dates[walk_index];
        let mut features = FeatureVector::new(date);
        for (name, value) in dataset
            .feature_names
            .iter()
            .zip(&dataset.rows[walk_index])
        {
            features.insert(name.clone(), FeatureValue::Finite(*value));
        }

        let prediction = model.predict(&features)?;
        let state_slot = StateLabel::ALL
            .iter()
            .position(|s| *s == prediction.state)
            .unwrap_or(0);
        samples[state_slot] += 1;

        let Some(series_index) = series.index_of(date) else {
            continue;
        };
        for (horizon_slot, horizon) in HORIZONS.iter().enumerate() {
            let future = series_index + horizon;
            if future < closes.len() {
                let forward_return = closes[future] / closes[series_index] - 1.0;
                sums[state_slot][horizon_slot] += forward_return;
                counts[state_slot][horizon_slot] += 1;
            }
        }
    }

    let per_state = StateLabel::ALL
        .iter()
        .enumerate()
        .map(|(slot, state)| {
            let mean = |h: usize| {
                (counts[slot][h] > 0).then(|| sums[slot][h] / counts[slot][h] as f64)
            };
            StateReturns {
                state: *state,
                samples: samples[slot],
                mean_return_5d: mean(0),
                mean_return_10d: mean(1),
                mean_return_20d: mean(2),
            }
        })
        .collect();

    let evaluated = dataset.len() - train_len;
    tracing::info!(
        ticker = series.ticker(),
        training_samples = train_len,
        evaluated,
        "regime backtest complete"
    );

    Ok(RegimeBacktest {
        ticker: series.ticker().to_string(),
        training_samples: train_len,
        evaluated,
        per_state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use configuration::{DataParams, Portfolio};
    use core_types::PriceBar;
    use rust_decimal::Decimal;

    fn series_from_closes(ticker: &str, closes: &[f64]) -> PriceSeries {
        let bars: Vec<PriceBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let close = Decimal::try_from(close).unwrap();
                PriceBar {
                    date: NaiveDate::from_ymd_opt(2022, 1, 3)
                        .unwrap()
                        .checked_add_days(chrono::Days::new(i as u64))
                        .unwrap(),
                    open: close,
                    high: close * Decimal::try_from(1.01).unwrap(),
                    low: close * Decimal::try_from(0.99).unwrap(),
                    close,
                    volume: Decimal::from(10_000 + (i as i64 % 9) * 500),
                }
            })
            .collect();
        PriceSeries::new(ticker, bars).unwrap()
    }

    fn regime_closes(segments: usize, segment_len: usize) -> Vec<f64> {
        let mut closes = Vec::new();
        let mut price = 100.0f64;
        for segment in 0..segments {
            let up = segment % 2 == 0;
            for step in 0..segment_len {
                let drift = match (up, step % 2 == 0) {
                    (true, true) => 1.015,
                    (true, false) => 0.997,
                    (false, true) => 0.985,
                    (false, false) => 1.003,
                };
                price *= drift;
                closes.push(price);
            }
        }
        closes
    }

    fn config() -> Config {
        Config {
            portfolio: Portfolio {
                tickers: vec!["WALK".to_string()],
            },
            indicators: Default::default(),
            labeling: Default::default(),
            classifier: Default::default(),
            risk: Default::default(),
            scoring: Default::default(),
            engine: Default::default(),
            data: DataParams::default(),
        }
    }

    #[test]
    fn walk_forward_covers_the_held_out_tail() {
        let series = series_from_closes("WALK", &regime_closes(8, 30));
        let result = run_backtest(&series, &config()).unwrap();

        assert_eq!(result.ticker, "WALK");
        assert!(result.evaluated > 0);
        assert!(result.training_samples > result.evaluated);
        assert_eq!(result.per_state.len(), 3);

        let bucketed: usize = result.per_state.iter().map(|s| s.samples).sum();
        assert_eq!(bucketed, result.evaluated);

        for state in &result.per_state {
            for mean in [
                state.mean_return_5d,
                state.mean_return_10d,
                state.mean_return_20d,
            ] {
                if let Some(mean) = mean {
                    assert!(mean.is_finite());
                }
            }
        }
    }

    #[test]
    fn short_histories_cannot_be_backtested() {
        let series = series_from_closes("TINY", &regime_closes(1, 40));
        let err = run_backtest(&series, &config()).unwrap_err();
        assert!(matches!(err, InstrumentError::Classifier(_)));
    }
}
