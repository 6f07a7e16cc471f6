use crate::error::ClassifierError;
use crate::labeling::label_series;
use chrono::NaiveDate;
use configuration::{IndicatorParams, LabelingParams};
use core_types::PriceSeries;
use indicators::{FeatureFrame, feature_names};

/// A feature/label training set for one instrument, in chronological order.
///
/// `rows[i]` holds the feature values for `dates[i]` in `feature_names`
/// order, and `labels[i]` is the class code of the forward-return label for
/// that date.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<i32>,
    pub dates: Vec<NaiveDate>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Assembles the training set for a series.
///
/// A bar becomes a sample only when both sides of it are usable: every
/// feature in its trailing windows is finite (enough history behind it) and
/// a forward-return label exists (enough history ahead of it). Features only
/// ever read bars at or before the sample date; labels only ever read bars
/// after it.
pub fn build_dataset(
    series: &PriceSeries,
    indicator_params: &IndicatorParams,
    labeling_params: &LabelingParams,
) -> Result<Dataset, ClassifierError> {
    let names = feature_names(indicator_params);
    let frame = FeatureFrame::new(series)?;
    let labels = label_series(series, labeling_params)?;

    let mut rows = Vec::new();
    let mut codes = Vec::new();
    let mut dates = Vec::new();

    for (index, label) in labels.iter().enumerate() {
        let Some(label) = label else { continue };

        let fv = frame.features_at(index, indicator_params);
        if !fv.is_complete() {
            continue;
        }

        let mut row = Vec::with_capacity(names.len());
        for name in &names {
            let value = fv
                .finite(name)
                .ok_or_else(|| ClassifierError::InsufficientData(name.clone()))?;
            row.push(value);
        }

        rows.push(row);
        codes.push(label.code());
        dates.push(fv.date());
    }

    tracing::debug!(
        ticker = series.ticker(),
        samples = rows.len(),
        total_bars = series.len(),
        "assembled training dataset"
    );

    Ok(Dataset {
        feature_names: names,
        rows,
        labels: codes,
        dates,
    })
}
