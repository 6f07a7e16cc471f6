use crate::error::ClassifierError;
use configuration::LabelingParams;
use core_types::{PriceSeries, StateLabel};

/// Derives a ground-truth state label for every bar in the series.
///
/// Each bar is labeled by "looking forward" `horizon` bars and taking the
/// sign of the realized return against the configured threshold:
///
/// - forward return > `threshold`  -> `Bullish`
/// - forward return < `-threshold` -> `Bearish`
/// - anything in between           -> `Sideways`
///
/// Bars whose horizon runs past the end of the series get `None`; they carry
/// no usable label and are dropped during dataset assembly rather than being
/// guessed.
pub fn label_series(
    series: &PriceSeries,
    params: &LabelingParams,
) -> Result<Vec<Option<StateLabel>>, ClassifierError> {
    let bars = series.bars();
    let mut labels = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let future_index = i + params.horizon;
        if future_index >= bars.len() {
            labels.push(None);
            continue;
        }

        let entry = bar.close_f64()?;
        let exit = bars[future_index].close_f64()?;
        let forward_return = exit / entry - 1.0;

        let label = if forward_return > params.threshold {
            StateLabel::Bullish
        } else if forward_return < -params.threshold {
            StateLabel::Bearish
        } else {
            StateLabel::Sideways
        };
        labels.push(Some(label));
    }

    Ok(labels)
}
