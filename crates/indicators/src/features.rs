use crate::error::IndicatorError;
use chrono::NaiveDate;
use configuration::IndicatorParams;
use core_types::{FeatureValue, FeatureVector, PriceSeries};

/// Feature name for the raw closing price.
pub const PRICE: &str = "price";
/// Feature name for the one-bar close-to-close return.
pub const RETURN_1D: &str = "return_1d";

/// Trading days per year, used to annualize daily volatility.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub fn ma_name(window: usize) -> String {
    format!("ma{window}")
}

pub fn rsi_name(window: usize) -> String {
    format!("rsi{window}")
}

pub fn volatility_name(window: usize) -> String {
    format!("volatility{window}")
}

pub fn volume_z_name(window: usize) -> String {
    format!("volume_z{window}")
}

/// The full feature vocabulary for a parameter set, in deterministic
/// (alphabetical) order. The classifier stores this order in its artifact and
/// rebuilds model input rows from it.
pub fn feature_names(params: &IndicatorParams) -> Vec<String> {
    let mut names = vec![
        PRICE.to_string(),
        RETURN_1D.to_string(),
        ma_name(params.ma_window),
        rsi_name(params.rsi_window),
        volatility_name(params.volatility_window),
        volume_z_name(params.volume_window),
    ];
    names.sort();
    names
}

/// Computes the feature vector for one instrument at one date.
///
/// Only bars at or before `date` are read. Fails if `date` is not a trading
/// day present in the series.
pub fn compute_features(
    series: &PriceSeries,
    date: NaiveDate,
    params: &IndicatorParams,
) -> Result<FeatureVector, IndicatorError> {
    let frame = FeatureFrame::new(series)?;
    frame.features_at_date(date, params)
}

/// A reusable f64 view over a price series.
///
/// Converting `Decimal` bars once and indexing into the slices keeps the
/// per-date feature computation cheap when the classifier walks the whole
/// history. The precision downgrade to `f64` at this boundary is the accepted
/// trade-off for the feature math.
pub struct FeatureFrame<'a> {
    series: &'a PriceSeries,
    closes: Vec<f64>,
    volumes: Vec<f64>,
}

impl<'a> FeatureFrame<'a> {
    pub fn new(series: &'a PriceSeries) -> Result<Self, IndicatorError> {
        let mut closes = Vec::with_capacity(series.len());
        let mut volumes = Vec::with_capacity(series.len());
        for bar in series.bars() {
            closes.push(bar.close_f64()?);
            volumes.push(bar.volume_f64()?);
        }
        Ok(Self {
            series,
            closes,
            volumes,
        })
    }

    /// Features for the bar at `date`.
    pub fn features_at_date(
        &self,
        date: NaiveDate,
        params: &IndicatorParams,
    ) -> Result<FeatureVector, IndicatorError> {
        let index = self
            .series
            .index_of(date)
            .ok_or_else(|| IndicatorError::UnknownDate {
                ticker: self.series.ticker().to_string(),
                date,
            })?;
        Ok(self.features_at(index, params))
    }

    /// Features for the bar at position `index`. Every indicator reads
    /// `self.closes[..=index]` at most; nothing after `index` is touched.
    pub fn features_at(&self, index: usize, params: &IndicatorParams) -> FeatureVector {
        let date = self.series.bars()[index].date;
        let mut fv = FeatureVector::new(date);

        fv.insert(PRICE, FeatureValue::Finite(self.closes[index]));
        fv.insert(RETURN_1D, self.return_1d(index));
        fv.insert(ma_name(params.ma_window), self.moving_average(index, params.ma_window));
        fv.insert(rsi_name(params.rsi_window), self.rsi(index, params.rsi_window));
        fv.insert(
            volatility_name(params.volatility_window),
            self.volatility(index, params.volatility_window),
        );
        fv.insert(
            volume_z_name(params.volume_window),
            self.volume_z(index, params.volume_window),
        );

        fv
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Arithmetic mean of the trailing `window` closes ending at `index`.
    fn moving_average(&self, index: usize, window: usize) -> FeatureValue {
        if index + 1 < window {
            return FeatureValue::InsufficientHistory;
        }
        let slice = &self.closes[index + 1 - window..=index];
        FeatureValue::Finite(slice.iter().sum::<f64>() / window as f64)
    }

    /// Relative Strength Index with Wilder smoothing.
    ///
    /// The first value appears once `window` deltas exist (window + 1 bars);
    /// after that the gain/loss averages are smoothed recursively. A window
    /// with no losses reads 100, one with no gains reads 0.
    fn rsi(&self, index: usize, window: usize) -> FeatureValue {
        if index < window {
            return FeatureValue::InsufficientHistory;
        }

        // Seed the averages from the first `window` deltas of the series.
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=window {
            let change = self.closes[i] - self.closes[i - 1];
            if change > 0.0 {
                avg_gain += change;
            } else {
                avg_loss += -change;
            }
        }
        avg_gain /= window as f64;
        avg_loss /= window as f64;

        // Wilder's recursive smoothing up to the requested bar.
        for i in window + 1..=index {
            let change = self.closes[i] - self.closes[i - 1];
            let (gain, loss) = if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, -change)
            };
            avg_gain = (avg_gain * (window as f64 - 1.0) + gain) / window as f64;
            avg_loss = (avg_loss * (window as f64 - 1.0) + loss) / window as f64;
        }

        if avg_loss == 0.0 {
            return FeatureValue::Finite(100.0);
        }
        if avg_gain == 0.0 {
            return FeatureValue::Finite(0.0);
        }
        let rs = avg_gain / avg_loss;
        FeatureValue::Finite(100.0 - 100.0 / (1.0 + rs))
    }

    /// One-bar close-to-close return; undefined on the first bar.
    fn return_1d(&self, index: usize) -> FeatureValue {
        if index == 0 {
            return FeatureValue::InsufficientHistory;
        }
        FeatureValue::Finite(self.closes[index] / self.closes[index - 1] - 1.0)
    }

    /// Annualized standard deviation of the trailing `window` one-bar returns.
    fn volatility(&self, index: usize, window: usize) -> FeatureValue {
        if index < window {
            return FeatureValue::InsufficientHistory;
        }
        let returns: Vec<f64> = (index + 1 - window..=index)
            .map(|i| self.closes[i] / self.closes[i - 1] - 1.0)
            .collect();
        let mean = returns.iter().sum::<f64>() / window as f64;
        let variance = returns
            .iter()
            .map(|r| (r - mean) * (r - mean))
            .sum::<f64>()
            / (window as f64 - 1.0);
        FeatureValue::Finite(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
    }

    /// Z-score of the bar's volume against its trailing `window` bars.
    ///
    /// A window with zero volume dispersion yields 0.0, a defined value:
    /// "exactly average volume", not missing history.
    fn volume_z(&self, index: usize, window: usize) -> FeatureValue {
        if index + 1 < window {
            return FeatureValue::InsufficientHistory;
        }
        let slice = &self.volumes[index + 1 - window..=index];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let variance = slice.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
            / (window as f64 - 1.0);
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return FeatureValue::Finite(0.0);
        }
        FeatureValue::Finite((self.volumes[index] - mean) / std_dev)
    }
}
