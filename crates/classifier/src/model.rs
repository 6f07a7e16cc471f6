use crate::dataset::{Dataset, build_dataset};
use crate::error::ClassifierError;
use configuration::{ClassifierParams, IndicatorParams, LabelingParams};
use core_types::{FeatureVector, PriceSeries, StateLabel};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::metrics::accuracy;
use std::collections::BTreeMap;

/// The concrete forest type used by every committee member.
type Forest = RandomForestClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// Descriptive metadata persisted alongside the committee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub ticker: String,
    /// Feature order expected by `predict`. Prediction rows are assembled in
    /// exactly this order.
    pub feature_names: Vec<String>,
    pub trained_at: String,
    pub training_samples: usize,
    pub validation_samples: usize,
    /// Label code -> sample count over the full dataset.
    pub class_distribution: BTreeMap<i32, usize>,
    /// Accuracy of the committee vote on the held-out chronological tail.
    pub validation_accuracy: Option<f64>,
    pub committee_size: usize,
}

/// The output of a single prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub state: StateLabel,
    /// Share of committee members voting for `state`, in [0, 1].
    pub confidence: f64,
}

/// A trained, immutable per-instrument market state model.
///
/// The committee members differ only in their training seed. Predictions are
/// deterministic: identical (model, feature vector) pairs always produce the
/// identical `(state, confidence)`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateModel {
    committee: Vec<Forest>,
    metadata: ModelMetadata,
}

impl StateModel {
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Predicts the market state for one feature vector.
    ///
    /// Fails with `InsufficientData` if any feature the model was trained on
    /// is absent or still marked as insufficient history.
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        let mut row = Vec::with_capacity(self.metadata.feature_names.len());
        for name in &self.metadata.feature_names {
            let value = features
                .finite(name)
                .ok_or_else(|| ClassifierError::InsufficientData(name.clone()))?;
            row.push(value);
        }

        let matrix = DenseMatrix::from_2d_vec(&vec![row])
            .map_err(|e| ClassifierError::Model(e.to_string()))?;

        let mut votes = Vec::with_capacity(self.committee.len());
        for forest in &self.committee {
            let predicted = forest
                .predict(&matrix)
                .map_err(|e| ClassifierError::Model(e.to_string()))?;
            let code = predicted
                .first()
                .copied()
                .ok_or_else(|| ClassifierError::Model("empty prediction".to_string()))?;
            votes.push(code);
        }

        let (code, confidence) = tally_votes(&votes);
        let state = StateLabel::from_code(code)
            .ok_or_else(|| ClassifierError::Model(format!("unexpected class code {code}")))?;

        Ok(Prediction { state, confidence })
    }
}

/// Plurality vote over committee outputs.
///
/// Ties are broken in the fixed `StateLabel::ALL` order so the result never
/// depends on committee iteration quirks.
fn tally_votes(votes: &[i32]) -> (i32, f64) {
    let mut winner = StateLabel::ALL[0].code();
    let mut winner_count = 0usize;
    for state in StateLabel::ALL {
        let count = votes.iter().filter(|&&v| v == state.code()).count();
        if count > winner_count {
            winner = state.code();
            winner_count = count;
        }
    }
    (winner, winner_count as f64 / votes.len() as f64)
}

/// Trains a committee model for one instrument.
///
/// The dataset is split chronologically: the head trains, the tail validates.
/// No shuffling, so validation always happens on data the model has never
/// seen in time order.
pub fn train(
    series: &PriceSeries,
    indicator_params: &IndicatorParams,
    labeling_params: &LabelingParams,
    params: &ClassifierParams,
) -> Result<StateModel, ClassifierError> {
    let dataset = build_dataset(series, indicator_params, labeling_params)?;
    train_on_dataset(series.ticker(), dataset, params)
}

/// Trains from an already-assembled dataset. Exposed for walk-forward
/// evaluation, which needs to split the dataset itself.
pub fn train_on_dataset(
    ticker: &str,
    dataset: Dataset,
    params: &ClassifierParams,
) -> Result<StateModel, ClassifierError> {
    if dataset.len() < params.min_training_samples {
        return Err(ClassifierError::InsufficientTrainingData {
            required: params.min_training_samples,
            actual: dataset.len(),
        });
    }

    let mut class_distribution = BTreeMap::new();
    for code in &dataset.labels {
        *class_distribution.entry(*code).or_insert(0usize) += 1;
    }

    // Chronological split: the most recent fraction is held out.
    let holdout = ((dataset.len() as f64) * params.validation_fraction) as usize;
    let split = dataset.len() - holdout;
    let (train_rows, valid_rows) = dataset.rows.split_at(split);
    let (train_labels, valid_labels) = dataset.labels.split_at(split);

    let x_train = DenseMatrix::from_2d_vec(&train_rows.to_vec())
        .map_err(|e| ClassifierError::Model(e.to_string()))?;
    let y_train: Vec<i32> = train_labels.to_vec();

    let mut committee = Vec::with_capacity(params.committee_size);
    for member in 0..params.committee_size {
        let forest_params = RandomForestClassifierParameters::default()
            .with_n_trees(params.n_trees)
            .with_max_depth(params.max_depth)
            .with_min_samples_leaf(params.min_samples_leaf)
            .with_min_samples_split(params.min_samples_split)
            .with_seed(params.seed_base + member as u64);

        let forest = RandomForestClassifier::fit(&x_train, &y_train, forest_params)
            .map_err(|e| ClassifierError::Model(e.to_string()))?;
        committee.push(forest);
    }

    // Validation accuracy of the committee vote on the held-out tail.
    let validation_accuracy = if valid_rows.is_empty() {
        None
    } else {
        let x_valid = DenseMatrix::from_2d_vec(&valid_rows.to_vec())
            .map_err(|e| ClassifierError::Model(e.to_string()))?;
        let mut member_outputs = Vec::with_capacity(committee.len());
        for forest in &committee {
            let predicted = forest
                .predict(&x_valid)
                .map_err(|e| ClassifierError::Model(e.to_string()))?;
            member_outputs.push(predicted);
        }

        let voted: Vec<i32> = (0..valid_rows.len())
            .map(|row| {
                let votes: Vec<i32> = member_outputs.iter().map(|out| out[row]).collect();
                tally_votes(&votes).0
            })
            .collect();
        let y_valid: Vec<i32> = valid_labels.to_vec();
        Some(accuracy(&y_valid, &voted))
    };

    tracing::info!(
        ticker,
        training_samples = split,
        validation_samples = holdout,
        validation_accuracy = ?validation_accuracy,
        committee_size = params.committee_size,
        "trained market state model"
    );

    let metadata = ModelMetadata {
        ticker: ticker.to_string(),
        feature_names: dataset.feature_names,
        trained_at: chrono::Utc::now().to_rfc3339(),
        training_samples: split,
        validation_samples: holdout,
        class_distribution,
        validation_accuracy,
        committee_size: params.committee_size,
    };

    Ok(StateModel {
        committee,
        metadata,
    })
}
