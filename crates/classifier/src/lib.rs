//! # Market State Classifier
//!
//! Trains a per-instrument supervised model over engineered features and
//! predicts the instrument's market state with a confidence score.
//!
//! The model is a committee of independently seeded random forests: the
//! predicted label is the committee plurality and the confidence is the
//! winning vote share. With frozen seeds the whole pipeline is deterministic;
//! predicting twice with the same model and feature vector always returns the
//! same `(state, confidence)` pair.
//!
//! Ground-truth labels come from the sign of forward returns over a
//! configurable horizon (`labeling`), so the labeling rule is configuration,
//! not code.

pub mod dataset;
pub mod error;
pub mod labeling;
pub mod model;
pub mod persistence;

pub use dataset::{Dataset, build_dataset};
pub use error::ClassifierError;
pub use labeling::label_series;
pub use model::{ModelMetadata, Prediction, StateModel, train, train_on_dataset};
pub use persistence::{load_model, save_model};
