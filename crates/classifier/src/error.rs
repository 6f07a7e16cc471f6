use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("cannot predict: feature '{0}' has insufficient history")]
    InsufficientData(String),

    #[error("cannot train: {actual} labeled samples available, {required} required")]
    InsufficientTrainingData { required: usize, actual: usize },

    #[error("model error: {0}")]
    Model(String),

    #[error("model artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model artifact serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Indicator(#[from] indicators::IndicatorError),

    #[error(transparent)]
    Core(#[from] core_types::CoreError),
}
