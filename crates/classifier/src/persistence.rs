use crate::error::ClassifierError;
use crate::model::StateModel;
use std::fs::File;
use std::path::Path;

/// Persists a trained model artifact (committee + metadata) to disk.
pub fn save_model(model: &StateModel, path: &Path) -> Result<(), ClassifierError> {
    let file = File::create(path)?;
    bincode::serialize_into(file, model)
        .map_err(|e| ClassifierError::Serialization(e.to_string()))?;
    tracing::debug!(path = %path.display(), "saved model artifact");
    Ok(())
}

/// Loads a previously persisted model artifact.
pub fn load_model(path: &Path) -> Result<StateModel, ClassifierError> {
    let file = File::open(path)?;
    let model: StateModel = bincode::deserialize_from(file)
        .map_err(|e| ClassifierError::Serialization(e.to_string()))?;
    Ok(model)
}
