use planar_object_core::RoiError;

use crate::{ClassifierError, PersistenceError};

/// Errors returned by [`crate::PlanarObjectDetector`].
///
/// Failing to find the object is not an error: matching reports it through
/// [`crate::DetectionResult::rejection`].
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    InvalidRegion(#[from] RoiError),
    #[error("no reference model has been built or loaded")]
    ModelNotBuilt,
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
