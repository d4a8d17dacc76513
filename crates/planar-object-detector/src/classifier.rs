//! The point-classifier capability consumed by the detector.

use nalgebra::Point2;
use planar_object_core::GrayImageView;
use planar_object_fern::{FernClassifier, FernError, FernModel};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A query interest point recognised as a reference point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub reference: Point2<f32>,
    pub query: Point2<f32>,
    /// Identifies the reference point; unique within a matched set.
    pub class_id: usize,
    /// Classifier confidence, higher is better.
    pub score: f32,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("no reference points to train on")]
    NoPoints,
    #[error("invalid classifier parameters: {0}")]
    InvalidParams(String),
}

impl From<FernError> for ClassifierError {
    fn from(err: FernError) -> Self {
        match err {
            FernError::NoPoints => Self::NoPoints,
            FernError::InvalidParams(msg) => Self::InvalidParams(msg),
        }
    }
}

/// Learns a set of reference points and later recognises them in new images.
///
/// The trained state is a separate, serializable [`PointClassifier::Model`]
/// so the detector can persist it and swap it wholesale.
pub trait PointClassifier {
    type Model: Clone + Serialize + DeserializeOwned;

    /// Train one class per entry of `points` (class id = index).
    fn train(
        &self,
        image: &GrayImageView<'_>,
        points: &[Point2<f32>],
    ) -> Result<Self::Model, ClassifierError>;

    /// Reference points `model` was trained on; index = class id.
    fn reference_points<'m>(&self, model: &'m Self::Model) -> &'m [Point2<f32>];

    /// Recognise `points` of `image`. Several query points may map to the
    /// same class; the caller resolves duplicates.
    fn classify(
        &self,
        model: &Self::Model,
        image: &GrayImageView<'_>,
        points: &[Point2<f32>],
    ) -> Vec<Correspondence>;
}

impl PointClassifier for FernClassifier {
    type Model = FernModel;

    fn train(
        &self,
        image: &GrayImageView<'_>,
        points: &[Point2<f32>],
    ) -> Result<FernModel, ClassifierError> {
        Ok(FernClassifier::train(self, image, points)?)
    }

    fn reference_points<'m>(&self, model: &'m FernModel) -> &'m [Point2<f32>] {
        model.class_points()
    }

    fn classify(
        &self,
        model: &FernModel,
        image: &GrayImageView<'_>,
        points: &[Point2<f32>],
    ) -> Vec<Correspondence> {
        let class_points = model.class_points();
        FernClassifier::classify(self, model, image, points)
            .into_iter()
            .map(|m| Correspondence {
                reference: class_points[m.class_id],
                query: points[m.query_index],
                class_id: m.class_id,
                score: m.score,
            })
            .collect()
    }
}

/// Keep one correspondence per reference point, the highest scoring.
///
/// Ties keep the earliest entry. Output is ordered by `class_id`.
pub fn dedup_by_reference(mut matches: Vec<Correspondence>) -> Vec<Correspondence> {
    // Stable sort keeps input order among equal scores.
    matches.sort_by(|a, b| {
        a.class_id
            .cmp(&b.class_id)
            .then_with(|| b.score.total_cmp(&a.score))
    });
    matches.dedup_by_key(|m| m.class_id);
    matches
}
