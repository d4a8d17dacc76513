use nalgebra::Point2;
use planar_object_core::{
    detect_harris_keypoints, gaussian_blur, GrayImage, GrayImageView, Homography, Keypoint, Rect,
};
use serde::{Deserialize, Serialize};

use super::{DetectionResult, PlanarDetectorParams, ReferenceModel};
use crate::PointClassifier;
use planar_object_fern::FernClassifier;

/// Lifecycle of a [`PlanarObjectDetector`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorState {
    /// No reference model yet; matching is refused.
    Uninitialized,
    /// A model is available and the last match (if any) was rejected.
    Ready,
    /// The last match was accepted.
    Matched,
}

/// Detects a known planar patch in new images and recovers its homography.
///
/// Build a reference from one image (or load one), then call one of the
/// `match_point*` methods per frame. [`PlanarObjectDetector::detect`] runs
/// the same pipeline through `&self` without recording the outcome.
pub struct PlanarObjectDetector<C: PointClassifier = FernClassifier> {
    pub(crate) classifier: C,
    pub(crate) params: PlanarDetectorParams,
    pub(crate) model: Option<ReferenceModel<C::Model>>,
    pub(crate) last_result: Option<DetectionResult>,
    pub(crate) match_roi: Option<Rect>,
}

impl<C: PointClassifier + Default> Default for PlanarObjectDetector<C> {
    fn default() -> Self {
        Self::new(C::default(), PlanarDetectorParams::default())
    }
}

impl<C: PointClassifier> PlanarObjectDetector<C> {
    pub fn new(classifier: C, params: PlanarDetectorParams) -> Self {
        Self {
            classifier,
            params,
            model: None,
            last_result: None,
            match_roi: None,
        }
    }

    #[inline]
    pub fn params(&self) -> &PlanarDetectorParams {
        &self.params
    }

    #[inline]
    pub fn params_mut(&mut self) -> &mut PlanarDetectorParams {
        &mut self.params
    }

    #[inline]
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Classifier settings may be changed freely; they apply to the next
    /// build or match.
    #[inline]
    pub fn classifier_mut(&mut self) -> &mut C {
        &mut self.classifier
    }

    pub fn state(&self) -> DetectorState {
        match (&self.model, &self.last_result) {
            (None, _) => DetectorState::Uninitialized,
            (Some(_), Some(r)) if r.accepted => DetectorState::Matched,
            (Some(_), _) => DetectorState::Ready,
        }
    }

    #[inline]
    pub fn is_model_built(&self) -> bool {
        self.model.is_some()
    }

    #[inline]
    pub fn reference_model(&self) -> Option<&ReferenceModel<C::Model>> {
        self.model.as_ref()
    }

    /// Reference region corners (top-left, top-right, bottom-right, bottom-left).
    pub fn reference_corners(&self) -> Option<[Point2<f32>; 4]> {
        self.model.as_ref().map(|m| m.corners)
    }

    /// Interest points the classifier was trained on.
    pub fn reference_points(&self) -> &[Point2<f32>] {
        self.model
            .as_ref()
            .map(|m| self.classifier.reference_points(&m.classifier))
            .unwrap_or(&[])
    }

    /// Outcome of the last `match_point*` call since the model was replaced.
    #[inline]
    pub fn last_result(&self) -> Option<&DetectionResult> {
        self.last_result.as_ref()
    }

    /// Detected corners of the last accepted match, in reference corner order.
    pub fn detected_corners(&self) -> Option<[Point2<f32>; 4]> {
        self.last_result.as_ref().and_then(|r| r.corners)
    }

    /// Reference-to-query homography of the last accepted match.
    pub fn homography(&self) -> Option<Homography> {
        self.last_result.as_ref().and_then(|r| r.homography)
    }

    #[inline]
    pub fn min_inlier_count(&self) -> usize {
        self.params.min_inlier_count
    }

    /// Takes effect on the next match.
    #[inline]
    pub fn set_min_inlier_count(&mut self, n: usize) {
        self.params.min_inlier_count = n;
    }

    /// Restrict subsequent [`PlanarObjectDetector::match_point`] calls to the
    /// rectangle spanned by two opposite corners. Checked against each image
    /// when matching.
    pub fn set_roi(&mut self, top_left: Point2<i32>, bottom_right: Point2<i32>) {
        self.match_roi = Some(Rect::from_corners(top_left, bottom_right));
    }

    pub fn clear_roi(&mut self) {
        self.match_roi = None;
    }

    #[inline]
    pub fn roi(&self) -> Option<Rect> {
        self.match_roi
    }

    /// Smooth `image` and detect interest points inside `rect` (already validated).
    pub(super) fn extract(
        &self,
        image: &GrayImageView<'_>,
        rect: Rect,
    ) -> (GrayImage, Vec<Keypoint>) {
        let blurred = gaussian_blur(image, self.params.blur_sigma);
        let keypoints = detect_harris_keypoints(&blurred.view(), rect, &self.params.keypoints);
        log::debug!(
            "{} interest points in {}x{} region at ({}, {})",
            keypoints.len(),
            rect.width(),
            rect.height(),
            rect.x(),
            rect.y()
        );
        (blurred, keypoints)
    }
}
