//! Matching a query image against the reference model.

use nalgebra::Point2;
use planar_object_core::{GrayImageView, Rect};

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{DetectError, DetectionResult, PlanarObjectDetector, Rejection};
use crate::{dedup_by_reference, estimate_homography_ransac, EstimateError, PointClassifier};

impl<C: PointClassifier> PlanarObjectDetector<C> {
    /// Match against the region set by [`PlanarObjectDetector::set_roi`], or
    /// the whole image when none is set.
    ///
    /// Returns whether the object was found. The full outcome is available
    /// from [`PlanarObjectDetector::last_result`].
    pub fn match_point(&mut self, image: &GrayImageView<'_>) -> Result<bool, DetectError> {
        self.begin_match()?;
        let result = self.detect(image)?;
        Ok(self.record(result))
    }

    /// Match inside the `width × height` region whose top-left corner is `origin`.
    pub fn match_point_in(
        &mut self,
        image: &GrayImageView<'_>,
        origin: Point2<i32>,
        height: i32,
        width: i32,
    ) -> Result<bool, DetectError> {
        self.begin_match()?;
        let rect = Rect::from_point_and_size(origin, height, width)?;
        self.match_point_rect(image, rect)
    }

    pub fn match_point_rect(
        &mut self,
        image: &GrayImageView<'_>,
        rect: Rect,
    ) -> Result<bool, DetectError> {
        self.begin_match()?;
        let result = self.detect_in_rect(image, rect)?;
        Ok(self.record(result))
    }

    /// Run the matching pipeline without touching the detector state.
    ///
    /// Uses the same region rules as [`PlanarObjectDetector::match_point`].
    pub fn detect(&self, image: &GrayImageView<'_>) -> Result<DetectionResult, DetectError> {
        let rect = self
            .match_roi
            .unwrap_or_else(|| Rect::full(image.width, image.height));
        self.detect_in_rect(image, rect)
    }

    /// Run the matching pipeline on `rect` without touching the detector state.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn detect_in_rect(
        &self,
        image: &GrayImageView<'_>,
        rect: Rect,
    ) -> Result<DetectionResult, DetectError> {
        let reference = self.model.as_ref().ok_or(DetectError::ModelNotBuilt)?;
        let rect = rect.ensure_within(image.width, image.height)?;

        let (blurred, keypoints) = self.extract(image, rect);
        let points: Vec<Point2<f32>> = keypoints.iter().map(|k| k.position).collect();
        let correspondences = dedup_by_reference(self.classifier.classify(
            &reference.classifier,
            &blurred.view(),
            &points,
        ));
        log::debug!(
            "{} of {} query points matched a reference point",
            correspondences.len(),
            points.len()
        );
        if correspondences.is_empty() {
            return Ok(DetectionResult::rejected(
                correspondences,
                Rejection::NoCorrespondences,
            ));
        }

        let (src, dst): (Vec<_>, Vec<_>) = correspondences
            .iter()
            .map(|c| (c.reference, c.query))
            .unzip();
        let fit = match estimate_homography_ransac(&src, &dst, &self.params.ransac) {
            Ok(fit) => fit,
            Err(EstimateError::InsufficientGeometry(issue)) => {
                return Ok(DetectionResult::rejected(
                    correspondences,
                    Rejection::InsufficientGeometry(issue),
                ));
            }
            Err(EstimateError::NoConsensus) => {
                return Ok(DetectionResult::rejected(
                    correspondences,
                    Rejection::NoConsensus,
                ));
            }
        };

        let needed = self.params.min_inlier_count;
        if fit.inlier_count < needed {
            return Ok(DetectionResult {
                inlier_count: fit.inlier_count,
                inlier_mask: fit.inlier_mask,
                ..DetectionResult::rejected(
                    correspondences,
                    Rejection::TooFewInliers {
                        found: fit.inlier_count,
                        needed,
                    },
                )
            });
        }

        let corners = fit.homography.apply_quad(&reference.corners);
        Ok(DetectionResult {
            accepted: true,
            homography: Some(fit.homography),
            corners: Some(corners),
            inlier_count: fit.inlier_count,
            correspondences,
            inlier_mask: fit.inlier_mask,
            rejection: None,
        })
    }

    /// Drop the previous outcome so a failing match leaves the detector `Ready`.
    fn begin_match(&mut self) -> Result<(), DetectError> {
        if self.model.is_none() {
            return Err(DetectError::ModelNotBuilt);
        }
        self.last_result = None;
        Ok(())
    }

    fn record(&mut self, result: DetectionResult) -> bool {
        let accepted = result.accepted;
        match result.rejection {
            None => log::info!(
                "object found: {} inliers of {} correspondences",
                result.inlier_count,
                result.correspondences.len()
            ),
            Some(reason) => log::info!("object not found: {reason:?}"),
        }
        self.last_result = Some(result);
        accepted
    }
}
