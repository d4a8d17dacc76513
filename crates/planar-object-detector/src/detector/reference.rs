//! Reference model construction.

use nalgebra::Point2;
use planar_object_core::{GrayImageView, Rect};

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{DetectError, PlanarObjectDetector, ReferenceModel};
use crate::{ClassifierError, PointClassifier};

impl<C: PointClassifier> PlanarObjectDetector<C> {
    /// Learn the whole image as the reference patch.
    pub fn build_reference(&mut self, image: &GrayImageView<'_>) -> Result<usize, DetectError> {
        self.build_reference_rect(image, Rect::full(image.width, image.height))
    }

    /// Learn the `width × height` region whose top-left corner is `origin`.
    pub fn build_reference_in(
        &mut self,
        image: &GrayImageView<'_>,
        origin: Point2<i32>,
        height: i32,
        width: i32,
    ) -> Result<usize, DetectError> {
        let rect = Rect::from_point_and_size(origin, height, width)?;
        self.build_reference_rect(image, rect)
    }

    /// Learn the region `rect` of `image`.
    ///
    /// Returns the number of reference points the classifier was trained on.
    /// When the region has no usable interest point this is `Ok(0)` and the
    /// previous model, if any, is kept. On success the model is replaced and
    /// the last match result discarded.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn build_reference_rect(
        &mut self,
        image: &GrayImageView<'_>,
        rect: Rect,
    ) -> Result<usize, DetectError> {
        let rect = rect.ensure_within(image.width, image.height)?;
        let (blurred, keypoints) = self.extract(image, rect);
        if keypoints.is_empty() {
            log::warn!("no interest points in the reference region; model unchanged");
            return Ok(0);
        }

        let points: Vec<Point2<f32>> = keypoints.iter().map(|k| k.position).collect();
        let classifier = match self.classifier.train(&blurred.view(), &points) {
            Ok(model) => model,
            Err(ClassifierError::NoPoints) => {
                log::warn!("classifier refused the reference points; model unchanged");
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        };

        let count = points.len();
        self.model = Some(ReferenceModel {
            classifier,
            corners: rect.corners(),
            roi: rect,
            image_size: [image.width, image.height],
        });
        self.last_result = None;
        log::info!("reference model built from {count} points");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DetectorState, PlanarDetectorParams};
    use planar_object_core::{GrayImage, RoiError};
    use planar_object_fern::{FernClassifier, FernParams};

    fn blocks(size: usize) -> GrayImage {
        let mut img = GrayImage::filled(size, size, 0);
        for y in 0..size {
            for x in 0..size {
                let v = ((x / 8) * 37 + (y / 8) * 91) % 200 + 30;
                img.set(x, y, v as u8);
            }
        }
        img
    }

    fn quick_detector() -> PlanarObjectDetector {
        let fern = FernClassifier::new(FernParams {
            num_ferns: 4,
            num_views: 10,
            ..FernParams::default()
        });
        PlanarObjectDetector::new(fern, PlanarDetectorParams::default())
    }

    #[test]
    fn records_rect_corners_in_order() {
        let img = blocks(80);
        let mut det = quick_detector();
        let n = det
            .build_reference_in(&img.view(), Point2::new(10, 12), 40, 50)
            .expect("build");
        assert!(n > 0);
        assert_eq!(det.state(), DetectorState::Ready);
        assert_eq!(det.reference_points().len(), n);
        assert_eq!(
            det.reference_corners(),
            Some([
                Point2::new(10.0, 12.0),
                Point2::new(60.0, 12.0),
                Point2::new(60.0, 52.0),
                Point2::new(10.0, 52.0),
            ])
        );
        let roi = det.reference_model().map(|m| m.roi);
        assert_eq!(roi, Some(Rect::new(10, 12, 50, 40).expect("valid")));
    }

    #[test]
    fn flat_region_keeps_previous_model() {
        let mut img = blocks(80);
        for y in 0..40 {
            for x in 40..80 {
                img.set(x, y, 100);
            }
        }
        let mut det = quick_detector();
        let n = det
            .build_reference_rect(&img.view(), Rect::new(0, 40, 40, 40).expect("valid"))
            .expect("build");
        assert!(n > 0);
        let before = det.reference_corners();

        let flat = det
            .build_reference_rect(&img.view(), Rect::new(55, 5, 20, 20).expect("valid"))
            .expect("flat build");
        assert_eq!(flat, 0);
        assert_eq!(det.reference_corners(), before);
    }

    #[test]
    fn flat_region_on_fresh_detector_stays_uninitialized() {
        let img = GrayImage::filled(40, 40, 77);
        let mut det = quick_detector();
        assert_eq!(det.build_reference(&img.view()).expect("build"), 0);
        assert_eq!(det.state(), DetectorState::Uninitialized);
    }

    #[test]
    fn invalid_regions_are_errors() {
        let img = blocks(64);
        let mut det = quick_detector();
        let err = det
            .build_reference_in(&img.view(), Point2::new(0, 0), -4, 10)
            .unwrap_err();
        assert!(matches!(
            err,
            DetectError::InvalidRegion(RoiError::NegativeSize { .. })
        ));
        let err = det
            .build_reference_rect(&img.view(), Rect::new(40, 40, 30, 30).expect("valid"))
            .unwrap_err();
        assert!(matches!(
            err,
            DetectError::InvalidRegion(RoiError::OutOfBounds { .. })
        ));
        assert!(!det.is_model_built());
    }

    #[test]
    fn bad_classifier_settings_surface_as_errors() {
        let img = blocks(64);
        let mut det = quick_detector();
        det.classifier_mut().params_mut().num_ferns = 0;
        let err = det.build_reference(&img.view()).unwrap_err();
        assert!(matches!(
            err,
            DetectError::Classifier(ClassifierError::InvalidParams(_))
        ));
    }
}
