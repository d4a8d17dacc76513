use planar_object_core::KeypointParams;
use serde::{Deserialize, Serialize};

use crate::RansacParams;

/// Configuration for [`crate::PlanarObjectDetector`].
///
/// Classifier settings live with the classifier itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanarDetectorParams {
    /// A match is accepted when RANSAC finds at least this many inliers.
    pub min_inlier_count: usize,
    /// Gaussian smoothing applied before interest point detection and
    /// classification. `0` disables it.
    pub blur_sigma: f32,
    /// Interest points, used for both the reference and query images.
    pub keypoints: KeypointParams,
    pub ransac: RansacParams,
}

impl Default for PlanarDetectorParams {
    fn default() -> Self {
        Self {
            min_inlier_count: 10,
            blur_sigma: 1.5,
            keypoints: KeypointParams::default(),
            ransac: RansacParams::default(),
        }
    }
}
