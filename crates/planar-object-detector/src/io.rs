//! JSON configuration and report helpers for planar object detection.

use crate::{DetectionResult, PlanarDetectorParams, PlanarObjectDetector, RansacParams, Rejection};
use planar_object_core::{KeypointParams, Rect, RoiError};
use planar_object_fern::{FernClassifier, FernParams};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum DetectIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_record_name() -> String {
    "object".to_string()
}

/// `[x, y, width, height]` in pixels.
pub type RoiSpec = [i32; 4];

/// Build a [`Rect`] from an `[x, y, width, height]` array.
pub fn rect_from_spec(spec: RoiSpec) -> Result<Rect, RoiError> {
    Rect::new(spec[0], spec[1], spec[2], spec[3])
}

/// Configuration for a train-then-detect run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectConfig {
    pub reference_image: String,
    /// Reference region; the whole image when absent.
    #[serde(default)]
    pub reference_roi: Option<RoiSpec>,
    #[serde(default)]
    pub query_images: Vec<String>,
    /// Match region applied to every query image.
    #[serde(default)]
    pub query_roi: Option<RoiSpec>,
    /// Archive to record the trained model into.
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default = "default_record_name")]
    pub record_name: String,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub min_inlier_count: Option<usize>,
    #[serde(default)]
    pub blur_sigma: Option<f32>,
    #[serde(default)]
    pub keypoints: Option<KeypointParams>,
    #[serde(default)]
    pub ransac: Option<RansacParams>,
    #[serde(default)]
    pub fern: Option<FernParams>,
}

impl DetectConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DetectIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DetectIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("planar_object_report.json"))
    }

    pub fn reference_rect(&self) -> Result<Option<Rect>, RoiError> {
        self.reference_roi.map(rect_from_spec).transpose()
    }

    pub fn query_rect(&self) -> Result<Option<Rect>, RoiError> {
        self.query_roi.map(rect_from_spec).transpose()
    }

    /// Build detector parameters, applying overrides from the config.
    pub fn build_params(&self) -> PlanarDetectorParams {
        let mut params = PlanarDetectorParams::default();
        if let Some(n) = self.min_inlier_count {
            params.min_inlier_count = n;
        }
        if let Some(sigma) = self.blur_sigma {
            params.blur_sigma = sigma;
        }
        if let Some(keypoints) = self.keypoints.clone() {
            params.keypoints = keypoints;
        }
        if let Some(ransac) = self.ransac.clone() {
            params.ransac = ransac;
        }
        params
    }

    /// Build an untrained Fern-based detector from this config.
    pub fn build_detector(&self) -> PlanarObjectDetector<FernClassifier> {
        let fern = FernClassifier::new(self.fern.clone().unwrap_or_default());
        PlanarObjectDetector::new(fern, self.build_params())
    }
}

/// Outcome for one query image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReport {
    pub image_path: String,
    pub accepted: bool,
    pub correspondences: usize,
    pub inliers: usize,
    /// Detected corners, top-left first, clockwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners: Option<[[f32; 2]; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homography: Option<[[f64; 3]; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    /// Set when the image could not be processed at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryReport {
    pub fn from_result(image_path: impl Into<String>, result: &DetectionResult) -> Self {
        Self {
            image_path: image_path.into(),
            accepted: result.accepted,
            correspondences: result.correspondences.len(),
            inliers: result.inlier_count,
            corners: result.corners.map(|c| c.map(|p| [p.x, p.y])),
            homography: result.homography.map(|h| h.to_array()),
            rejection: result.rejection,
            error: None,
        }
    }

    pub fn failed(image_path: impl Into<String>, error: impl ToString) -> Self {
        Self {
            image_path: image_path.into(),
            accepted: false,
            correspondences: 0,
            inliers: 0,
            corners: None,
            homography: None,
            rejection: None,
            error: Some(error.to_string()),
        }
    }
}

/// Report written after a detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectReport {
    pub reference_image: String,
    pub reference_points: usize,
    pub reference_corners: Option<[[f32; 2]; 4]>,
    pub queries: Vec<QueryReport>,
}

impl DetectReport {
    pub fn accepted_count(&self) -> usize {
        self.queries.iter().filter(|q| q.accepted).count()
    }

    /// Load a JSON report from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DetectIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DetectIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
