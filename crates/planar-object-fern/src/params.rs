use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::FernError;

/// Training and recognition settings for [`crate::FernClassifier`].
///
/// Training renders `num_views` random affine views of the neighbourhood of
/// every reference point. Each view draws a rotation in
/// `[-max_rotation, max_rotation]`, a log-uniform scale in
/// `[min_scale, max_scale]` and an anisotropic stretch of up to
/// `max_anisotropy` along a random axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FernParams {
    /// Number of independent ferns.
    pub num_ferns: usize,
    /// Binary tests per fern; each fern has `2^depth` leaves.
    pub depth: usize,
    /// Test offsets are drawn inside a square of this half-size (pixels).
    pub patch_radius: f32,
    /// Random views rendered per reference point during training.
    pub num_views: usize,
    /// Maximum absolute in-plane rotation (radians).
    pub max_rotation: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Relative stretch along a random axis, `0` for similarity views only.
    pub max_anisotropy: f32,
    /// Uniform jitter of the patch centre (pixels).
    pub position_jitter: f32,
    /// Uniform intensity noise added to every sampled pixel during training.
    pub intensity_noise: f32,
    /// Dirichlet prior added to every leaf count.
    pub prior: f32,
    /// Minimum mean per-fern log-likelihood ratio against a uniform leaf
    /// distribution for a recognition to be reported.
    pub min_log_ratio: f32,
    /// Seed for test layout and view sampling.
    pub seed: u64,
}

impl Default for FernParams {
    fn default() -> Self {
        Self {
            num_ferns: 32,
            depth: 8,
            patch_radius: 15.0,
            num_views: 800,
            max_rotation: PI,
            min_scale: 0.6,
            max_scale: 1.5,
            max_anisotropy: 0.15,
            position_jitter: 1.0,
            intensity_noise: 4.0,
            prior: 1.0,
            min_log_ratio: 0.25,
            seed: 0x5eed_f0e5,
        }
    }
}

impl FernParams {
    /// Leaves per fern.
    #[inline]
    pub fn leaf_count(&self) -> usize {
        1usize << self.depth
    }

    pub fn validate(&self) -> Result<(), FernError> {
        let invalid = |msg: String| Err(FernError::InvalidParams(msg));
        if self.num_ferns == 0 {
            return invalid("num_ferns must be positive".into());
        }
        if self.depth == 0 || self.depth > 16 {
            return invalid(format!("depth must be in 1..=16, got {}", self.depth));
        }
        if self.num_views == 0 {
            return invalid("num_views must be positive".into());
        }
        if !(self.patch_radius.is_finite() && self.patch_radius >= 1.0) {
            return invalid(format!("patch_radius must be >= 1, got {}", self.patch_radius));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale && self.max_scale.is_finite())
        {
            return invalid(format!(
                "scale range [{}, {}] is not a valid positive interval",
                self.min_scale, self.max_scale
            ));
        }
        if !(0.0..1.0).contains(&self.max_anisotropy) {
            return invalid(format!(
                "max_anisotropy must be in [0, 1), got {}",
                self.max_anisotropy
            ));
        }
        if !(self.prior > 0.0 && self.prior.is_finite()) {
            return invalid(format!("prior must be positive, got {}", self.prior));
        }
        if !(self.max_rotation >= 0.0
            && self.position_jitter >= 0.0
            && self.intensity_noise >= 0.0)
        {
            return invalid("rotation, jitter and noise ranges must be non-negative".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let p = FernParams::default();
        assert!(p.validate().is_ok());
        assert_eq!(p.leaf_count(), 256);
    }

    #[test]
    fn rejects_degenerate_settings() {
        let bad = [
            FernParams {
                num_ferns: 0,
                ..FernParams::default()
            },
            FernParams {
                depth: 17,
                ..FernParams::default()
            },
            FernParams {
                min_scale: 2.0,
                max_scale: 1.0,
                ..FernParams::default()
            },
            FernParams {
                prior: 0.0,
                ..FernParams::default()
            },
        ];
        for p in bad {
            assert!(matches!(p.validate(), Err(FernError::InvalidParams(_))));
        }
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let p: FernParams = serde_json::from_str(r#"{ "num_views": 50 }"#).expect("parse");
        assert_eq!(p.num_views, 50);
        assert_eq!(p.num_ferns, FernParams::default().num_ferns);
    }
}
