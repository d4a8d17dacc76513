//! Training and recognition.

use nalgebra::{Matrix2, Point2, Rotation2};
use planar_object_core::GrayImageView;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Fern, FernModel, FernParams};

/// Errors produced while training a fern model.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FernError {
    #[error("no reference points to train on")]
    NoPoints,
    #[error("invalid fern parameters: {0}")]
    InvalidParams(String),
}

/// A query point recognised as one of the model's classes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FernMatch {
    /// Index into the query point slice passed to [`FernClassifier::classify`].
    pub query_index: usize,
    /// Recognised class (index into [`FernModel::class_points`]).
    pub class_id: usize,
    /// Mean per-fern log-likelihood ratio of the winning class against a
    /// uniform leaf distribution.
    pub score: f32,
}

/// Randomized fern classifier.
///
/// Holds only settings; the learned statistics live in a [`FernModel`] so the
/// same classifier can train several models or reuse a persisted one.
#[derive(Clone, Debug, Default)]
pub struct FernClassifier {
    params: FernParams,
}

impl FernClassifier {
    pub fn new(params: FernParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &FernParams {
        &self.params
    }

    #[inline]
    pub fn params_mut(&mut self) -> &mut FernParams {
        &mut self.params
    }

    /// Learn one class per point in `points` from random affine views of
    /// `image` around each point.
    ///
    /// Training is deterministic for a given seed.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image, points),
            fields(points = points.len(), views = self.params.num_views)
        )
    )]
    pub fn train(
        &self,
        image: &GrayImageView<'_>,
        points: &[Point2<f32>],
    ) -> Result<FernModel, FernError> {
        self.params.validate()?;
        if points.is_empty() {
            return Err(FernError::NoPoints);
        }

        let p = &self.params;
        let mut rng = StdRng::seed_from_u64(p.seed);
        let ferns: Vec<Fern> = (0..p.num_ferns)
            .map(|_| Fern::random(&mut rng, p.depth, p.patch_radius))
            .collect();

        let counts = vec![0u32; p.num_ferns * p.leaf_count() * points.len()];
        let mut model =
            FernModel::from_counts(ferns, p.depth, points.to_vec(), 0, p.prior, counts);

        for view in 0..p.num_views {
            // The first view is the undistorted reference patch.
            let warp = if view == 0 {
                Matrix2::identity()
            } else {
                random_warp(&mut rng, p)
            };
            for (class_id, &pt) in points.iter().enumerate() {
                let center = if view == 0 || p.position_jitter <= 0.0 {
                    pt
                } else {
                    let j = p.position_jitter;
                    Point2::new(
                        pt.x + rng.gen_range(-j..=j),
                        pt.y + rng.gen_range(-j..=j),
                    )
                };
                for f in 0..p.num_ferns {
                    let fern = &model.ferns()[f];
                    let leaf = fern.noisy_leaf(image, center, &warp, p.intensity_noise, &mut rng);
                    model.leaf_counts_mut(f, leaf)[class_id] += 1;
                }
            }
        }

        model.finish_training(p.num_views as u32);
        log::debug!(
            "trained {} ferns of depth {} on {} points x {} views",
            p.num_ferns,
            p.depth,
            points.len(),
            p.num_views
        );
        Ok(model)
    }

    /// Recognise `points` of `image` against `model`.
    ///
    /// Returns at most one match per query point, in query order, keeping
    /// only those whose score reaches `min_log_ratio`. Several query points
    /// may be recognised as the same class.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, model, image, points), fields(points = points.len()))
    )]
    pub fn classify(
        &self,
        model: &FernModel,
        image: &GrayImageView<'_>,
        points: &[Point2<f32>],
    ) -> Vec<FernMatch> {
        let classes = model.class_count();
        let num_ferns = model.ferns().len();
        if classes == 0 || num_ferns == 0 {
            return Vec::new();
        }

        let identity = Matrix2::identity();
        let baseline = model.uniform_log_prob();
        let mut scores = vec![0.0f32; classes];
        let mut out = Vec::new();

        for (query_index, &pt) in points.iter().enumerate() {
            scores.iter_mut().for_each(|s| *s = 0.0);
            for (f, fern) in model.ferns().iter().enumerate() {
                let leaf = fern.leaf(image, pt, &identity);
                for (s, lp) in scores.iter_mut().zip(model.leaf_log_probs(f, leaf)) {
                    *s += lp;
                }
            }

            // First class wins ties.
            let mut best = 0usize;
            for (c, &s) in scores.iter().enumerate().skip(1) {
                if s > scores[best] {
                    best = c;
                }
            }

            let score = scores[best] / num_ferns as f32 - baseline;
            if score >= self.params.min_log_ratio {
                out.push(FernMatch {
                    query_index,
                    class_id: best,
                    score,
                });
            }
        }
        out
    }
}

/// `R(theta) * R(-phi) * diag(s * (1 + a), s * (1 - a)) * R(phi)`.
fn random_warp<R: Rng>(rng: &mut R, p: &FernParams) -> Matrix2<f32> {
    let theta = if p.max_rotation > 0.0 {
        rng.gen_range(-p.max_rotation..=p.max_rotation)
    } else {
        0.0
    };
    let scale = if p.max_scale > p.min_scale {
        rng.gen_range(p.min_scale.ln()..=p.max_scale.ln()).exp()
    } else {
        p.min_scale
    };
    let (phi, aniso) = if p.max_anisotropy > 0.0 {
        (
            rng.gen_range(0.0..std::f32::consts::PI),
            rng.gen_range(-p.max_anisotropy..=p.max_anisotropy),
        )
    } else {
        (0.0, 0.0)
    };

    let stretch = Matrix2::new(scale * (1.0 + aniso), 0.0, 0.0, scale * (1.0 - aniso));
    let axis = Rotation2::new(phi);
    Rotation2::new(theta).matrix() * axis.inverse().matrix() * stretch * axis.matrix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_object_core::{gaussian_blur, GrayImage};

    // Cells of random gray levels so every junction looks different.
    fn mosaic(size: usize, cell: usize) -> GrayImage {
        let mut img = GrayImage::filled(size, size, 0);
        for y in 0..size {
            for x in 0..size {
                let (cx, cy) = ((x / cell) as u64, (y / cell) as u64);
                let h = (cx * 73_856_093) ^ (cy * 19_349_663) ^ 0x9e37;
                let h = h.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 59;
                img.set(x, y, (20 + h * 7) as u8);
            }
        }
        gaussian_blur(&img.view(), 1.0)
    }

    fn small_params() -> FernParams {
        FernParams {
            num_ferns: 16,
            num_views: 150,
            max_rotation: 0.3,
            ..FernParams::default()
        }
    }

    fn junctions() -> Vec<Point2<f32>> {
        let mut pts = Vec::new();
        for j in 2..7 {
            for i in 2..7 {
                pts.push(Point2::new(i as f32 * 10.0, j as f32 * 10.0));
            }
        }
        pts
    }

    #[test]
    fn training_without_points_fails() {
        let img = mosaic(64, 10);
        let err = FernClassifier::default().train(&img.view(), &[]).unwrap_err();
        assert_eq!(err, FernError::NoPoints);
    }

    #[test]
    fn invalid_params_are_reported() {
        let img = mosaic(64, 10);
        let clf = FernClassifier::new(FernParams {
            depth: 0,
            ..FernParams::default()
        });
        let err = clf.train(&img.view(), &[Point2::new(5.0, 5.0)]).unwrap_err();
        assert!(matches!(err, FernError::InvalidParams(_)));
    }

    #[test]
    fn recognises_training_points_in_the_training_image() {
        let img = mosaic(96, 10);
        let pts = junctions();
        let clf = FernClassifier::new(small_params());
        let model = clf.train(&img.view(), &pts).expect("train");
        assert_eq!(model.class_count(), pts.len());

        let matches = clf.classify(&model, &img.view(), &pts);
        let correct = matches
            .iter()
            .filter(|m| m.class_id == m.query_index)
            .count();
        assert!(
            correct * 10 >= pts.len() * 8,
            "only {correct} of {} points recognised",
            pts.len()
        );
        assert!(matches.windows(2).all(|w| w[0].query_index < w[1].query_index));
    }

    #[test]
    fn training_is_deterministic() {
        let img = mosaic(64, 10);
        let pts = vec![Point2::new(20.0, 20.0), Point2::new(30.0, 40.0)];
        let clf = FernClassifier::new(FernParams {
            num_views: 20,
            ..small_params()
        });
        let a = clf.train(&img.view(), &pts).expect("train");
        let b = clf.train(&img.view(), &pts).expect("train");
        assert_eq!(a, b);
    }

    #[test]
    fn random_warps_respect_the_scale_range() {
        let p = FernParams {
            max_anisotropy: 0.0,
            ..FernParams::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let w = random_warp(&mut rng, &p);
            let s = w.determinant().sqrt();
            assert!(s >= p.min_scale - 1e-4 && s <= p.max_scale + 1e-4, "scale {s}");
        }
    }
}
