//! Fern layout: a fixed list of pairwise intensity comparisons.

use nalgebra::{Matrix2, Point2, Vector2};
use planar_object_core::{sample_bilinear, GrayImageView};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One binary test: is the intensity at offset `a` darker than at offset `b`?
///
/// Offsets are relative to the patch centre in the reference frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelTest {
    pub a: [f32; 2],
    pub b: [f32; 2],
}

/// A group of tests whose outcomes form a leaf index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fern {
    pub tests: Vec<PixelTest>,
}

impl Fern {
    /// Random layout with offsets inside `[-radius, radius]^2`.
    pub(crate) fn random<R: Rng>(rng: &mut R, depth: usize, radius: f32) -> Self {
        let offset = |rng: &mut R| -> [f32; 2] {
            [rng.gen_range(-radius..=radius), rng.gen_range(-radius..=radius)]
        };
        let tests = (0..depth)
            .map(|_| {
                let a = offset(rng);
                let mut b = offset(rng);
                // A test comparing a point with itself carries no information.
                while (a[0] - b[0]).abs() + (a[1] - b[1]).abs() < 1.0 {
                    b = offset(rng);
                }
                PixelTest { a, b }
            })
            .collect();
        Self { tests }
    }

    /// Leaf reached by the patch at `center`, with test offsets mapped
    /// through `warp` before sampling.
    #[inline]
    pub(crate) fn leaf(
        &self,
        img: &GrayImageView<'_>,
        center: Point2<f32>,
        warp: &Matrix2<f32>,
    ) -> usize {
        let mut leaf = 0usize;
        for t in &self.tests {
            let ia = sample_at(img, center, warp, t.a);
            let ib = sample_at(img, center, warp, t.b);
            leaf = (leaf << 1) | usize::from(ia < ib);
        }
        leaf
    }

    /// Like [`Fern::leaf`], with uniform noise in `[-noise, noise]` added to
    /// every sample. Used while training.
    #[inline]
    pub(crate) fn noisy_leaf<R: Rng>(
        &self,
        img: &GrayImageView<'_>,
        center: Point2<f32>,
        warp: &Matrix2<f32>,
        noise: f32,
        rng: &mut R,
    ) -> usize {
        if noise <= 0.0 {
            return self.leaf(img, center, warp);
        }
        let mut leaf = 0usize;
        for t in &self.tests {
            let ia = sample_at(img, center, warp, t.a) + rng.gen_range(-noise..=noise);
            let ib = sample_at(img, center, warp, t.b) + rng.gen_range(-noise..=noise);
            leaf = (leaf << 1) | usize::from(ia < ib);
        }
        leaf
    }
}

#[inline]
fn sample_at(
    img: &GrayImageView<'_>,
    center: Point2<f32>,
    warp: &Matrix2<f32>,
    offset: [f32; 2],
) -> f32 {
    let d = warp * Vector2::new(offset[0], offset[1]);
    sample_bilinear(img, center.x + d.x, center.y + d.y)
}
