use crate::{sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Planar projective transform, `dst ~ h * src`, normalized so `h[(2, 2)] == 1`
/// whenever it is produced by one of the estimators in this module.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    /// Map four ordered corners at once (order is preserved).
    pub fn apply_quad(&self, corners: &[Point2<f32>; 4]) -> [Point2<f32>; 4] {
        corners.map(|p| self.apply(p))
    }

    /// Euclidean distance between `apply(src)` and `dst`, in `dst` units.
    ///
    /// Points mapped to infinity yield `f64::INFINITY`.
    #[inline]
    pub fn reprojection_error(&self, src: Point2<f32>, dst: Point2<f32>) -> f64 {
        let v = self.h * Vector3::new(src.x as f64, src.y as f64, 1.0);
        if v[2].abs() < 1e-12 {
            return f64::INFINITY;
        }
        let dx = v[0] / v[2] - dst.x as f64;
        let dy = v[1] / v[2] - dst.y as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Similarity that moves a point set to its centroid and scales it so the
/// mean distance from the origin is sqrt(2). Conditions the DLT systems.
struct Conditioner {
    t: Matrix3<f64>,
    points: Vec<Point2<f64>>,
}

impl Conditioner {
    fn new(pts: &[Point2<f32>]) -> Self {
        let n = pts.len() as f64;
        let centroid = pts
            .iter()
            .fold(Vector2::zeros(), |acc: Vector2<f64>, p| {
                acc + Vector2::new(p.x as f64, p.y as f64)
            })
            / n;
        let spread = pts
            .iter()
            .map(|p| (Vector2::new(p.x as f64, p.y as f64) - centroid).norm())
            .sum::<f64>()
            / n;
        let s = if spread > 1e-12 {
            std::f64::consts::SQRT_2 / spread
        } else {
            1.0
        };
        let points = pts
            .iter()
            .map(|p| Point2::new(s * (p.x as f64 - centroid.x), s * (p.y as f64 - centroid.y)))
            .collect();
        let t = Matrix3::new(
            s, 0.0, -s * centroid.x, //
            0.0, s, -s * centroid.y, //
            0.0, 0.0, 1.0,
        );
        Self { t, points }
    }
}

/// Undo both conditioners and scale so that `h[(2, 2)] == 1`.
fn uncondition(hn: Matrix3<f64>, src: &Conditioner, dst: &Conditioner) -> Option<Homography> {
    let h = dst.t.try_inverse()? * hn * src.t;
    let w = h[(2, 2)];
    if w.abs() < 1e-12 || h.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Homography::new(h / w))
}

/// Least-squares DLT estimate of `H` such that `dst ~ H * src`.
///
/// Needs at least 4 correspondences; exactly 4 goes through
/// [`homography_from_4pt`]. Returns `None` for mismatched inputs or a
/// numerically degenerate configuration.
pub fn estimate_homography(src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if let (Ok(s4), Ok(d4)) = (
        <&[Point2<f32>; 4]>::try_from(src),
        <&[Point2<f32>; 4]>::try_from(dst),
    ) {
        return homography_from_4pt(s4, d4);
    }

    let cs = Conditioner::new(src);
    let cd = Conditioner::new(dst);

    // Two rows per pair, unknowns h11..h33:
    //   [x y 1 0 0 0 -ux -uy -u]
    //   [0 0 0 x y 1 -vx -vy -v]
    let mut a = DMatrix::<f64>::zeros(2 * src.len(), 9);
    for (k, (p, q)) in cs.points.iter().zip(&cd.points).enumerate() {
        let row = [p.x, p.y, 1.0];
        for (j, &r) in row.iter().enumerate() {
            a[(2 * k, j)] = r;
            a[(2 * k + 1, 3 + j)] = r;
            a[(2 * k, 6 + j)] = -q.x * r;
            a[(2 * k + 1, 6 + j)] = -q.y * r;
        }
    }

    // Null vector: right singular vector of the smallest singular value.
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|l, r| l.1.total_cmp(r.1))
        .map(|(i, _)| i)?;
    let hn = Matrix3::from_iterator(v_t.row(smallest).iter().copied()).transpose();

    uncondition(hn, &cs, &cd)
}

/// Exact `H` such that `dst ~ H * src` from 4 correspondences (`h33 = 1`).
///
/// Corner order must be consistent between `src` and `dst`.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let cs = Conditioner::new(src);
    let cd = Conditioner::new(dst);

    // Fixing h33 = 1 leaves an 8x8 linear system.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (p, q)) in cs.points.iter().zip(&cd.points).enumerate() {
        let (ru, rv) = (2 * k, 2 * k + 1);
        a.fixed_view_mut::<1, 3>(ru, 0).copy_from_slice(&[p.x, p.y, 1.0]);
        a.fixed_view_mut::<1, 3>(rv, 3).copy_from_slice(&[p.x, p.y, 1.0]);
        a.fixed_view_mut::<1, 2>(ru, 6).copy_from_slice(&[-q.x * p.x, -q.x * p.y]);
        a.fixed_view_mut::<1, 2>(rv, 6).copy_from_slice(&[-q.y * p.x, -q.y * p.y]);
        b[ru] = q.x;
        b[rv] = q.y;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );
    uncondition(hn, &cs, &cd)
}

/// `true` when every point lies within `tol_px` (RMS) of a single line.
///
/// Fewer than 3 points are always collinear.
pub fn points_are_collinear(pts: &[Point2<f32>], tol_px: f64) -> bool {
    if pts.len() < 3 {
        return true;
    }
    let n = pts.len() as f64;
    let (cx, cy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| {
        (sx + p.x as f64, sy + p.y as f64)
    });
    let (cx, cy) = (cx / n, cy / n);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in pts {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let (sxx, syy, sxy) = (sxx / n, syy / n, sxy / n);

    // Smallest eigenvalue of the 2x2 scatter = variance across the best line.
    let half_trace = 0.5 * (sxx + syy);
    let disc = (0.25 * (sxx - syy) * (sxx - syy) + sxy * sxy).sqrt();
    let lambda_min = (half_trace - disc).max(0.0);
    lambda_min.sqrt() <= tol_px
}

/// Render an `out_w × out_h` image whose pixel `p` takes the value of
/// `src` at `h_src_from_dst * p`. Pixels mapping outside `src` get `fill`.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_src_from_dst: Homography,
    out_w: usize,
    out_h: usize,
    fill: u8,
) -> GrayImage {
    let mut out = vec![fill; out_w * out_h];
    let max_x = src.width as f32 - 1.0;
    let max_y = src.height as f32 - 1.0;

    for y in 0..out_h {
        for x in 0..out_w {
            let ps = h_src_from_dst.apply(Point2::new(x as f32, y as f32));
            if ps.x < 0.0 || ps.y < 0.0 || ps.x > max_x || ps.y > max_y || !ps.x.is_finite() {
                continue;
            }
            out[y * out_w + x] = sample_bilinear_u8(src, ps.x, ps.y);
        }
    }

    GrayImage {
        width: out_w,
        height: out_h,
        data: out,
    }
}
