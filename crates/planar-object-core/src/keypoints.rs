//! Harris interest points restricted to a region of interest.
//!
//! The detector works on an already smoothed image: Sobel gradients, a box
//! windowed structure tensor, `R = det(M) - k * trace(M)^2`, a relative
//! threshold against the strongest response inside the ROI, square
//! non-maximum suppression and a parabolic sub-pixel refinement.

use crate::{GrayImageView, Rect};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A detected interest point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub position: Point2<f32>,
    pub response: f32,
}

/// Harris detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypointParams {
    /// Harris sensitivity constant.
    pub k: f32,
    /// Half-size of the structure tensor window (2 → 5×5).
    pub window_radius: usize,
    /// Keep responses above `threshold_rel * max_response` (ROI-local maximum).
    pub threshold_rel: f32,
    /// Half-size of the non-maximum suppression neighbourhood.
    pub nms_radius: usize,
    /// Minimum distance to the image border in pixels.
    pub border: usize,
    /// Keep at most this many points, strongest first.
    pub max_points: usize,
}

impl Default for KeypointParams {
    fn default() -> Self {
        Self {
            k: 0.04,
            window_radius: 2,
            threshold_rel: 0.01,
            nms_radius: 3,
            border: 4,
            max_points: 100,
        }
    }
}

struct ResponseMap {
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ResponseMap {
    #[inline]
    fn at(&self, gx: usize, gy: usize) -> f32 {
        if gx < self.x0 || gy < self.y0 || gx >= self.x0 + self.width || gy >= self.y0 + self.height
        {
            return f32::NEG_INFINITY;
        }
        self.data[(gy - self.y0) * self.width + (gx - self.x0)]
    }
}

fn harris_response(img: &GrayImageView<'_>, roi: Rect, params: &KeypointParams) -> ResponseMap {
    let pad = params.window_radius + 2;
    let x0 = (roi.x().max(0) as usize).saturating_sub(pad);
    let y0 = (roi.y().max(0) as usize).saturating_sub(pad);
    let x1 = ((roi.x() + roi.width()).max(0) as usize + pad).min(img.width);
    let y1 = ((roi.y() + roi.height()).max(0) as usize + pad).min(img.height);
    let width = x1.saturating_sub(x0);
    let height = y1.saturating_sub(y0);

    let pix = |x: isize, y: isize| -> f32 {
        let cx = x.clamp(0, img.width as isize - 1) as usize;
        let cy = y.clamp(0, img.height as isize - 1) as usize;
        img.data[cy * img.width + cx] as f32
    };

    let n = width * height;
    let (mut ixx, mut iyy, mut ixy) = (vec![0.0f32; n], vec![0.0f32; n], vec![0.0f32; n]);
    for ly in 0..height {
        for lx in 0..width {
            let x = (x0 + lx) as isize;
            let y = (y0 + ly) as isize;
            let gx = (pix(x + 1, y - 1) + 2.0 * pix(x + 1, y) + pix(x + 1, y + 1)
                - pix(x - 1, y - 1)
                - 2.0 * pix(x - 1, y)
                - pix(x - 1, y + 1))
                / 8.0;
            let gy = (pix(x - 1, y + 1) + 2.0 * pix(x, y + 1) + pix(x + 1, y + 1)
                - pix(x - 1, y - 1)
                - 2.0 * pix(x, y - 1)
                - pix(x + 1, y - 1))
                / 8.0;
            let i = ly * width + lx;
            ixx[i] = gx * gx;
            iyy[i] = gy * gy;
            ixy[i] = gx * gy;
        }
    }

    let r = params.window_radius as isize;
    let mut data = vec![0.0f32; n];
    for ly in 0..height as isize {
        for lx in 0..width as isize {
            let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
            for dy in -r..=r {
                let yy = ly + dy;
                if yy < 0 || yy >= height as isize {
                    continue;
                }
                for dx in -r..=r {
                    let xx = lx + dx;
                    if xx < 0 || xx >= width as isize {
                        continue;
                    }
                    let i = yy as usize * width + xx as usize;
                    a += ixx[i];
                    b += iyy[i];
                    c += ixy[i];
                }
            }
            let det = a * b - c * c;
            let trace = a + b;
            data[ly as usize * width + lx as usize] = det - params.k * trace * trace;
        }
    }

    ResponseMap {
        x0,
        y0,
        width,
        height,
        data,
    }
}

// Offset of the vertex of the parabola through (-1, m), (0, c), (1, p).
#[inline]
fn parabola_peak(m: f32, c: f32, p: f32) -> f32 {
    let denom = m - 2.0 * c + p;
    if !denom.is_finite() || denom >= -f32::EPSILON {
        return 0.0;
    }
    (0.5 * (m - p) / denom).clamp(-0.5, 0.5)
}

/// Detect Harris interest points whose pixel lies inside `roi`.
///
/// `roi` is expected to be validated against the image already; pixels
/// outside the image are ignored regardless.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, params), fields(width = img.width, height = img.height))
)]
pub fn detect_harris_keypoints(
    img: &GrayImageView<'_>,
    roi: Rect,
    params: &KeypointParams,
) -> Vec<Keypoint> {
    if roi.is_empty() || img.width == 0 || img.height == 0 || params.max_points == 0 {
        return Vec::new();
    }

    let map = harris_response(img, roi, params);
    let border = params.border;
    let gx0 = (roi.x().max(0) as usize).max(border);
    let gy0 = (roi.y().max(0) as usize).max(border);
    let gx1 = ((roi.x() + roi.width()).max(0) as usize).min(img.width.saturating_sub(border));
    let gy1 = ((roi.y() + roi.height()).max(0) as usize).min(img.height.saturating_sub(border));
    if gx0 >= gx1 || gy0 >= gy1 {
        return Vec::new();
    }

    let mut max_response = 0.0f32;
    for y in gy0..gy1 {
        for x in gx0..gx1 {
            max_response = max_response.max(map.at(x, y));
        }
    }
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = params.threshold_rel * max_response;

    let nms = params.nms_radius as isize;
    let mut out = Vec::new();
    for y in gy0..gy1 {
        'pixel: for x in gx0..gx1 {
            let r = map.at(x, y);
            if r <= threshold || r <= 0.0 {
                continue;
            }
            for dy in -nms..=nms {
                for dx in -nms..=nms {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as isize + dx;
                    let ny = y as isize + dy;
                    if nx < 0 || ny < 0 {
                        continue;
                    }
                    let rn = map.at(nx as usize, ny as usize);
                    // Plateaus keep the first pixel in raster order.
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if rn > r || (rn == r && earlier) {
                        continue 'pixel;
                    }
                }
            }

            let ox = parabola_peak(map.at(x.wrapping_sub(1), y), r, map.at(x + 1, y));
            let oy = parabola_peak(map.at(x, y.wrapping_sub(1)), r, map.at(x, y + 1));
            out.push(Keypoint {
                position: Point2::new(x as f32 + ox, y as f32 + oy),
                response: r,
            });
        }
    }

    out.sort_by(|a, b| b.response.total_cmp(&a.response));
    out.truncate(params.max_points);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gaussian_blur, GrayImage};

    fn quadrant_image(size: usize) -> GrayImage {
        let mut img = GrayImage::filled(size, size, 30);
        let half = size / 2;
        for y in 0..size {
            for x in 0..size {
                let v = match (x < half, y < half) {
                    (true, true) => 30,
                    (false, true) => 200,
                    (true, false) => 120,
                    (false, false) => 60,
                };
                img.set(x, y, v);
            }
        }
        img
    }

    #[test]
    fn finds_the_junction_of_four_quadrants() {
        let img = gaussian_blur(&quadrant_image(40).view(), 1.0);
        let roi = Rect::full(40, 40);
        let kps = detect_harris_keypoints(&img.view(), roi, &KeypointParams::default());
        assert!(!kps.is_empty());
        let best = kps[0].position;
        assert!((best.x - 19.5).abs() < 1.5, "x = {}", best.x);
        assert!((best.y - 19.5).abs() < 1.5, "y = {}", best.y);
    }

    #[test]
    fn respects_the_region_of_interest() {
        let img = gaussian_blur(&quadrant_image(40).view(), 1.0);
        let roi = Rect::new(0, 0, 10, 10).expect("valid");
        let kps = detect_harris_keypoints(&img.view(), roi, &KeypointParams::default());
        assert!(kps.iter().all(|k| k.position.x < 11.0 && k.position.y < 11.0));
        assert!(kps.iter().all(|k| (k.position.x - 19.5).abs() > 3.0));
    }

    #[test]
    fn flat_image_has_no_keypoints() {
        let img = GrayImage::filled(32, 32, 90);
        let kps = detect_harris_keypoints(&img.view(), Rect::full(32, 32), &KeypointParams::default());
        assert!(kps.is_empty());
    }

    #[test]
    fn max_points_caps_the_output() {
        let img = gaussian_blur(&quadrant_image(40).view(), 1.0);
        let params = KeypointParams {
            max_points: 1,
            ..KeypointParams::default()
        };
        let kps = detect_harris_keypoints(&img.view(), Rect::full(40, 40), &params);
        assert!(kps.len() <= 1);
    }
}
