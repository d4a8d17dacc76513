#![allow(dead_code)]

use nalgebra::{Matrix3, Point2};
use planar_object_core::{warp_perspective_gray, GrayImage, Homography, Rect};
use planar_object_detector::{
    FernClassifier, FernParams, PlanarDetectorParams, PlanarObjectDetector,
};

pub const REF_SIZE: usize = 120;
pub const CELL: usize = 12;
pub const QUERY_SIZE: usize = 240;
pub const BACKGROUND: u8 = 128;

/// Reference region used throughout: origin (10, 10), 100 × 100.
pub fn reference_rect() -> Rect {
    Rect::new(10, 10, 100, 100).expect("valid rect")
}

fn cell_level(cx: usize, cy: usize) -> u8 {
    let h = (cx as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ (cy as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f);
    let h = (h ^ (h >> 29)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    let level = (h >> 61) as u8; // 0..8
    20 + level * 30
}

/// Checkerboard whose cells carry pseudo-random gray levels, so that every
/// junction has a distinctive neighbourhood.
pub fn textured_checkerboard(width: usize, height: usize, cell: usize) -> GrayImage {
    let mut img = GrayImage::filled(width, height, 0);
    for y in 0..height {
        for x in 0..width {
            img.set(x, y, cell_level(x / cell, y / cell));
        }
    }
    img
}

pub fn reference_image() -> GrayImage {
    textured_checkerboard(REF_SIZE, REF_SIZE, CELL)
}

/// Reference-to-query similarity: scale about the region centre, rotate and
/// move the centre to the middle of the query canvas.
pub fn query_transform(scale: f64, angle_deg: f64) -> Homography {
    let (s, c) = angle_deg.to_radians().sin_cos();
    let (rcx, rcy) = (60.0, 60.0);
    let (qcx, qcy) = (QUERY_SIZE as f64 / 2.0, QUERY_SIZE as f64 / 2.0);
    let a = scale * c;
    let b = scale * s;
    Homography::new(Matrix3::new(
        a,
        -b,
        qcx - a * rcx + b * rcy,
        b,
        a,
        qcy - b * rcx - a * rcy,
        0.0,
        0.0,
        1.0,
    ))
}

/// Render the reference region alone, seen through `h_query_from_ref`.
///
/// Pixels of the region for which `keep` returns false (reference
/// coordinates) are painted black before warping.
pub fn render_query_masked(
    reference: &GrayImage,
    h_query_from_ref: Homography,
    keep: impl Fn(usize, usize) -> bool,
) -> GrayImage {
    let roi = reference_rect();
    let mut patch = GrayImage::filled(reference.width, reference.height, BACKGROUND);
    for y in 0..reference.height {
        for x in 0..reference.width {
            if !roi.contains(Point2::new(x as f32, y as f32)) {
                continue;
            }
            let v = if keep(x, y) {
                reference.data[y * reference.width + x]
            } else {
                0
            };
            patch.set(x, y, v);
        }
    }
    let h_ref_from_query = h_query_from_ref.inverse().expect("invertible");
    warp_perspective_gray(
        &patch.view(),
        h_ref_from_query,
        QUERY_SIZE,
        QUERY_SIZE,
        BACKGROUND,
    )
}

pub fn render_query(reference: &GrayImage, h_query_from_ref: Homography) -> GrayImage {
    render_query_masked(reference, h_query_from_ref, |_, _| true)
}

/// Fern settings tuned for the moderate viewpoint changes used in tests.
pub fn test_fern_params() -> FernParams {
    FernParams {
        num_ferns: 24,
        num_views: 300,
        max_rotation: 0.6,
        ..FernParams::default()
    }
}

pub fn test_params() -> PlanarDetectorParams {
    let mut params = PlanarDetectorParams::default();
    params.keypoints.max_points = 200;
    params
}

pub fn test_detector() -> PlanarObjectDetector {
    PlanarObjectDetector::new(FernClassifier::new(test_fern_params()), test_params())
}

/// Detector with the reference region of [`reference_image`] already learned.
pub fn trained_detector() -> (PlanarObjectDetector, GrayImage) {
    let reference = reference_image();
    let mut detector = test_detector();
    let n = detector
        .build_reference_rect(&reference.view(), reference_rect())
        .expect("build reference");
    assert!(n >= 30, "only {n} reference points");
    (detector, reference)
}

pub fn max_corner_error(a: &[Point2<f32>; 4], b: &[Point2<f32>; 4]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(p, q)| (p - q).norm())
        .fold(0.0, f32::max)
}
