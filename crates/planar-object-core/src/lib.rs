//! Core types and utilities for planar object detection.
//!
//! This crate is intentionally small and purely geometric. It knows about
//! grayscale buffers, homographies, regions of interest and interest points,
//! but nothing about classifiers or the detection pipeline built on top.

mod homography;
mod image;
mod keypoints;
mod logger;
mod roi;

pub use homography::{
    estimate_homography, homography_from_4pt, points_are_collinear, warp_perspective_gray,
    Homography,
};
pub use image::{gaussian_blur, sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use keypoints::{detect_harris_keypoints, Keypoint, KeypointParams};
pub use roi::{bounding_rectangle, Quad, Rect, RoiError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
