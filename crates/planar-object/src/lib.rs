//! High-level facade crate for the `planar-object-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the underlying crates
//! - (feature-gated) helpers that run the detector on `image::GrayImage`
//!   inputs and drive a whole train-then-detect run from a JSON config.
//!
//! ## Quickstart
//!
//! ```no_run
//! use planar_object::detect;
//! use planar_object::PlanarObjectDetector;
//! use planar_object::core::Rect;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reference = detect::load_gray("poster.png")?;
//! let frame = detect::load_gray("frame.png")?;
//!
//! let mut detector: PlanarObjectDetector = PlanarObjectDetector::default();
//! let roi = Rect::new(40, 30, 160, 120)?;
//! detector.build_reference_rect(&detect::gray_view(&reference), roi)?;
//!
//! let result = detector.detect(&detect::gray_view(&frame))?;
//! println!("found: {} corners: {:?}", result.accepted, result.corners);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `planar_object::core`: images, interest points, homographies and regions.
//! - `planar_object::fern`: the randomized fern point classifier.
//! - `planar_object::detector`: the detector facade, RANSAC and persistence.
//! - `planar_object::detect` (feature `image`): helpers for `image::GrayImage`.

pub use planar_object_core as core;
pub use planar_object_detector as detector;
pub use planar_object_fern as fern;

pub use planar_object_detector::{
    DetectConfig, DetectReport, DetectionResult, DetectorState, PlanarDetectorParams,
    PlanarObjectDetector, PointClassifier, Rejection,
};
pub use planar_object_fern::{FernClassifier, FernParams};

#[cfg(feature = "image")]
pub mod detect;
