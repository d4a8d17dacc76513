//! Planar object detection pipeline.
//!
//! This module wires together interest point extraction, the point
//! classifier, duplicate removal and robust homography fitting, and keeps
//! the reference model plus the outcome of the last match.

mod error;
mod matching;
mod model;
mod params;
mod pipeline;
mod reference;
mod result;

pub use error::DetectError;
pub use model::ReferenceModel;
pub use params::PlanarDetectorParams;
pub use pipeline::{DetectorState, PlanarObjectDetector};
pub use result::{DetectionResult, Rejection};
