//! Planar object detection on top of a trained point classifier.
//!
//! A reference region of one image is learned once: its interest points are
//! used to train a [`PointClassifier`] and its four corners are stored. Each
//! query image is then searched for those points, duplicate matches are
//! removed, and a RANSAC homography maps the reference corners into the
//! query image when enough matches agree.
//!
//! ```no_run
//! use planar_object_core::GrayImage;
//! use planar_object_detector::PlanarObjectDetector;
//! use nalgebra::Point2;
//!
//! # fn main() -> Result<(), planar_object_detector::DetectError> {
//! let reference = GrayImage::filled(320, 240, 0);
//! let frame = GrayImage::filled(320, 240, 0);
//!
//! let mut detector: PlanarObjectDetector = PlanarObjectDetector::default();
//! detector.build_reference_in(&reference.view(), Point2::new(40, 30), 120, 160)?;
//! if detector.match_point(&frame.view())? {
//!     println!("corners: {:?}", detector.detected_corners());
//! }
//! detector.record_detector("poster", "models.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! The shipped classifier is the fern classifier from `planar-object-fern`.

mod classifier;
mod detector;
mod io;
mod persistence;
mod ransac;

pub use classifier::{dedup_by_reference, ClassifierError, Correspondence, PointClassifier};
pub use detector::{
    DetectError, DetectionResult, DetectorState, PlanarDetectorParams, PlanarObjectDetector,
    ReferenceModel, Rejection,
};
pub use io::{rect_from_spec, DetectConfig, DetectIoError, DetectReport, QueryReport, RoiSpec};
pub use persistence::{read_record, record_names, write_record, PersistenceError, ARCHIVE_VERSION};
pub use ransac::{
    estimate_homography_ransac, EstimateError, GeometryIssue, RansacFit, RansacParams,
};

pub use planar_object_core::{GrayImage, GrayImageView, Homography, Quad, Rect, RoiError};
pub use planar_object_fern::{FernClassifier, FernModel, FernParams};
