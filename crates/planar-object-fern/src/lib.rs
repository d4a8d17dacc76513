//! Randomized fern classifier for interest-point recognition.
//!
//! A fern is a short list of pixel-pair intensity comparisons; their outcomes
//! index a leaf. Training renders many random affine views of each reference
//! point and counts which leaves every point reaches. Recognition combines
//! the per-fern log posteriors under a naive Bayes assumption and reports the
//! most likely reference point.
//!
//! ```no_run
//! use nalgebra::Point2;
//! use planar_object_core::GrayImage;
//! use planar_object_fern::{FernClassifier, FernParams};
//!
//! # fn main() -> Result<(), planar_object_fern::FernError> {
//! let img = GrayImage::filled(64, 64, 0);
//! let points = [Point2::new(20.0, 20.0), Point2::new(40.0, 30.0)];
//! let clf = FernClassifier::new(FernParams::default());
//! let model = clf.train(&img.view(), &points)?;
//! let matches = clf.classify(&model, &img.view(), &points);
//! println!("{} points recognised", matches.len());
//! # Ok(())
//! # }
//! ```

mod classifier;
mod fern;
mod model;
mod params;

pub use classifier::{FernClassifier, FernError, FernMatch};
pub use fern::{Fern, PixelTest};
pub use model::{FernModel, ModelError};
pub use params::FernParams;
