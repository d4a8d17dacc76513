//! Helpers that run the detector on `image` crate buffers.

use std::path::{Path, PathBuf};

use crate::core::{self, Rect, RoiError};
use crate::detector::{
    DetectConfig, DetectIoError, DetectReport, DetectionResult, PlanarObjectDetector,
    PointClassifier, QueryReport,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error("failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },

    #[error("no interest points found in the reference region of {0}")]
    EmptyReference(String),

    #[error(transparent)]
    Region(#[from] RoiError),

    #[error(transparent)]
    Detector(#[from] crate::detector::DetectError),

    #[error(transparent)]
    Io(#[from] DetectIoError),
}

/// Convert an `image::GrayImage` into the lightweight `planar-object-core` view type.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Copy a `planar-object-core` image into an `image::GrayImage`.
pub fn to_gray_image(img: &core::GrayImage) -> Result<::image::GrayImage, DetectError> {
    let width = u32::try_from(img.width).unwrap_or(u32::MAX);
    let height = u32::try_from(img.height).unwrap_or(u32::MAX);
    gray_image_from_slice(width, height, &img.data)
}

/// Build an `image::GrayImage` from a row-major 8-bit buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    let w = usize::try_from(width).ok();
    let h = usize::try_from(height).ok();
    let Some((w, h)) = w.zip(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    let Some(expected) = w.checked_mul(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::InvalidGrayDimensions { width, height })
}

/// Open any image format `image` understands and convert it to 8-bit gray.
pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, DetectError> {
    let path = path.as_ref();
    let img = ::image::open(path).map_err(|source| DetectError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_luma8())
}

/// Learn `roi` of `img` (the whole image when `None`) as the reference patch.
pub fn build_reference_from_image<C: PointClassifier>(
    detector: &mut PlanarObjectDetector<C>,
    img: &::image::GrayImage,
    roi: Option<Rect>,
) -> Result<usize, DetectError> {
    let view = gray_view(img);
    let roi = roi.unwrap_or_else(|| Rect::full(view.width, view.height));
    Ok(detector.build_reference_rect(&view, roi)?)
}

/// Search `img` for the reference patch without touching the detector state.
///
/// `roi` overrides the detector's own match region.
pub fn match_image<C: PointClassifier>(
    detector: &PlanarObjectDetector<C>,
    img: &::image::GrayImage,
    roi: Option<Rect>,
) -> Result<DetectionResult, DetectError> {
    let view = gray_view(img);
    let result = match roi {
        Some(rect) => detector.detect_in_rect(&view, rect)?,
        None => detector.detect(&view)?,
    };
    Ok(result)
}

/// Train on the configured reference image, optionally record the model,
/// then search every query image.
///
/// A query that cannot be read or matched is reported with its error and
/// does not stop the run.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(cfg), fields(queries = cfg.query_images.len()))
)]
pub fn run_config(cfg: &DetectConfig) -> Result<DetectReport, DetectError> {
    let mut detector = cfg.build_detector();
    let reference = load_gray(&cfg.reference_image)?;
    let reference_points =
        build_reference_from_image(&mut detector, &reference, cfg.reference_rect()?)?;
    if reference_points == 0 {
        return Err(DetectError::EmptyReference(cfg.reference_image.clone()));
    }
    log::info!(
        "learned {reference_points} reference points from {}",
        cfg.reference_image
    );

    if let Some(model_path) = &cfg.model_path {
        detector.record_detector(&cfg.record_name, model_path)?;
    }

    let query_rect = cfg.query_rect()?;
    let queries = cfg
        .query_images
        .iter()
        .map(|path| {
            let outcome = load_gray(path).and_then(|img| match_image(&detector, &img, query_rect));
            match outcome {
                Ok(result) => {
                    log::info!(
                        "{path}: {} ({} of {} correspondences are inliers)",
                        if result.accepted { "found" } else { "not found" },
                        result.inlier_count,
                        result.correspondences.len()
                    );
                    QueryReport::from_result(path.clone(), &result)
                }
                Err(err) => {
                    log::warn!("{path}: {err}");
                    QueryReport::failed(path.clone(), err)
                }
            }
        })
        .collect();

    Ok(DetectReport {
        reference_image: cfg.reference_image.clone(),
        reference_points,
        reference_corners: detector
            .reference_corners()
            .map(|corners| corners.map(|p| [p.x, p.y])),
        queries,
    })
}
