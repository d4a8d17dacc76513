use nalgebra::Point2;
use planar_object_core::Homography;
use serde::{Deserialize, Serialize};

use crate::{Correspondence, GeometryIssue};

/// Why a match was not accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// No query interest point was recognised.
    NoCorrespondences,
    /// Too few or collinear correspondences to fit a homography.
    InsufficientGeometry(GeometryIssue),
    /// The best homography is supported by fewer inliers than required.
    TooFewInliers { found: usize, needed: usize },
    /// Every RANSAC sample was degenerate.
    NoConsensus,
}

/// Output of a single match.
///
/// `homography` and `corners` are set exactly when `accepted` is true.
/// Correspondences, the inlier mask and the inlier count are kept for
/// rejected matches too, so callers can display what was found.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub accepted: bool,
    /// Maps reference coordinates to query coordinates.
    pub homography: Option<Homography>,
    /// Reference corners reprojected into the query image, same order.
    pub corners: Option<[Point2<f32>; 4]>,
    pub inlier_count: usize,
    /// Deduplicated matches, ordered by class id.
    pub correspondences: Vec<Correspondence>,
    /// Parallel to `correspondences`; empty when no fit was attempted.
    pub inlier_mask: Vec<bool>,
    pub rejection: Option<Rejection>,
}

impl DetectionResult {
    pub(crate) fn rejected(correspondences: Vec<Correspondence>, rejection: Rejection) -> Self {
        Self {
            accepted: false,
            homography: None,
            corners: None,
            inlier_count: 0,
            correspondences,
            inlier_mask: Vec::new(),
            rejection: Some(rejection),
        }
    }

    /// Correspondences consistent with the fitted homography.
    pub fn inliers(&self) -> impl Iterator<Item = &Correspondence> + '_ {
        self.correspondences
            .iter()
            .zip(&self.inlier_mask)
            .filter_map(|(c, &inlier)| inlier.then_some(c))
    }

    /// Matched `(reference, query)` point pairs, all of them.
    pub fn matched_points(&self) -> (Vec<Point2<f32>>, Vec<Point2<f32>>) {
        self.correspondences
            .iter()
            .map(|c| (c.reference, c.query))
            .unzip()
    }
}
