mod common;

use common::*;
use planar_object_detector::{DetectorState, Rejection};

#[test]
fn finds_scaled_and_rotated_patch() {
    let (mut detector, reference) = trained_detector();
    let h_true = query_transform(1.2, 15.0);
    let query = render_query(&reference, h_true);

    let found = detector.match_point(&query.view()).expect("match");
    let result = detector.last_result().expect("result recorded").clone();
    assert!(
        found,
        "rejected: {:?} with {} correspondences",
        result.rejection,
        result.correspondences.len()
    );
    assert_eq!(detector.state(), DetectorState::Matched);
    assert!(result.inlier_count >= detector.min_inlier_count());
    assert_eq!(result.inlier_mask.len(), result.correspondences.len());
    assert_eq!(result.inliers().count(), result.inlier_count);

    let reference_corners = detector.reference_corners().expect("model");
    let expected = h_true.apply_quad(&reference_corners);
    let corners = detector.detected_corners().expect("corners");
    let err = max_corner_error(&corners, &expected);
    assert!(err < 4.0, "corner error {err:.2} px: {corners:?} vs {expected:?}");

    // The reported corners are exactly the reference corners pushed through
    // the reported homography.
    let h = detector.homography().expect("homography");
    assert_eq!(h.apply_quad(&reference_corners), corners);
}

#[test]
fn corners_keep_reference_order() {
    let (mut detector, reference) = trained_detector();
    let query = render_query(&reference, query_transform(1.0, 8.0));
    assert!(detector.match_point(&query.view()).expect("match"));
    let [tl, tr, br, bl] = detector.detected_corners().expect("corners");
    // Small rotation: top-left stays top-left, and so on.
    assert!(tl.x < tr.x && tl.y < bl.y);
    assert!(br.x > bl.x && br.y > tr.y);
}

#[test]
fn occluded_patch_is_not_accepted() {
    let (mut detector, reference) = trained_detector();
    let h_true = query_transform(1.2, 15.0);

    let clear = detector
        .detect(&render_query(&reference, h_true).view())
        .expect("match clear view");
    assert!(clear.accepted);

    // Keep a strip of 20 % of the region width, black out the rest.
    let occluded_query = render_query_masked(&reference, h_true, |x, _| x < 30);
    assert_eq!(detector.min_inlier_count(), 10);
    let found = detector.match_point(&occluded_query.view()).expect("match");
    let occluded = detector.last_result().expect("result");

    assert!(!found);
    assert!(!occluded.accepted);
    assert!(occluded.correspondences.len() < clear.correspondences.len());
    assert!(occluded.inlier_count < clear.inlier_count);
    assert!(occluded.homography.is_none());
    assert!(detector.detected_corners().is_none());
    assert!(detector.homography().is_none());
    assert_eq!(detector.state(), DetectorState::Ready);
}

#[test]
fn inlier_threshold_flips_the_outcome() {
    let (mut detector, reference) = trained_detector();
    let query = render_query(&reference, query_transform(1.2, 15.0));

    assert!(detector.match_point(&query.view()).expect("match"));
    let inliers = detector.last_result().expect("result").inlier_count;

    detector.set_min_inlier_count(inliers + 1);
    assert!(!detector.match_point(&query.view()).expect("match"));
    assert_eq!(
        detector.last_result().and_then(|r| r.rejection),
        Some(Rejection::TooFewInliers {
            found: inliers,
            needed: inliers + 1
        })
    );
    assert!(detector.detected_corners().is_none());

    detector.set_min_inlier_count(inliers);
    assert!(detector.match_point(&query.view()).expect("match"));
    assert_eq!(detector.last_result().expect("result").inlier_count, inliers);
}

#[test]
fn blank_query_has_no_correspondences() {
    let (mut detector, _) = trained_detector();
    let blank = planar_object_core::GrayImage::filled(QUERY_SIZE, QUERY_SIZE, BACKGROUND);
    assert!(!detector.match_point(&blank.view()).expect("match"));
    let result = detector.last_result().expect("result");
    assert!(result.correspondences.is_empty());
    assert_eq!(result.rejection, Some(Rejection::NoCorrespondences));
    assert!(result.inlier_mask.is_empty());
}

#[test]
fn tiny_region_never_reaches_the_solver() {
    let (mut detector, reference) = trained_detector();
    let query = render_query(&reference, query_transform(1.2, 15.0));
    let rect = planar_object_core::Rect::new(118, 118, 4, 4).expect("valid");
    assert!(!detector.match_point_rect(&query.view(), rect).expect("match"));
    let result = detector.last_result().expect("result");
    assert!(result.correspondences.len() < 4);
    assert!(matches!(
        result.rejection,
        Some(Rejection::NoCorrespondences) | Some(Rejection::InsufficientGeometry(_))
    ));
    assert!(result.homography.is_none());
}

#[test]
fn detect_can_run_from_several_threads() {
    let (detector, reference) = trained_detector();
    let a = render_query(&reference, query_transform(1.2, 15.0));
    let b = render_query(&reference, query_transform(0.9, -10.0));

    let (ra, rb) = std::thread::scope(|s| {
        let ha = s.spawn(|| detector.detect(&a.view()));
        let hb = s.spawn(|| detector.detect(&b.view()));
        (
            ha.join().expect("thread a"),
            hb.join().expect("thread b"),
        )
    });
    assert!(ra.expect("detect a").accepted);
    assert!(rb.expect("detect b").accepted);
    // `detect` leaves the recorded state alone.
    assert!(detector.last_result().is_none());
}
