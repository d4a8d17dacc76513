use nalgebra::Point2;
use planar_object_core::Rect;
use serde::{Deserialize, Serialize};

/// Everything learned from the reference image.
///
/// Built in one piece by the reference builder or read from an archive, and
/// replaced as a whole; the detector never edits it in place. The reference
/// points live only in the classifier state, see
/// [`crate::PointClassifier::reference_points`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceModel<M> {
    /// Trained classifier state.
    pub classifier: M,
    /// Reference region corners, top-left, top-right, bottom-right, bottom-left.
    pub corners: [Point2<f32>; 4],
    pub roi: Rect,
    /// `[width, height]` of the reference image.
    pub image_size: [usize; 2],
}
