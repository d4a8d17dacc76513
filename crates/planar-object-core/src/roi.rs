//! Regions of interest: validated rectangles and ordered quadrilaterals.
//!
//! Both types are plain values. A [`Rect`] is checked for a non-negative size
//! when it is built and against image bounds where it is used, so the same
//! rectangle can be reused across images of different sizes.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Errors produced while resolving a region of interest.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiError {
    #[error("negative region size (width={width}, height={height})")]
    NegativeSize { width: i32, height: i32 },
    #[error("region {rect:?} exceeds image bounds {image_width}x{image_height}")]
    OutOfBounds {
        rect: Rect,
        image_width: usize,
        image_height: usize,
    },
}

/// Axis-aligned rectangle in integer pixel coordinates.
///
/// Covers `x..x + width` horizontally and `y..y + height` vertically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RectRecord")]
pub struct Rect {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

#[derive(Deserialize)]
struct RectRecord {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl TryFrom<RectRecord> for Rect {
    type Error = RoiError;

    fn try_from(r: RectRecord) -> Result<Self, RoiError> {
        Rect::new(r.x, r.y, r.width, r.height)
    }
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self, RoiError> {
        if width < 0 || height < 0 {
            return Err(RoiError::NegativeSize { width, height });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Rectangle anchored at its top-left `origin`.
    pub fn from_point_and_size(
        origin: Point2<i32>,
        height: i32,
        width: i32,
    ) -> Result<Self, RoiError> {
        Self::new(origin.x, origin.y, width, height)
    }

    /// Rectangle spanned by two opposite corners, in any order.
    ///
    /// Spans wider than `i32::MAX` saturate; such a rectangle never fits an
    /// image and is refused by [`Rect::ensure_within`].
    pub fn from_corners(a: Point2<i32>, b: Point2<i32>) -> Self {
        let span = |p: i32, q: i32| i32::try_from(p.abs_diff(q)).unwrap_or(i32::MAX);
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: span(a.x, b.x),
            height: span(a.y, b.y),
        }
    }

    /// The whole image.
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            x: 0,
            y: 0,
            width: i32::try_from(width).unwrap_or(i32::MAX),
            height: i32::try_from(height).unwrap_or(i32::MAX),
        }
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check that the rectangle lies inside a `image_width × image_height` image.
    pub fn ensure_within(self, image_width: usize, image_height: usize) -> Result<Self, RoiError> {
        let right = self.x as i64 + self.width as i64;
        let bottom = self.y as i64 + self.height as i64;
        if self.x < 0 || self.y < 0 || right > image_width as i64 || bottom > image_height as i64
        {
            return Err(RoiError::OutOfBounds {
                rect: self,
                image_width,
                image_height,
            });
        }
        Ok(self)
    }

    /// Corners in `[top-left, top-right, bottom-right, bottom-left]` order.
    pub fn corners(&self) -> [Point2<f32>; 4] {
        let (x0, y0) = (self.x as f32, self.y as f32);
        let (x1, y1) = (x0 + self.width as f32, y0 + self.height as f32);
        [
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    /// Half-open containment test used to pre-filter interest points.
    #[inline]
    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.x >= self.x as f32
            && p.y >= self.y as f32
            && p.x < (self.x as i64 + self.width as i64) as f32
            && p.y < (self.y as i64 + self.height as i64) as f32
    }
}

/// Four ordered points (top-left, top-right, bottom-right, bottom-left).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [Point2<f32>; 4],
}

impl Quad {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    pub fn bounding_rect(&self) -> Rect {
        bounding_rectangle(&self.corners)
    }
}

impl From<Rect> for Quad {
    fn from(rect: Rect) -> Self {
        Self::new(rect.corners())
    }
}

/// Minimal axis-aligned integer rectangle containing four arbitrary points.
pub fn bounding_rectangle(points: &[Point2<f32>; 4]) -> Rect {
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let x0 = min_x.floor() as i32;
    let y0 = min_y.floor() as i32;
    Rect {
        x: x0,
        y: y0,
        width: (max_x.ceil() as i32).saturating_sub(x0).max(0),
        height: (max_y.ceil() as i32).saturating_sub(y0).max(0),
    }
}
