//! Axis-aligned boxes in canonical corner form.
//!
//! Every box convention is converted into [`BBoxXYXY`] before any clamping or
//! repair happens, so the repair logic exists exactly once.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Marker for absolute pixel coordinates, `(0, 0)` at the top-left corner.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Marker for coordinates divided by the image width/height.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalized {}

/// Width and height of an image in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDims {
    pub width: u32,
    pub height: u32,
}

impl ImageDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn w(&self) -> f64 {
        self.width as f64
    }

    #[inline]
    pub fn h(&self) -> f64 {
        self.height as f64
    }
}

impl fmt::Display for ImageDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A box given by its two corners `(xmin, ymin)` and `(xmax, ymax)`.
///
/// Construction never validates: a box read from disk may be unordered or
/// empty, and callers decide whether that is a repair, a drop, or a reported
/// discrepancy.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            _space: PhantomData,
        }
    }

    /// Builds a box from a top-left corner plus width and height (COCO order).
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(x, y, x + width, y + height)
    }

    /// Builds a box from its center plus width and height (YOLO order).
    #[inline]
    pub fn from_cxcywh(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self::from_xyxy(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
    }

    #[inline]
    pub fn to_xywh(&self) -> (f64, f64, f64, f64) {
        (self.xmin, self.ymin, self.width(), self.height())
    }

    #[inline]
    pub fn to_cxcywh(&self) -> (f64, f64, f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
            self.width(),
            self.height(),
        )
    }

    /// May be negative for an unordered box.
    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// May be negative for an unordered box.
    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.xmax.is_finite()
            && self.ymax.is_finite()
    }

    /// True when `min <= max` on both axes.
    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.xmin <= self.xmax && self.ymin <= self.ymax
    }

    /// Returns the box with each axis' corners swapped into ascending order.
    pub fn sorted(&self) -> Self {
        Self::from_xyxy(
            self.xmin.min(self.xmax),
            self.ymin.min(self.ymax),
            self.xmin.max(self.xmax),
            self.ymin.max(self.ymax),
        )
    }
}

impl BBoxXYXY<Pixel> {
    /// Clamps every coordinate into `[0, W] x [0, H]`.
    pub fn clamped(&self, dims: ImageDims) -> Self {
        let (w, h) = (dims.w(), dims.h());
        Self::from_xyxy(
            self.xmin.clamp(0.0, w),
            self.ymin.clamp(0.0, h),
            self.xmax.clamp(0.0, w),
            self.ymax.clamp(0.0, h),
        )
    }

    /// True when the box lies inside `[0, W] x [0, H]` widened by `tolerance`
    /// on every side (touching the border is inside).
    pub fn within(&self, dims: ImageDims, tolerance: f64) -> bool {
        self.xmin >= -tolerance
            && self.ymin >= -tolerance
            && self.xmax <= dims.w() + tolerance
            && self.ymax <= dims.h() + tolerance
    }

    /// Truncates every coordinate toward zero, as integer pixel tooling does.
    pub fn truncated(&self) -> Self {
        Self::from_xyxy(
            self.xmin.trunc(),
            self.ymin.trunc(),
            self.xmax.trunc(),
            self.ymax.trunc(),
        )
    }

    pub fn to_normalized(&self, dims: ImageDims) -> BBoxXYXY<Normalized> {
        BBoxXYXY::from_xyxy(
            self.xmin / dims.w(),
            self.ymin / dims.h(),
            self.xmax / dims.w(),
            self.ymax / dims.h(),
        )
    }
}

impl BBoxXYXY<Normalized> {
    pub fn to_pixel(&self, dims: ImageDims) -> BBoxXYXY<Pixel> {
        BBoxXYXY::from_xyxy(
            self.xmin * dims.w(),
            self.ymin * dims.h(),
            self.xmax * dims.w(),
            self.ymax * dims.h(),
        )
    }
}

impl<TSpace> fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("xmin", &self.xmin)
            .field("ymin", &self.ymin)
            .field("xmax", &self.xmax)
            .field("ymax", &self.ymax)
            .finish()
    }
}

impl<TSpace> Default for BBoxXYXY<TSpace> {
    fn default() -> Self {
        Self::from_xyxy(0.0, 0.0, 0.0, 0.0)
    }
}

// Hand-written so that `TSpace` needs no serde bounds.
impl<TSpace> Serialize for BBoxXYXY<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BBoxXYXY", 4)?;
        state.serialize_field("xmin", &self.xmin)?;
        state.serialize_field("ymin", &self.ymin)?;
        state.serialize_field("xmax", &self.xmax)?;
        state.serialize_field("ymax", &self.ymax)?;
        state.end()
    }
}

impl<'de, TSpace> Deserialize<'de> for BBoxXYXY<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Corners {
            xmin: f64,
            ymin: f64,
            xmax: f64,
            ymax: f64,
        }
        let c = Corners::deserialize(deserializer)?;
        Ok(BBoxXYXY::from_xyxy(c.xmin, c.ymin, c.xmax, c.ymax))
    }
}
