//! The three box conventions as one tagged value.

use serde::Serialize;
use std::fmt;

use super::bbox::{BBoxXYXY, ImageDims, Normalized, Pixel};

/// A coordinate convention for boxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Convention {
    /// `x, y, w, h` in pixels, `(x, y)` the top-left corner.
    Coco,
    /// `xmin, ymin, xmax, ymax` in pixels.
    Voc,
    /// `cx, cy, w, h` divided by image width/height.
    Yolo,
}

impl Convention {
    pub fn name(&self) -> &'static str {
        match self {
            Convention::Coco => "coco",
            Convention::Voc => "voc",
            Convention::Yolo => "yolo",
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A box exactly as a source or target format spells it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "convention", rename_all = "lowercase")]
pub enum RawBox {
    Coco { x: f64, y: f64, w: f64, h: f64 },
    Voc { xmin: f64, ymin: f64, xmax: f64, ymax: f64 },
    Yolo { cx: f64, cy: f64, w: f64, h: f64 },
}

impl RawBox {
    pub fn convention(&self) -> Convention {
        match self {
            RawBox::Coco { .. } => Convention::Coco,
            RawBox::Voc { .. } => Convention::Voc,
            RawBox::Yolo { .. } => Convention::Yolo,
        }
    }

    /// Canonical pixel corners. YOLO boxes are denormalized with `dims`; the
    /// corners are not sorted or clamped here.
    pub fn to_corners(&self, dims: ImageDims) -> BBoxXYXY<Pixel> {
        match *self {
            RawBox::Coco { x, y, w, h } => BBoxXYXY::from_xywh(x, y, w, h),
            RawBox::Voc {
                xmin,
                ymin,
                xmax,
                ymax,
            } => BBoxXYXY::from_xyxy(xmin, ymin, xmax, ymax),
            RawBox::Yolo { cx, cy, w, h } => {
                BBoxXYXY::<Normalized>::from_cxcywh(cx, cy, w, h).to_pixel(dims)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_corners() {
        let raw = RawBox::Coco {
            x: 10.0,
            y: 20.0,
            w: 30.0,
            h: 40.0,
        };
        let corners = raw.to_corners(ImageDims::new(100, 100));
        assert_eq!(corners, BBoxXYXY::from_xyxy(10.0, 20.0, 40.0, 60.0));
        assert_eq!(raw.convention(), Convention::Coco);
    }

    #[test]
    fn yolo_corners_are_denormalized() {
        let raw = RawBox::Yolo {
            cx: 0.275,
            cy: 0.3,
            w: 0.5,
            h: 0.5,
        };
        let corners = raw.to_corners(ImageDims::new(400, 200));
        assert!((corners.xmin - 10.0).abs() < 1e-9);
        assert!((corners.ymin - 10.0).abs() < 1e-9);
        assert!((corners.xmax - 210.0).abs() < 1e-9);
        assert!((corners.ymax - 110.0).abs() < 1e-9);
    }
}
