//! Bounding-box validation, repair and convention conversion.
//!
//! Every source box goes through the same steps in pixel corner form:
//! non-finite check, corner sort, zero-extent policy, clamp to the image,
//! then a final extent check. The surviving box is rendered into the target
//! convention by [`to_convention`], which may still drop a box that collapses
//! at the target's precision: integer corners for VOC, six-decimal fields
//! for YOLO.

use std::fmt;

use serde::Serialize;

use crate::ir::io_yolo::at_label_precision;
use crate::ir::{BBoxXYXY, Convention, ImageDims, Pixel, RawBox};

/// What to do with a source box that has zero width or height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroExtent {
    #[default]
    Drop,
    /// Grow the empty axis by one pixel, toward the far side when there is
    /// room and toward the near side otherwise.
    ExpandOnePixel,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepairPolicy {
    pub zero_extent: ZeroExtent,
}

/// Why a box was not emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// A coordinate was NaN or infinite.
    NonFinite,
    /// Zero width or height in the source.
    ZeroExtent,
    /// Nothing of the box was left after clamping to the image.
    OutsideImage,
    /// Integer VOC corners collapsed an axis.
    DegenerateAfterTruncation,
    /// A YOLO width or height reads back as zero at label precision.
    DegenerateAfterRounding,
}

impl DropReason {
    pub fn name(&self) -> &'static str {
        match self {
            DropReason::NonFinite => "non_finite",
            DropReason::ZeroExtent => "zero_extent",
            DropReason::OutsideImage => "outside_image",
            DropReason::DegenerateAfterTruncation => "degenerate_after_truncation",
            DropReason::DegenerateAfterRounding => "degenerate_after_rounding",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which repairs were applied to a kept box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Repairs {
    /// Corners were given in reverse order.
    pub swapped: bool,
    /// A zero-width or zero-height axis was grown by one pixel.
    pub expanded: bool,
    /// At least one coordinate lay outside the image.
    pub clipped: bool,
}

impl Repairs {
    pub fn any(&self) -> bool {
        self.swapped || self.expanded || self.clipped
    }
}

/// Outcome of [`normalize`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Normalized {
    Kept {
        bbox: BBoxXYXY<Pixel>,
        repairs: Repairs,
    },
    Dropped(DropReason),
}

impl Normalized {
    pub fn is_kept(&self) -> bool {
        matches!(self, Normalized::Kept { .. })
    }

    pub fn repaired(&self) -> bool {
        matches!(self, Normalized::Kept { repairs, .. } if repairs.any())
    }

    /// Renders a kept box in `target`; a dropped box yields its reason.
    pub fn render(&self, target: Convention, dims: ImageDims) -> Result<RawBox, DropReason> {
        match self {
            Normalized::Kept { bbox, .. } => to_convention(bbox, target, dims),
            Normalized::Dropped(reason) => Err(*reason),
        }
    }
}

/// Validates and repairs `raw` against an image of size `dims`.
///
/// A kept box always has strictly positive width and height and lies inside
/// `[0, W] x [0, H]`.
///
/// # Example
/// ```
/// use cococonv::ir::{ImageDims, RawBox};
/// use cococonv::normalize::{normalize, Normalized, RepairPolicy};
///
/// let raw = RawBox::Coco { x: -5.0, y: -5.0, w: 10.0, h: 10.0 };
/// let outcome = normalize(raw, ImageDims::new(800, 600), RepairPolicy::default());
/// match outcome {
///     Normalized::Kept { bbox, repairs } => {
///         assert_eq!((bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax), (0.0, 0.0, 5.0, 5.0));
///         assert!(repairs.clipped);
///     }
///     Normalized::Dropped(reason) => panic!("dropped: {reason}"),
/// }
/// ```
pub fn normalize(raw: RawBox, dims: ImageDims, policy: RepairPolicy) -> Normalized {
    let corners = raw.to_corners(dims);
    if !corners.is_finite() {
        return Normalized::Dropped(DropReason::NonFinite);
    }

    let mut repairs = Repairs {
        swapped: !corners.is_ordered(),
        ..Repairs::default()
    };
    let mut bbox = corners.sorted();

    if bbox.width() == 0.0 || bbox.height() == 0.0 {
        match policy.zero_extent {
            ZeroExtent::Drop => return Normalized::Dropped(DropReason::ZeroExtent),
            ZeroExtent::ExpandOnePixel => {
                let Some(expanded) = expand_one_pixel(&bbox, dims) else {
                    return Normalized::Dropped(DropReason::ZeroExtent);
                };
                bbox = expanded;
                repairs.expanded = true;
            }
        }
    }

    let clamped = bbox.clamped(dims);
    repairs.clipped = clamped != bbox;

    let (width, height) = (clamped.width(), clamped.height());
    if width <= 0.0 || height <= 0.0 || width > dims.w() || height > dims.h() {
        return Normalized::Dropped(DropReason::OutsideImage);
    }

    Normalized::Kept {
        bbox: clamped,
        repairs,
    }
}

/// Renders a kept pixel box in the `target` convention.
///
/// VOC corners are truncated toward zero; YOLO values are clamped to `[0, 1]`.
/// A box that collapses at either precision is dropped.
pub fn to_convention(
    bbox: &BBoxXYXY<Pixel>,
    target: Convention,
    dims: ImageDims,
) -> Result<RawBox, DropReason> {
    match target {
        Convention::Coco => {
            let (x, y, w, h) = bbox.to_xywh();
            Ok(RawBox::Coco { x, y, w, h })
        }
        Convention::Voc => {
            let t = bbox.truncated();
            if t.width() <= 0.0 || t.height() <= 0.0 {
                return Err(DropReason::DegenerateAfterTruncation);
            }
            Ok(RawBox::Voc {
                xmin: t.xmin,
                ymin: t.ymin,
                xmax: t.xmax,
                ymax: t.ymax,
            })
        }
        Convention::Yolo => {
            let (w_img, h_img) = (dims.w(), dims.h());
            let unit = |v: f64| v.clamp(0.0, 1.0);
            let (w, h) = (unit(bbox.width() / w_img), unit(bbox.height() / h_img));
            if at_label_precision(w) <= 0.0 || at_label_precision(h) <= 0.0 {
                return Err(DropReason::DegenerateAfterRounding);
            }
            Ok(RawBox::Yolo {
                cx: unit((bbox.xmin + bbox.xmax) / 2.0 / w_img),
                cy: unit((bbox.ymin + bbox.ymax) / 2.0 / h_img),
                w,
                h,
            })
        }
    }
}

fn expand_one_pixel(bbox: &BBoxXYXY<Pixel>, dims: ImageDims) -> Option<BBoxXYXY<Pixel>> {
    let (xmin, xmax) = if bbox.width() == 0.0 {
        expand_axis(bbox.xmin, dims.w())?
    } else {
        (bbox.xmin, bbox.xmax)
    };
    let (ymin, ymax) = if bbox.height() == 0.0 {
        expand_axis(bbox.ymin, dims.h())?
    } else {
        (bbox.ymin, bbox.ymax)
    };
    Some(BBoxXYXY::from_xyxy(xmin, ymin, xmax, ymax))
}

fn expand_axis(at: f64, limit: f64) -> Option<(f64, f64)> {
    if !(0.0..=limit).contains(&at) {
        return None;
    }
    if at + 1.0 <= limit {
        Some((at, at + 1.0))
    } else if at - 1.0 >= 0.0 {
        Some((at - 1.0, at))
    } else {
        None
    }
}
