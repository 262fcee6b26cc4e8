//! Source checking for cococonv.
//!
//! Inspects a loaded source without converting it and reports every box a
//! conversion would repair or drop:
//! - Negative coordinates and non-positive sizes
//! - Extents beyond the image width/height
//! - Boxes smaller than one square pixel
//! - Boxes that collapse at the precision of a target format
//!
//! Each box issue carries the outcome the normalizer would reach, so the
//! severity tells whether the box survives conversion. A box the normalizer
//! keeps is also rendered for every target format, since integer VOC corners
//! and six-decimal YOLO fields can still lose it.

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::HashMap;

use crate::index::{AnnotationIndex, SplitIndex};
use crate::ir::{Annotation, Convention, Image, RawBox};
use crate::normalize::{normalize, DropReason, Normalized, RepairPolicy};

/// Formats a conversion can write.
const TARGETS: [Convention; 2] = [Convention::Voc, Convention::Yolo];

/// Options for checking.
#[derive(Clone, Debug, Default)]
pub struct CheckOptions {
    /// If true, warnings fail the check too.
    pub strict: bool,
    /// Policy used to predict each box's conversion outcome.
    pub repair: RepairPolicy,
}

/// Checks every split of `index` and returns a report of all issues found.
pub fn check_source(index: &AnnotationIndex, opts: &CheckOptions) -> ValidationReport {
    let mut report = ValidationReport::new();

    check_categories(index, &mut report);
    for split_index in index.splits() {
        check_split(split_index, opts, &mut report);
    }

    log::debug!(
        "checked {} annotation(s): {} error(s), {} warning(s)",
        report.annotations_checked,
        report.error_count(),
        report.warning_count()
    );
    report
}

/// Returns true when `report` should fail under `opts`.
pub fn check_failed(report: &ValidationReport, opts: &CheckOptions) -> bool {
    report.error_count() > 0 || (opts.strict && report.warning_count() > 0)
}

fn check_categories(index: &AnnotationIndex, report: &mut ValidationReport) {
    let mut seen_names: HashMap<&str, u64> = HashMap::new();

    for category in index.categories() {
        let id = category.id.as_u64();

        if category.name.trim().is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::EmptyCategoryName,
                "Empty category name",
                IssueContext::Category { id },
            ));
        } else if let Some(first_id) = seen_names.get(category.name.as_str()) {
            report.add(ValidationIssue::warning(
                IssueCode::DuplicateCategoryName,
                format!(
                    "Duplicate category name '{}' (also used by category {first_id})",
                    category.name
                ),
                IssueContext::Category { id },
            ));
        } else {
            seen_names.insert(&category.name, id);
        }
    }
}

fn check_split(split_index: &SplitIndex, opts: &CheckOptions, report: &mut ValidationReport) {
    for (image, annotations) in split_index.iter() {
        report.images_checked += 1;

        if image.file_name.trim().is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::EmptyFileName,
                "Empty file name",
                IssueContext::Image {
                    split: image.split,
                    id: image.id.as_u64(),
                },
            ));
        }

        for annotation in annotations {
            report.annotations_checked += 1;
            check_annotation(image, annotation, opts, report);
        }
    }
}

fn check_annotation(
    image: &Image,
    annotation: &Annotation,
    opts: &CheckOptions,
    report: &mut ValidationReport,
) {
    let mut problems = box_problems(&annotation.bbox, image);
    let outcome = normalize(annotation.bbox, image.dims(), opts.repair);
    let target_drops = if outcome.is_kept() {
        drops_by_target(&outcome, image)
    } else {
        Vec::new()
    };
    if problems.is_empty() {
        if target_drops.is_empty() {
            return;
        }
        problems.push((
            IssueCode::CollapsesAtOutputPrecision,
            "Box collapses at output precision".to_string(),
        ));
    }

    let (severity, verdict) = match outcome {
        Normalized::Dropped(reason) => (Severity::Error, format!("would be dropped ({reason})")),
        Normalized::Kept { .. } if !target_drops.is_empty() => {
            let outputs: Vec<String> = target_drops
                .iter()
                .map(|(target, reason)| format!("{target} output ({reason})"))
                .collect();
            (
                Severity::Error,
                format!("would be dropped from {}", outputs.join(" and ")),
            )
        }
        Normalized::Kept { .. } => (Severity::Warning, "would be repaired".to_string()),
    };

    for (code, detail) in problems {
        report.add(ValidationIssue::new(
            severity,
            code,
            format!("{detail}; {verdict}"),
            IssueContext::Annotation {
                split: image.split,
                id: annotation.id.as_u64(),
                file_name: image.file_name.clone(),
            },
        ));
    }
}

/// Target formats that drop the normalized box, with the reason each gives.
fn drops_by_target(outcome: &Normalized, image: &Image) -> Vec<(Convention, DropReason)> {
    TARGETS
        .iter()
        .filter_map(|&target| {
            outcome
                .render(target, image.dims())
                .err()
                .map(|reason| (target, reason))
        })
        .collect()
}

/// Problems of `bbox` expressed in COCO terms.
fn box_problems(bbox: &RawBox, image: &Image) -> Vec<(IssueCode, String)> {
    let corners = bbox.to_corners(image.dims());
    if !corners.is_finite() {
        return vec![(
            IssueCode::BBoxNotFinite,
            format!(
                "Non-finite coordinates ({}, {}, {}, {})",
                corners.xmin, corners.ymin, corners.xmax, corners.ymax
            ),
        )];
    }

    let (x, y, w, h) = corners.to_xywh();
    let (img_w, img_h) = (image.dims().w(), image.dims().h());
    let mut problems = Vec::new();

    if x < 0.0 || y < 0.0 {
        problems.push((
            IssueCode::NegativeCoordinates,
            format!("Negative coordinates ({x}, {y})"),
        ));
    }
    if w <= 0.0 || h <= 0.0 {
        problems.push((
            IssueCode::NonPositiveSize,
            format!("Invalid size: width={w}, height={h}"),
        ));
    }
    if x >= img_w || x + w > img_w {
        problems.push((
            IssueCode::OutOfBoundsX,
            format!(
                "X extent ({x}, {}) outside image width {}",
                x + w,
                image.width
            ),
        ));
    }
    if y >= img_h || y + h > img_h {
        problems.push((
            IssueCode::OutOfBoundsY,
            format!(
                "Y extent ({y}, {}) outside image height {}",
                y + h,
                image.height
            ),
        ));
    }
    if w > 0.0 && h > 0.0 && corners.area() < 1.0 {
        problems.push((
            IssueCode::AreaTooSmall,
            format!("Area {} is below one pixel", corners.area()),
        ));
    }
    problems
}
