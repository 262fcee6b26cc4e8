//! Reads emitted VOC and YOLO datasets back into pixel boxes.
//!
//! Nothing is repaired here: boxes are reported exactly as written, and any
//! geometric problem found on disk is flagged as a discrepancy. Directory
//! verification keeps going after a bad record so one report covers the
//! whole dataset.

mod report;

pub use report::{
    Discrepancy, DiscrepancyCode, ImageVerification, VerificationReport, VerifiedBox,
};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::classes::read_classes_txt;
use crate::conversion::emit::{
    VOC_ANNOTATIONS_DIR, VOC_IMAGES_DIR, YOLO_IMAGES_DIR, YOLO_LABELS_DIR,
};
use crate::conversion::TargetFormat;
use crate::error::CococonvError;
use crate::index::AnnotationIndex;
use crate::ir::io_coco_json::read_coco_json;
use crate::ir::io_voc_xml::{self, VOC_XML_EXTENSION};
use crate::ir::io_yolo::{self, LABEL_EXTENSION};
use crate::ir::{ImageDims, RawBox, Split};

/// Slack in pixels for boxes that were written with limited precision.
const BOUNDS_TOLERANCE: f64 = 0.5;

/// A parsed VOC record.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifiedRecord {
    pub filename: String,
    pub dims: ImageDims,
    pub boxes: Vec<VerifiedBox>,
}

/// Where verification looks up image dimensions.
#[derive(Clone, Debug, Default)]
pub struct VerifyOptions {
    /// Dimensions by image file name, usually from the source COCO files.
    pub source_dims: HashMap<String, ImageDims>,
}

impl VerifyOptions {
    /// Collects the dimensions of every image in `index`.
    pub fn from_index(index: &AnnotationIndex) -> Self {
        let source_dims = index
            .splits()
            .iter()
            .flat_map(|split| split.images())
            .map(|image| (image.file_name.clone(), image.dims()))
            .collect();
        Self { source_dims }
    }

    /// Reads image dimensions from COCO files. Later files win on repeated
    /// file names.
    pub fn from_sources(paths: &[PathBuf]) -> Result<Self, CococonvError> {
        let mut source_dims = HashMap::new();
        for path in paths {
            let dataset = read_coco_json(path, Split::Train)?;
            source_dims.extend(
                dataset
                    .images
                    .into_iter()
                    .map(|image| (image.file_name.clone(), image.dims())),
            );
        }
        Ok(Self { source_dims })
    }
}

/// Parses a VOC document and resolves its object names against `class_names`.
///
/// # Errors
/// [`CococonvError::MalformedRecord`] for broken XML, missing elements,
/// non-numeric coordinates or a zero-sized image, and
/// [`CococonvError::UnknownClass`] for an object name not in `class_names`.
pub fn parse_voc_record(
    xml: &str,
    path: &Path,
    class_names: &[String],
) -> Result<VerifiedRecord, CococonvError> {
    let document = io_voc_xml::parse_voc_xml_str(xml, path)?;
    if document.width == 0 || document.height == 0 {
        return Err(CococonvError::MalformedRecord {
            path: path.to_path_buf(),
            line: None,
            message: format!(
                "image size {}x{} must be positive",
                document.width, document.height
            ),
        });
    }

    let boxes = document
        .objects
        .into_iter()
        .map(|object| {
            let class_index = class_names
                .iter()
                .position(|name| name == &object.name)
                .ok_or_else(|| CococonvError::UnknownClass {
                    class: object.name.clone(),
                    message: format!("{} names a class missing from classes.txt", path.display()),
                })?;
            let raw = RawBox::Voc {
                xmin: object.xmin,
                ymin: object.ymin,
                xmax: object.xmax,
                ymax: object.ymax,
            };
            Ok(VerifiedBox {
                class_index,
                class_name: object.name,
                bbox: raw.to_corners(ImageDims::new(document.width, document.height)),
            })
        })
        .collect::<Result<Vec<_>, CococonvError>>()?;

    Ok(VerifiedRecord {
        filename: document.filename,
        dims: ImageDims::new(document.width, document.height),
        boxes,
    })
}

/// Parses a YOLO label file and denormalizes every row with `dims`.
///
/// # Errors
/// [`CococonvError::MalformedRecord`] for a bad row and
/// [`CococonvError::UnknownClass`] for a class index past the class list.
pub fn parse_yolo_record(
    text: &str,
    path: &Path,
    class_names: &[String],
    dims: ImageDims,
) -> Result<Vec<VerifiedBox>, CococonvError> {
    let mut boxes = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        let line_num = line_idx + 1;
        let Some(row) = io_yolo::parse_label_line(line, path, line_num)? else {
            continue;
        };
        let Some(class_name) = class_names.get(row.class_id) else {
            return Err(CococonvError::UnknownClass {
                class: row.class_id.to_string(),
                message: format!(
                    "{}:{line_num}: class index is beyond the {}-entry class list",
                    path.display(),
                    class_names.len()
                ),
            });
        };
        let raw = RawBox::Yolo {
            cx: row.cx,
            cy: row.cy,
            w: row.w,
            h: row.h,
        };
        boxes.push(VerifiedBox {
            class_index: row.class_id,
            class_name: class_name.clone(),
            bbox: raw.to_corners(dims),
        });
    }
    Ok(boxes)
}

/// Verifies a dataset in `format` below `root`.
pub fn verify_dir(
    root: &Path,
    format: TargetFormat,
    opts: &VerifyOptions,
) -> Result<VerificationReport, CococonvError> {
    match format {
        TargetFormat::Voc => verify_voc_dir(root, opts),
        TargetFormat::Yolo => verify_yolo_dir(root, opts),
    }
}

/// Verifies a VOC dataset: `classes.txt`, split manifests and
/// `Annotations/*.xml`.
///
/// # Errors
/// Only an unreadable `classes.txt` or manifest is fatal; every per-image
/// problem becomes a discrepancy in the report.
pub fn verify_voc_dir(
    root: &Path,
    opts: &VerifyOptions,
) -> Result<VerificationReport, CococonvError> {
    let mut report = start_report(root, TargetFormat::Voc)?;
    let mut referenced = HashSet::new();

    for (split, entries) in read_manifests(root, &mut report)? {
        for entry in entries {
            let Some(file_name) = strip_image_dir(&entry, VOC_IMAGES_DIR) else {
                report.dataset_discrepancies.push(invalid_entry(split, &entry, VOC_IMAGES_DIR));
                continue;
            };
            let record = Path::new(VOC_ANNOTATIONS_DIR).join(io_voc_xml::record_rel_path(file_name));
            referenced.insert(record.clone());

            let mut image = ImageVerification {
                split,
                file_name: file_name.to_string(),
                record: record.clone(),
                dims: opts.source_dims.get(file_name).copied(),
                boxes: Vec::new(),
                discrepancies: Vec::new(),
            };

            match read_record(root, &record) {
                Err(discrepancy) => image.discrepancies.push(discrepancy),
                Ok(xml) => match parse_voc_record(&xml, &root.join(&record), &report.classes) {
                    Err(err) => image.discrepancies.push(discrepancy_from_error(err)),
                    Ok(parsed) => {
                        if parsed.filename != file_name {
                            image.discrepancies.push(Discrepancy::new(
                                DiscrepancyCode::FileNameMismatch,
                                format!(
                                    "record names '{}' but the manifest lists '{file_name}'",
                                    parsed.filename
                                ),
                            ));
                        }
                        if let Some(source) = image.dims.filter(|d| *d != parsed.dims) {
                            image.discrepancies.push(Discrepancy::new(
                                DiscrepancyCode::DimensionMismatch,
                                format!("record size {} but source image is {source}", parsed.dims),
                            ));
                        }
                        image.dims = Some(parsed.dims);
                        image.boxes = parsed.boxes;
                        check_geometry(&mut image, parsed.dims);
                    }
                },
            }
            report.images.push(image);
        }
    }

    report
        .dataset_discrepancies
        .extend(find_orphans(root, VOC_ANNOTATIONS_DIR, VOC_XML_EXTENSION, &referenced));
    log_outcome(&report);
    Ok(report)
}

/// Verifies a YOLO dataset: `classes.txt`, split manifests and
/// `labels/<split>/*.txt`.
///
/// Dimensions come from `opts.source_dims` or, failing that, from the header
/// of the linked image file.
pub fn verify_yolo_dir(
    root: &Path,
    opts: &VerifyOptions,
) -> Result<VerificationReport, CococonvError> {
    let mut report = start_report(root, TargetFormat::Yolo)?;
    let mut referenced = HashSet::new();

    for (split, entries) in read_manifests(root, &mut report)? {
        let image_dir = format!("{YOLO_IMAGES_DIR}/{split}");
        for entry in entries {
            let Some(file_name) = strip_image_dir(&entry, &image_dir) else {
                report.dataset_discrepancies.push(invalid_entry(split, &entry, &image_dir));
                continue;
            };
            let record = Path::new(YOLO_LABELS_DIR)
                .join(split.name())
                .join(io_yolo::label_rel_path(file_name));
            referenced.insert(record.clone());

            let dims = opts
                .source_dims
                .get(file_name)
                .copied()
                .or_else(|| image_header_dims(&root.join(&entry)));

            let mut image = ImageVerification {
                split,
                file_name: file_name.to_string(),
                record: record.clone(),
                dims,
                boxes: Vec::new(),
                discrepancies: Vec::new(),
            };

            match (read_record(root, &record), dims) {
                (Err(discrepancy), _) => image.discrepancies.push(discrepancy),
                (Ok(_), None) => image.discrepancies.push(Discrepancy::new(
                    DiscrepancyCode::MissingDimensions,
                    format!(
                        "no source dimensions for '{file_name}' and {} has no readable image header",
                        entry
                    ),
                )),
                (Ok(text), Some(dims)) => {
                    match parse_yolo_record(&text, &root.join(&record), &report.classes, dims) {
                        Err(err) => image.discrepancies.push(discrepancy_from_error(err)),
                        Ok(boxes) => {
                            image.boxes = boxes;
                            check_geometry(&mut image, dims);
                        }
                    }
                }
            }
            report.images.push(image);
        }
    }

    report
        .dataset_discrepancies
        .extend(find_orphans(root, YOLO_LABELS_DIR, LABEL_EXTENSION, &referenced));
    log_outcome(&report);
    Ok(report)
}

fn start_report(root: &Path, format: TargetFormat) -> Result<VerificationReport, CococonvError> {
    log::info!("verifying {format} dataset at {}", root.display());
    Ok(VerificationReport {
        format: format.name().to_string(),
        root: root.to_path_buf(),
        classes: read_classes_txt(root)?,
        ..Default::default()
    })
}

/// Non-empty lines of every split manifest present at `root`.
fn read_manifests(
    root: &Path,
    report: &mut VerificationReport,
) -> Result<Vec<(Split, Vec<String>)>, CococonvError> {
    let mut manifests = Vec::new();
    for split in Split::ALL {
        let path = root.join(split.manifest_name());
        if !path.is_file() {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        manifests.push((split, entries));
    }

    if manifests.is_empty() {
        report.dataset_discrepancies.push(Discrepancy::new(
            DiscrepancyCode::NoManifests,
            format!(
                "neither {} nor {} found",
                Split::Train.manifest_name(),
                Split::Val.manifest_name()
            ),
        ));
    }
    Ok(manifests)
}

fn strip_image_dir<'a>(entry: &'a str, image_dir: &str) -> Option<&'a str> {
    entry
        .strip_prefix(image_dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}

fn invalid_entry(split: Split, entry: &str, image_dir: &str) -> Discrepancy {
    Discrepancy::new(
        DiscrepancyCode::InvalidManifestEntry,
        format!("{} line '{entry}' is not below {image_dir}/", split.manifest_name()),
    )
}

fn read_record(root: &Path, record: &Path) -> Result<String, Discrepancy> {
    let path = root.join(record);
    if !path.is_file() {
        return Err(Discrepancy::new(
            DiscrepancyCode::MissingRecord,
            format!("{} does not exist", record.display()),
        ));
    }
    fs::read_to_string(&path).map_err(|source| {
        Discrepancy::new(
            DiscrepancyCode::UnreadableRecord,
            format!("{}: {source}", record.display()),
        )
    })
}

fn image_header_dims(path: &Path) -> Option<ImageDims> {
    match imagesize::size(path) {
        Ok(size) => Some(ImageDims::new(size.width as u32, size.height as u32)),
        Err(err) => {
            log::debug!("no image header dimensions for {}: {err}", path.display());
            None
        }
    }
}

fn discrepancy_from_error(err: CococonvError) -> Discrepancy {
    let code = match &err {
        CococonvError::UnknownClass { .. } => DiscrepancyCode::UnknownClass,
        CococonvError::Io(_) => DiscrepancyCode::UnreadableRecord,
        _ => DiscrepancyCode::MalformedRecord,
    };
    Discrepancy::new(code, err.to_string())
}

fn check_geometry(image: &mut ImageVerification, dims: ImageDims) {
    if image.boxes.is_empty() {
        image.discrepancies.push(Discrepancy::new(
            DiscrepancyCode::EmptyRecord,
            format!("{} holds no boxes", image.record.display()),
        ));
        return;
    }

    for (idx, b) in image.boxes.iter().enumerate() {
        let bbox = &b.bbox;
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            image.discrepancies.push(Discrepancy::new(
                DiscrepancyCode::NonPositiveExtent,
                format!(
                    "box {} ({}) has extent {}x{}",
                    idx + 1,
                    b.class_name,
                    bbox.width(),
                    bbox.height()
                ),
            ));
        }
        if !bbox.within(dims, BOUNDS_TOLERANCE) {
            image.discrepancies.push(Discrepancy::new(
                DiscrepancyCode::OutsideImage,
                format!(
                    "box {} ({}) [{:.1}, {:.1}, {:.1}, {:.1}] reaches outside {dims}",
                    idx + 1,
                    b.class_name,
                    bbox.xmin,
                    bbox.ymin,
                    bbox.xmax,
                    bbox.ymax
                ),
            ));
        }
    }
}

/// Record files below `root/dir` that no manifest references.
fn find_orphans(
    root: &Path,
    dir: &str,
    extension: &str,
    referenced: &HashSet<PathBuf>,
) -> Vec<Discrepancy> {
    let base = root.join(dir);
    if !base.is_dir() {
        return Vec::new();
    }

    let mut orphans = Vec::new();
    for entry in WalkDir::new(&base).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping unreadable entry below {}: {err}", base.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let is_record = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !is_record {
            log::warn!("ignoring non-record file {}", path.display());
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if !referenced.contains(relative) {
            orphans.push(Discrepancy::new(
                DiscrepancyCode::OrphanRecord,
                format!("{} is not listed in any manifest", relative.display()),
            ));
        }
    }
    orphans
}

fn log_outcome(report: &VerificationReport) {
    if report.is_ok() {
        log::info!("verified {} image(s) without discrepancies", report.image_count());
    } else {
        log::info!(
            "verified {} image(s), {} discrepancy(ies)",
            report.image_count(),
            report.discrepancy_count()
        );
    }
}
