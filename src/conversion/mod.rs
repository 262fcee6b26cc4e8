//! The conversion pass: class filtering, box normalization and emission.
//!
//! The pass runs in two phases. Planning walks every split in source order,
//! builds the [`ConversionRecord`]s of each image and checks that no two
//! images share an output path. Only then does emission create directories
//! and write records, manifests and class lists, so a configuration or
//! source problem never leaves a half-written output tree behind.
//!
//! Emission first removes the records and manifests of any earlier run into
//! the same root, so a narrower re-run leaves no orphaned records. Linked
//! images are left alone.

pub mod emit;
pub mod report;

pub use emit::{Emitter, VocEmitter, YoloEmitter};
pub use report::{
    ClassCount, ConversionCounts, ConversionIssue, ConversionIssueCode, ConversionSeverity,
    ConversionSummary,
};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::classes::{write_classes_txt, ClassMap};
use crate::error::CococonvError;
use crate::index::{AnnotationIndex, SplitIndex};
use crate::ir::{Convention, Image, ImageId, RawBox, Split};
use crate::normalize::{normalize, Normalized, RepairPolicy};

/// Output format of a conversion.
///
/// This mirrors the CLI's format flag but is decoupled from clap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetFormat {
    Voc,
    Yolo,
}

impl TargetFormat {
    pub fn name(&self) -> &'static str {
        match self {
            TargetFormat::Voc => "voc",
            TargetFormat::Yolo => "yolo",
        }
    }

    pub fn convention(&self) -> Convention {
        match self {
            TargetFormat::Voc => Convention::Voc,
            TargetFormat::Yolo => Convention::Yolo,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings of one conversion pass.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub output_root: PathBuf,
    pub target: TargetFormat,
    /// Ordered class names to keep; `None` keeps every category.
    pub allow_list: Option<Vec<String>>,
    /// Write `classes.txt` only.
    pub classes_only: bool,
    pub repair: RepairPolicy,
    /// Source image directory per split. Emitted images are linked into the
    /// output and images missing from the directory are skipped.
    pub image_dirs: BTreeMap<Split, PathBuf>,
}

impl ConvertOptions {
    pub fn new(output_root: impl Into<PathBuf>, target: TargetFormat) -> Self {
        Self {
            output_root: output_root.into(),
            target,
            allow_list: None,
            classes_only: false,
            repair: RepairPolicy::default(),
            image_dirs: BTreeMap::new(),
        }
    }
}

/// One accepted box, ready for an emitter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConversionRecord {
    pub image_id: ImageId,
    pub class_index: usize,
    /// Box in the target convention.
    pub bbox: RawBox,
    /// The box was clipped at the image border.
    pub clipped: bool,
    /// The source annotation was a crowd region.
    pub crowd: bool,
}

struct PlannedImage<'a> {
    image: &'a Image,
    records: Vec<ConversionRecord>,
    link_from: Option<PathBuf>,
}

/// Converts every split of `index` into `options.target` below
/// `options.output_root`.
///
/// # Errors
/// [`CococonvError::UnknownClass`] for an allow-list name that is not a source
/// category and [`CococonvError::MalformedSource`] for image file names that
/// would escape the output root or collide with another image's record; both
/// are raised before anything is written. I/O failures while writing surface
/// as [`CococonvError::Io`].
pub fn convert(
    index: &AnnotationIndex,
    options: &ConvertOptions,
) -> Result<ConversionSummary, CococonvError> {
    let class_map = ClassMap::build(index.categories(), options.allow_list.as_deref())?;
    let mut summary = ConversionSummary::new(options.target.name(), class_map.names());

    if options.classes_only {
        fs::create_dir_all(&options.output_root)?;
        write_classes_txt(&options.output_root, class_map.names())?;
        summary.classes_only = true;
        log::info!(
            "wrote {} class name(s) to {}",
            class_map.len(),
            options.output_root.display()
        );
        return Ok(summary);
    }

    let emitter: Box<dyn Emitter> = match options.target {
        TargetFormat::Voc => Box::new(VocEmitter),
        TargetFormat::Yolo => Box::new(YoloEmitter),
    };

    let mut planned = Vec::new();
    for split_index in index.splits() {
        plan_split(split_index, &class_map, options, &mut summary, &mut planned)?;
    }
    check_output_collisions(index, emitter.as_ref(), &planned)?;

    let splits: Vec<Split> = index.splits().iter().map(SplitIndex::split).collect();
    emit(emitter.as_ref(), &planned, &splits, class_map.names(), options, &mut summary)?;

    summary.finish();
    add_notes(&mut summary, options.target);

    log::info!(
        "converted {} image(s) to {} in {}",
        summary.totals.images_written,
        options.target,
        options.output_root.display()
    );
    Ok(summary)
}

fn plan_split<'a>(
    split_index: &'a SplitIndex,
    class_map: &ClassMap,
    options: &ConvertOptions,
    summary: &mut ConversionSummary,
    planned: &mut Vec<PlannedImage<'a>>,
) -> Result<(), CococonvError> {
    let split = split_index.split();
    let convention = options.target.convention();
    let image_dir = options.image_dirs.get(&split);
    summary.split_mut(split);

    for (image, annotations) in split_index.iter() {
        if !is_safe_relative(&image.file_name) {
            return Err(CococonvError::MalformedSource {
                path: split_index.source().to_path_buf(),
                message: format!(
                    "image {} file name '{}' must be a relative path inside the dataset",
                    image.id, image.file_name
                ),
            });
        }

        let link_from = image_dir.map(|dir| dir.join(&image.file_name));
        if let Some(source) = &link_from {
            if !source.is_file() {
                log::warn!("skipping {split} image {}: {} not found", image.id, source.display());
                let counts = summary.split_mut(split);
                counts.seen += annotations.len();
                counts.images_skipped_missing += 1;
                continue;
            }
        }

        let dims = image.dims();
        let mut records = Vec::new();
        for annotation in annotations {
            summary.split_mut(split).seen += 1;
            let Some(class_index) = class_map.remap(annotation.category_id) else {
                summary.split_mut(split).filtered += 1;
                continue;
            };
            summary.split_mut(split).attempted += 1;

            let outcome = normalize(annotation.bbox, dims, options.repair);
            match outcome.render(convention, dims) {
                Ok(bbox) => {
                    summary.record_kept(split, class_index, outcome.repaired());
                    let clipped = matches!(
                        outcome,
                        Normalized::Kept { repairs, .. } if repairs.clipped
                    );
                    records.push(ConversionRecord {
                        image_id: image.id,
                        class_index,
                        bbox,
                        clipped,
                        crowd: annotation.iscrowd,
                    });
                }
                Err(reason) => {
                    log::debug!(
                        "dropping annotation {} on {split} image {} ({}): {reason}",
                        annotation.id,
                        image.id,
                        image.file_name
                    );
                    summary.record_dropped(split, reason);
                }
            }
        }

        if records.is_empty() {
            log::debug!("{split} image {} has no boxes left; not emitted", image.id);
            summary.split_mut(split).images_skipped_empty += 1;
            continue;
        }

        planned.push(PlannedImage {
            image,
            records,
            link_from,
        });
    }
    Ok(())
}

fn check_output_collisions(
    index: &AnnotationIndex,
    emitter: &dyn Emitter,
    planned: &[PlannedImage<'_>],
) -> Result<(), CococonvError> {
    let mut owners: HashMap<PathBuf, &Image> = HashMap::with_capacity(planned.len());
    for item in planned {
        let path = emitter.record_path(item.image);
        if let Some(previous) = owners.insert(path.clone(), item.image) {
            let source = index
                .split(item.image.split)
                .map(|s| s.source().to_path_buf())
                .unwrap_or_default();
            return Err(CococonvError::MalformedSource {
                path: source,
                message: format!(
                    "{} image '{}' and {} image '{}' would both be written to {}",
                    previous.split,
                    previous.file_name,
                    item.image.split,
                    item.image.file_name,
                    path.display()
                ),
            });
        }
    }
    Ok(())
}

fn emit(
    emitter: &dyn Emitter,
    planned: &[PlannedImage<'_>],
    splits: &[Split],
    class_names: &[String],
    options: &ConvertOptions,
    summary: &mut ConversionSummary,
) -> Result<(), CococonvError> {
    let root = &options.output_root;
    fs::create_dir_all(root)?;
    clear_previous_output(emitter, root)?;
    for dir in emitter.directories(splits) {
        fs::create_dir_all(root.join(dir))?;
    }

    let mut manifests: BTreeMap<Split, String> =
        splits.iter().map(|split| (*split, String::new())).collect();

    for item in planned {
        let image = item.image;
        let record_path = root.join(emitter.record_path(image));
        if let Some(parent) = record_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = emitter.render_record(image, &item.records, class_names);
        fs::write(&record_path, content)?;

        let entry = emitter.manifest_entry(image);
        if let Some(source) = &item.link_from {
            emit::link_image(source, &root.join(&entry))?;
        }
        let manifest = manifests.entry(image.split).or_default();
        manifest.push_str(&entry);
        manifest.push('\n');

        summary.split_mut(image.split).images_written += 1;
    }

    for (split, manifest) in &manifests {
        fs::write(root.join(split.manifest_name()), manifest)?;
    }
    write_classes_txt(root, class_names)?;
    emitter.finish(root, splits, class_names)?;

    log::debug!("{} emitter wrote {} record(s)", emitter.format(), planned.len());
    Ok(())
}

/// Removes the record directory and split manifests a previous run left in
/// `root`.
fn clear_previous_output(emitter: &dyn Emitter, root: &Path) -> Result<(), CococonvError> {
    let records = root.join(emitter.record_root());
    if records.is_dir() {
        log::info!("removing previous records in {}", records.display());
        fs::remove_dir_all(&records)?;
    }
    for split in Split::ALL {
        let manifest = root.join(split.manifest_name());
        if manifest.is_file() {
            log::debug!("removing previous manifest {}", manifest.display());
            fs::remove_file(&manifest)?;
        }
    }
    Ok(())
}

fn add_notes(summary: &mut ConversionSummary, target: TargetFormat) {
    let counts = summary.totals.clone();

    if counts.dropped > 0 {
        summary.add(ConversionIssue::warning(
            ConversionIssueCode::BoxesDropped,
            format!("{} box(es) dropped as invalid", counts.dropped),
        ));
    }
    if counts.images_skipped_missing > 0 {
        summary.add(ConversionIssue::warning(
            ConversionIssueCode::ImageFilesMissing,
            format!(
                "{} image(s) skipped because the image file is missing",
                counts.images_skipped_missing
            ),
        ));
    }
    if counts.repaired > 0 {
        summary.add(ConversionIssue::info(
            ConversionIssueCode::BoxesRepaired,
            format!(
                "{} box(es) clipped to the image or had their corners reordered",
                counts.repaired
            ),
        ));
    }
    if counts.filtered > 0 {
        summary.add(ConversionIssue::info(
            ConversionIssueCode::ClassesFiltered,
            format!(
                "{} annotation(s) of classes outside the class list were filtered",
                counts.filtered
            ),
        ));
    }
    if counts.images_skipped_empty > 0 {
        summary.add(ConversionIssue::info(
            ConversionIssueCode::ImagesWithoutBoxesSkipped,
            format!(
                "{} image(s) without remaining boxes are not written or listed",
                counts.images_skipped_empty
            ),
        ));
    }
    match target {
        TargetFormat::Voc => summary.add(ConversionIssue::info(
            ConversionIssueCode::VocCornersTruncated,
            "VOC corners are truncated toward zero to whole pixels",
        )),
        TargetFormat::Yolo => summary.add(ConversionIssue::info(
            ConversionIssueCode::YoloFloatPrecision,
            "YOLO values are written with 6 decimal places",
        )),
    }
}

fn is_safe_relative(file_name: &str) -> bool {
    let path = Path::new(file_name);
    !file_name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::DropReason;

    const SOURCE: &str = r#"{
        "images": [
            {"id": 1, "width": 800, "height": 600, "file_name": "a.jpg"},
            {"id": 2, "width": 800, "height": 600, "file_name": "b.jpg"},
            {"id": 3, "width": 400, "height": 200, "file_name": "c.jpg"}
        ],
        "categories": [
            {"id": 1, "name": "cat"},
            {"id": 2, "name": "dog"},
            {"id": 3, "name": "bird"}
        ],
        "annotations": [
            {"id": 1, "image_id": 1, "category_id": 1, "bbox": [790, 10, 50, 50]},
            {"id": 2, "image_id": 1, "category_id": 3, "bbox": [10, 10, 20, 20]},
            {"id": 3, "image_id": 2, "category_id": 2, "bbox": [100, 100, 0, 20]},
            {"id": 4, "image_id": 3, "category_id": 2, "bbox": [10, 10, 200, 100]},
            {"id": 5, "image_id": 2, "category_id": 3, "bbox": [5, 5, 5, 5]}
        ]
    }"#;

    fn options(root: &Path, target: TargetFormat) -> ConvertOptions {
        let mut options = ConvertOptions::new(root, target);
        options.allow_list = Some(vec!["cat".to_string(), "dog".to_string()]);
        options
    }

    #[test]
    fn voc_pass_counts_and_skips_empty_images() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let index = AnnotationIndex::from_sources(&[(Split::Train, SOURCE)]).expect("index");

        let summary = convert(&index, &options(temp.path(), TargetFormat::Voc)).expect("convert");
        let t = &summary.totals;
        assert_eq!(t.seen, 5);
        assert_eq!(t.filtered, 2);
        assert_eq!(t.attempted, 3);
        assert_eq!(t.kept, 2);
        assert_eq!(t.repaired, 1);
        assert_eq!(t.dropped, 1);
        assert_eq!(t.images_written, 2);
        assert_eq!(t.images_skipped_empty, 1);
        assert_eq!(summary.drop_reasons.get(&DropReason::ZeroExtent), Some(&1));
        assert_eq!(
            summary.classes.iter().map(|c| c.kept).collect::<Vec<_>>(),
            [1, 1]
        );

        let manifest = fs::read_to_string(temp.path().join("train.txt")).expect("manifest");
        assert_eq!(manifest, "JPEGImages/a.jpg\nJPEGImages/c.jpg\n");
        assert!(temp.path().join("Annotations/a.xml").is_file());
        assert!(!temp.path().join("Annotations/b.xml").exists());

        let classes = fs::read_to_string(temp.path().join("classes.txt")).expect("classes");
        assert_eq!(classes, "cat\ndog\n");
    }

    #[test]
    fn yolo_pass_writes_labels_and_data_yaml() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let index = AnnotationIndex::from_sources(&[(Split::Train, SOURCE)]).expect("index");

        convert(&index, &options(temp.path(), TargetFormat::Yolo)).expect("convert");

        let label = fs::read_to_string(temp.path().join("labels/train/c.txt")).expect("label");
        assert_eq!(label, "1 0.275000 0.300000 0.500000 0.500000\n");
        assert!(temp.path().join("data.yaml").is_file());
        let manifest = fs::read_to_string(temp.path().join("train.txt")).expect("manifest");
        assert_eq!(manifest, "images/train/a.jpg\nimages/train/c.jpg\n");
    }

    #[test]
    fn classes_only_writes_just_the_class_list() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let index = AnnotationIndex::from_sources(&[(Split::Train, SOURCE)]).expect("index");
        let mut options = ConvertOptions::new(temp.path(), TargetFormat::Yolo);
        options.classes_only = true;

        let summary = convert(&index, &options).expect("convert");
        assert!(summary.classes_only);

        let entries: Vec<_> = fs::read_dir(temp.path())
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, ["classes.txt"]);
        assert_eq!(
            fs::read_to_string(temp.path().join("classes.txt")).expect("classes"),
            "cat\ndog\nbird\n"
        );
    }

    #[test]
    fn unknown_class_fails_before_writing() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let out = temp.path().join("out");
        let index = AnnotationIndex::from_sources(&[(Split::Train, SOURCE)]).expect("index");
        let mut options = ConvertOptions::new(&out, TargetFormat::Voc);
        options.allow_list = Some(vec!["unicorn".to_string()]);

        let err = convert(&index, &options).unwrap_err();
        assert!(matches!(err, CococonvError::UnknownClass { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn voc_collision_across_splits_fails_before_writing() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let out = temp.path().join("out");
        let val = r#"{
            "images": [{"id": 9, "width": 800, "height": 600, "file_name": "a.png"}],
            "categories": [{"id": 1, "name": "cat"}],
            "annotations": [{"id": 1, "image_id": 9, "category_id": 1, "bbox": [1, 1, 5, 5]}]
        }"#;
        let index = AnnotationIndex::from_sources(&[(Split::Train, SOURCE), (Split::Val, val)])
            .expect("index");

        let err = convert(&index, &ConvertOptions::new(&out, TargetFormat::Voc)).unwrap_err();
        assert!(matches!(err, CococonvError::MalformedSource { .. }));
        assert!(!out.exists());

        // The YOLO layout keeps splits apart, so the same stems are fine there.
        convert(&index, &ConvertOptions::new(&out, TargetFormat::Yolo)).expect("yolo convert");
    }

    #[test]
    fn escaping_file_names_are_rejected() {
        assert!(is_safe_relative("a.jpg"));
        assert!(is_safe_relative("sub/a.jpg"));
        assert!(!is_safe_relative("../a.jpg"));
        assert!(!is_safe_relative("/tmp/a.jpg"));
        assert!(!is_safe_relative(""));
    }

    #[test]
    fn missing_images_are_skipped_when_linking() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let images = temp.path().join("images");
        fs::create_dir_all(&images).expect("create image dir");
        fs::write(images.join("a.jpg"), b"jpeg").expect("write image");

        let out = temp.path().join("out");
        let index = AnnotationIndex::from_sources(&[(Split::Train, SOURCE)]).expect("index");
        let mut options = options(&out, TargetFormat::Yolo);
        options.image_dirs.insert(Split::Train, images);

        let summary = convert(&index, &options).expect("convert");
        assert_eq!(summary.totals.images_written, 1);
        assert_eq!(summary.totals.images_skipped_missing, 2);
        assert!(out.join("images/train/a.jpg").is_file());
        assert!(summary
            .issues
            .iter()
            .any(|i| i.code == ConversionIssueCode::ImageFilesMissing));
    }
}
