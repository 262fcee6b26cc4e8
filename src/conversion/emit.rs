//! Per-format output layout.
//!
//! An [`Emitter`] knows where a format keeps its records, images and
//! manifests, and how to render one image's records. Driving the pass and
//! touching the filesystem is left to [`super::convert`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{ConversionRecord, TargetFormat};
use crate::error::CococonvError;
use crate::ir::io_voc_xml::{self, VocObject};
use crate::ir::io_yolo::{self, YoloLabelRow};
use crate::ir::{Image, ImageDims, RawBox, Split};

pub const VOC_ANNOTATIONS_DIR: &str = "Annotations";
pub const VOC_IMAGES_DIR: &str = "JPEGImages";
pub const YOLO_LABELS_DIR: &str = "labels";
pub const YOLO_IMAGES_DIR: &str = "images";

pub trait Emitter {
    fn format(&self) -> TargetFormat;

    /// Directory below the output root that holds every record of the
    /// format. A conversion replaces its contents wholesale.
    fn record_root(&self) -> &'static str;

    /// Directories to create below the output root before writing.
    fn directories(&self, splits: &[Split]) -> Vec<PathBuf>;

    /// Record path of `image`, relative to the output root.
    fn record_path(&self, image: &Image) -> PathBuf;

    /// Image path of `image` as listed in its split manifest, relative to the
    /// output root and always `/`-separated.
    fn manifest_entry(&self, image: &Image) -> String;

    fn render_record(
        &self,
        image: &Image,
        records: &[ConversionRecord],
        class_names: &[String],
    ) -> String;

    /// Writes format-level files once every record is out.
    fn finish(
        &self,
        _root: &Path,
        _splits: &[Split],
        _class_names: &[String],
    ) -> Result<(), CococonvError> {
        Ok(())
    }
}

/// `Annotations/<stem>.xml` per image, flat across splits.
#[derive(Clone, Copy, Debug, Default)]
pub struct VocEmitter;

impl Emitter for VocEmitter {
    fn format(&self) -> TargetFormat {
        TargetFormat::Voc
    }

    fn record_root(&self) -> &'static str {
        VOC_ANNOTATIONS_DIR
    }

    fn directories(&self, _splits: &[Split]) -> Vec<PathBuf> {
        vec![PathBuf::from(VOC_ANNOTATIONS_DIR)]
    }

    fn record_path(&self, image: &Image) -> PathBuf {
        Path::new(VOC_ANNOTATIONS_DIR).join(io_voc_xml::record_rel_path(&image.file_name))
    }

    fn manifest_entry(&self, image: &Image) -> String {
        format!("{VOC_IMAGES_DIR}/{}", image.file_name)
    }

    fn render_record(
        &self,
        image: &Image,
        records: &[ConversionRecord],
        class_names: &[String],
    ) -> String {
        let dims = image.dims();
        let objects: Vec<VocObject> = records
            .iter()
            .map(|record| {
                let corners = record.bbox.to_corners(dims);
                VocObject {
                    name: class_name(class_names, record.class_index),
                    xmin: corners.xmin,
                    ymin: corners.ymin,
                    xmax: corners.xmax,
                    ymax: corners.ymax,
                    truncated: record.clipped,
                    difficult: record.crowd,
                }
            })
            .collect();
        io_voc_xml::render_voc_xml(image, &objects)
    }
}

/// `labels/<split>/<stem>.txt` per image plus `data.yaml`.
#[derive(Clone, Copy, Debug, Default)]
pub struct YoloEmitter;

impl Emitter for YoloEmitter {
    fn format(&self) -> TargetFormat {
        TargetFormat::Yolo
    }

    fn record_root(&self) -> &'static str {
        YOLO_LABELS_DIR
    }

    fn directories(&self, splits: &[Split]) -> Vec<PathBuf> {
        splits
            .iter()
            .map(|split| Path::new(YOLO_LABELS_DIR).join(split.name()))
            .collect()
    }

    fn record_path(&self, image: &Image) -> PathBuf {
        Path::new(YOLO_LABELS_DIR)
            .join(image.split.name())
            .join(io_yolo::label_rel_path(&image.file_name))
    }

    fn manifest_entry(&self, image: &Image) -> String {
        format!("{YOLO_IMAGES_DIR}/{}/{}", image.split, image.file_name)
    }

    fn render_record(
        &self,
        image: &Image,
        records: &[ConversionRecord],
        _class_names: &[String],
    ) -> String {
        let dims = image.dims();
        let rows: Vec<YoloLabelRow> = records
            .iter()
            .map(|record| yolo_row(record, dims))
            .collect();
        io_yolo::render_label_rows(&rows)
    }

    fn finish(
        &self,
        root: &Path,
        splits: &[Split],
        class_names: &[String],
    ) -> Result<(), CococonvError> {
        io_yolo::write_data_yaml(root, splits, class_names)
    }
}

fn yolo_row(record: &ConversionRecord, dims: ImageDims) -> YoloLabelRow {
    let (cx, cy, w, h) = match record.bbox {
        RawBox::Yolo { cx, cy, w, h } => (cx, cy, w, h),
        other => other.to_corners(dims).to_normalized(dims).to_cxcywh(),
    };
    YoloLabelRow {
        class_id: record.class_index,
        cx,
        cy,
        w,
        h,
    }
}

fn class_name(class_names: &[String], index: usize) -> String {
    class_names
        .get(index)
        .cloned()
        .unwrap_or_else(|| index.to_string())
}

/// Places `source` at `dest`: a symlink on unix, a copy elsewhere.
/// An existing file at `dest` is replaced.
pub fn link_image(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if dest.symlink_metadata().is_ok() {
        fs::remove_file(dest)?;
    }

    #[cfg(unix)]
    {
        let source = fs::canonicalize(source)?;
        std::os::unix::fs::symlink(source, dest)
    }

    #[cfg(not(unix))]
    {
        fs::copy(source, dest).map(|_| ())
    }
}
