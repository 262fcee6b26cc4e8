//! Verification report types.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::ir::{BBoxXYXY, ImageDims, Pixel, Split};

/// Everything read back from one emitted dataset.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerificationReport {
    /// Format name (`voc` or `yolo`).
    pub format: String,
    pub root: PathBuf,
    pub classes: Vec<String>,
    /// One entry per manifest line, in manifest order.
    pub images: Vec<ImageVerification>,
    /// Problems not tied to a listed image, such as orphan records.
    pub dataset_discrepancies: Vec<Discrepancy>,
}

impl VerificationReport {
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn box_count(&self) -> usize {
        self.images.iter().map(|i| i.boxes.len()).sum()
    }

    pub fn discrepancy_count(&self) -> usize {
        self.dataset_discrepancies.len()
            + self
                .images
                .iter()
                .map(|i| i.discrepancies.len())
                .sum::<usize>()
    }

    /// True when nothing was flagged.
    pub fn is_ok(&self) -> bool {
        self.discrepancy_count() == 0
    }

    /// Every discrepancy with a short label of where it was found.
    pub fn discrepancies(&self) -> impl Iterator<Item = (String, &Discrepancy)> {
        let per_image = self.images.iter().flat_map(|image| {
            image
                .discrepancies
                .iter()
                .map(move |d| (format!("[{}] {}", image.split, image.file_name), d))
        });
        let dataset = self
            .dataset_discrepancies
            .iter()
            .map(|d| ("dataset".to_string(), d));
        per_image.chain(dataset)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Verified {} dataset at {}: {} image(s), {} box(es), {} discrepancy(ies)",
            self.format,
            self.root.display(),
            self.image_count(),
            self.box_count(),
            self.discrepancy_count()
        )?;

        for image in &self.images {
            let dims = image
                .dims
                .map(|d| d.to_string())
                .unwrap_or_else(|| "?x?".to_string());
            writeln!(
                f,
                "  [{}] {} ({dims}) {}",
                image.split,
                image.file_name,
                image.record.display()
            )?;
            for b in &image.boxes {
                writeln!(
                    f,
                    "    {} [{:.1}, {:.1}, {:.1}, {:.1}]",
                    b.class_name, b.bbox.xmin, b.bbox.ymin, b.bbox.xmax, b.bbox.ymax
                )?;
            }
        }

        if !self.is_ok() {
            writeln!(f)?;
            writeln!(f, "Discrepancies ({}):", self.discrepancy_count())?;
            for (location, discrepancy) in self.discrepancies() {
                writeln!(f, "  {location}: {discrepancy}")?;
            }
        }

        Ok(())
    }
}

/// One image listed in a split manifest.
#[derive(Clone, Debug, Serialize)]
pub struct ImageVerification {
    pub split: Split,
    pub file_name: String,
    /// Record path relative to the dataset root.
    pub record: PathBuf,
    /// `None` when no dimensions could be found.
    pub dims: Option<ImageDims>,
    pub boxes: Vec<VerifiedBox>,
    pub discrepancies: Vec<Discrepancy>,
}

/// A box read back from a record, in absolute pixels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerifiedBox {
    pub class_index: usize,
    pub class_name: String,
    pub bbox: BBoxXYXY<Pixel>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Discrepancy {
    pub code: DiscrepancyCode,
    pub message: String,
}

impl Discrepancy {
    pub fn new(code: DiscrepancyCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Stable discrepancy codes; part of the JSON report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyCode {
    /// No split manifest was found at the dataset root.
    NoManifests,
    /// A manifest line does not point into the expected image directory.
    InvalidManifestEntry,
    /// A manifest lists an image without a record file.
    MissingRecord,
    /// A record file could not be read.
    UnreadableRecord,
    MalformedRecord,
    /// A record names a class that is not in `classes.txt`.
    UnknownClass,
    /// A record without any box.
    EmptyRecord,
    /// The VOC `<filename>` differs from the manifest entry.
    FileNameMismatch,
    /// The VOC `<size>` differs from the source image dimensions.
    DimensionMismatch,
    /// YOLO dimensions came neither from a source file nor from the image.
    MissingDimensions,
    /// A box with zero or negative width or height.
    NonPositiveExtent,
    /// A box reaching outside the image.
    OutsideImage,
    /// A record file that no manifest lists.
    OrphanRecord,
}
