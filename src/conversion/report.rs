//! Statistics and notes gathered during one conversion pass.
//!
//! The summary is an explicit value returned by [`super::convert`]; it renders
//! as text for the terminal and serializes to JSON for tooling.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::ir::Split;
use crate::normalize::DropReason;

/// Result of a conversion pass.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionSummary {
    /// Target format name.
    pub to: String,
    /// True when only `classes.txt` was written.
    pub classes_only: bool,
    /// Output classes with the number of kept boxes per class.
    pub classes: Vec<ClassCount>,
    /// Counts over all splits.
    pub totals: ConversionCounts,
    pub splits: BTreeMap<Split, ConversionCounts>,
    /// Dropped boxes per reason, over all splits.
    pub drop_reasons: BTreeMap<DropReason, usize>,
    pub issues: Vec<ConversionIssue>,
}

impl ConversionSummary {
    pub fn new(to: impl Into<String>, class_names: &[String]) -> Self {
        Self {
            to: to.into(),
            classes: class_names
                .iter()
                .enumerate()
                .map(|(index, name)| ClassCount {
                    index,
                    name: name.clone(),
                    kept: 0,
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Counters for `split`, created on first use.
    pub fn split_mut(&mut self, split: Split) -> &mut ConversionCounts {
        self.splits.entry(split).or_default()
    }

    /// Records one accepted box.
    pub fn record_kept(&mut self, split: Split, class_index: usize, repaired: bool) {
        let counts = self.split_mut(split);
        counts.kept += 1;
        if repaired {
            counts.repaired += 1;
        }
        if let Some(class) = self.classes.get_mut(class_index) {
            class.kept += 1;
        }
    }

    /// Records one dropped box.
    pub fn record_dropped(&mut self, split: Split, reason: DropReason) {
        self.split_mut(split).dropped += 1;
        *self.drop_reasons.entry(reason).or_default() += 1;
    }

    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Recomputes [`Self::totals`] from the per-split counters.
    pub fn finish(&mut self) {
        self.totals = self
            .splits
            .values()
            .fold(ConversionCounts::default(), |acc, c| acc.merged(c));
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Info)
            .count()
    }
}

impl fmt::Display for ConversionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.classes_only {
            writeln!(f, "Wrote {} class name(s):", self.classes.len())?;
            for class in &self.classes {
                writeln!(f, "  {} {}", class.index, class.name)?;
            }
            return Ok(());
        }

        let t = &self.totals;
        writeln!(
            f,
            "Converted to {}: {} image(s) written, {} skipped without boxes, {} skipped with missing image file",
            self.to, t.images_written, t.images_skipped_empty, t.images_skipped_missing
        )?;
        writeln!(
            f,
            "  annotations: {} seen, {} filtered, {} attempted, {} kept ({} repaired), {} dropped",
            t.seen, t.filtered, t.attempted, t.kept, t.repaired, t.dropped
        )?;

        if !self.drop_reasons.is_empty() {
            let reasons: Vec<String> = self
                .drop_reasons
                .iter()
                .map(|(reason, count)| format!("{reason}={count}"))
                .collect();
            writeln!(f, "  dropped by reason: {}", reasons.join(", "))?;
        }

        if self.splits.len() > 1 {
            for (split, c) in &self.splits {
                writeln!(
                    f,
                    "  {split}: {} image(s) written, {} kept, {} dropped",
                    c.images_written, c.kept, c.dropped
                )?;
            }
        }

        writeln!(f, "  classes:")?;
        for class in &self.classes {
            writeln!(f, "    {} {}: {}", class.index, class.name, class.kept)?;
        }

        let warnings = self.warning_count();
        if warnings > 0 {
            writeln!(f)?;
            writeln!(f, "Warnings ({warnings}):")?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == ConversionSeverity::Warning)
            {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        let infos = self.info_count();
        if infos > 0 {
            writeln!(f)?;
            writeln!(f, "Notes ({infos}):")?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == ConversionSeverity::Info)
            {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        Ok(())
    }
}

/// Running counters of a conversion pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionCounts {
    /// Annotations read from the source.
    pub seen: usize,
    /// Annotations whose class is not in the output class list.
    pub filtered: usize,
    /// Annotations handed to the normalizer.
    pub attempted: usize,
    pub kept: usize,
    /// Kept boxes that needed a repair.
    pub repaired: usize,
    pub dropped: usize,
    pub images_written: usize,
    /// Images not emitted because every annotation was filtered or dropped.
    pub images_skipped_empty: usize,
    /// Images not emitted because their file was missing from the image directory.
    pub images_skipped_missing: usize,
}

impl ConversionCounts {
    fn merged(self, other: &ConversionCounts) -> ConversionCounts {
        ConversionCounts {
            seen: self.seen + other.seen,
            filtered: self.filtered + other.filtered,
            attempted: self.attempted + other.attempted,
            kept: self.kept + other.kept,
            repaired: self.repaired + other.repaired,
            dropped: self.dropped + other.dropped,
            images_written: self.images_written + other.images_written,
            images_skipped_empty: self.images_skipped_empty + other.images_skipped_empty,
            images_skipped_missing: self.images_skipped_missing + other.images_skipped_missing,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub index: usize,
    pub name: String,
    pub kept: usize,
}

/// A note about something the pass did on the user's behalf.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub message: String,
}

impl ConversionIssue {
    /// Data was left out of the output.
    pub fn warning(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            message: message.into(),
        }
    }

    /// A fixed output policy applied.
    pub fn info(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Info,
            code,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    Warning,
    Info,
}

/// Stable issue codes; part of the JSON report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    /// Boxes were dropped by the normalizer.
    BoxesDropped,
    /// Boxes were clipped, swapped or expanded.
    BoxesRepaired,
    /// Images with no remaining boxes are not written or listed.
    ImagesWithoutBoxesSkipped,
    /// Images whose file is missing from the image directory were skipped.
    ImageFilesMissing,
    /// Annotations of classes outside the class list were filtered.
    ClassesFiltered,
    /// VOC corners are truncated toward zero to whole pixels.
    VocCornersTruncated,
    /// YOLO values are written with six decimal places.
    YoloFloatPrecision,
}
