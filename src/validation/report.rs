//! Source check report types.
//!
//! Issues are collected per annotation and can be rendered as text or
//! serialized to JSON.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::ir::Split;

/// The result of checking one or more source files.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    pub images_checked: usize,
    pub annotations_checked: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    /// Returns true if there are no issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of distinct annotations with at least one issue.
    pub fn annotations_with_issues(&self) -> usize {
        self.issues
            .iter()
            .filter_map(|i| match &i.context {
                IssueContext::Annotation { split, id, .. } => Some((*split, *id)),
                _ => None,
            })
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Number of distinct images carrying an annotation with an issue.
    pub fn images_with_issues(&self) -> usize {
        self.issues
            .iter()
            .filter_map(|i| match &i.context {
                IssueContext::Annotation {
                    split, file_name, ..
                } => Some((*split, file_name.as_str())),
                _ => None,
            })
            .collect::<BTreeSet<_>>()
            .len()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Checked {} image(s) and {} annotation(s)",
            self.images_checked, self.annotations_checked
        )?;

        if self.issues.is_empty() {
            return writeln!(f, "Check passed: no issues found");
        }

        writeln!(
            f,
            "Check completed with {} error(s) and {} warning(s): {} annotation(s) across {} image(s)",
            self.error_count(),
            self.warning_count(),
            self.annotations_with_issues(),
            self.images_with_issues()
        )?;
        writeln!(f)?;

        for issue in &self.issues {
            writeln!(f, "  {issue}")?;
        }

        Ok(())
    }
}

/// A single issue (error or warning).
#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub context: IssueContext,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context,
        }
    }

    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Error, code, message, context)
    }

    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Warning, code, message, context)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        write!(
            f,
            "[{}] {:?} in {}: {}",
            severity, self.code, self.context, self.message
        )
    }
}

/// Error: the box would be dropped by a conversion. Warning: it would be
/// repaired, or the issue does not affect conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A stable code identifying the type of issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    // Category issues
    EmptyCategoryName,
    /// Two categories share a name; an allow-list would select both.
    DuplicateCategoryName,

    // Image issues
    EmptyFileName,

    // Bounding box issues
    /// A coordinate is NaN or infinite.
    BBoxNotFinite,
    /// `x` or `y` is negative.
    NegativeCoordinates,
    /// Width or height is zero or negative.
    NonPositiveSize,
    /// The box starts at or beyond the image width, or ends past it.
    OutOfBoundsX,
    /// The box starts at or beyond the image height, or ends past it.
    OutOfBoundsY,
    /// Positive size but less than one square pixel.
    AreaTooSmall,
    /// A valid box that a target format cannot represent at its precision.
    CollapsesAtOutputPrecision,
}

/// Where an issue occurred.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueContext {
    Dataset,
    Image {
        split: Split,
        id: u64,
    },
    Annotation {
        split: Split,
        id: u64,
        file_name: String,
    },
    Category {
        id: u64,
    },
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::Dataset => write!(f, "dataset"),
            IssueContext::Image { split, id } => write!(f, "{split} image {id}"),
            IssueContext::Annotation {
                split,
                id,
                file_name,
            } => write!(f, "{split} annotation {id} ({file_name})"),
            IssueContext::Category { id } => write!(f, "category {id}"),
        }
    }
}
