//! Ultralytics-style YOLO label files.
//!
//! One text file per image, one `<class> <cx> <cy> <w> <h>` row per box with
//! every coordinate divided by the image width/height. The dataset root also
//! carries a `data.yaml` naming the split manifests and the classes.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::model::Split;
use crate::error::CococonvError;

pub const LABEL_EXTENSION: &str = "txt";
pub const DATA_YAML: &str = "data.yaml";

/// Decimal places of every coordinate in a label row.
pub const LABEL_DECIMALS: usize = 6;

/// One label row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoloLabelRow {
    pub class_id: usize,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

/// Renders label rows with [`LABEL_DECIMALS`] decimal places.
pub fn render_label_rows(rows: &[YoloLabelRow]) -> String {
    let mut text = String::new();
    for row in rows {
        writeln!(
            text,
            "{} {:.prec$} {:.prec$} {:.prec$} {:.prec$}",
            row.class_id,
            row.cx,
            row.cy,
            row.w,
            row.h,
            prec = LABEL_DECIMALS
        )
        .expect("write to string");
    }
    text
}

/// `value` as it reads back from a rendered label row.
pub fn at_label_precision(value: f64) -> f64 {
    format!("{value:.prec$}", prec = LABEL_DECIMALS)
        .parse()
        .unwrap_or(value)
}

/// Parses one label row; `Ok(None)` for a blank line.
///
/// Every coordinate must be a number in `[0, 1]`.
pub fn parse_label_line(
    line: &str,
    file_path: &Path,
    line_num: usize,
) -> Result<Option<YoloLabelRow>, CococonvError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // At most 6 tokens so pathological inputs do not allocate unbounded memory.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();

    if tokens.len() != 5 {
        let found = if tokens.len() > 5 {
            "more than 5".to_string()
        } else {
            tokens.len().to_string()
        };
        return Err(malformed(
            file_path,
            line_num,
            format!("expected 5 tokens, found {found}"),
        ));
    }

    let class_id = tokens[0].parse::<usize>().map_err(|_| {
        malformed(
            file_path,
            line_num,
            format!(
                "invalid class index '{}'; expected non-negative integer",
                tokens[0]
            ),
        )
    })?;

    let cx = parse_unit_token(tokens[1], "x_center", file_path, line_num)?;
    let cy = parse_unit_token(tokens[2], "y_center", file_path, line_num)?;
    let w = parse_unit_token(tokens[3], "width", file_path, line_num)?;
    let h = parse_unit_token(tokens[4], "height", file_path, line_num)?;

    Ok(Some(YoloLabelRow {
        class_id,
        cx,
        cy,
        w,
        h,
    }))
}

/// Fuzz-only entrypoint for YOLO single-line parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_line(input: &str) -> Result<(), CococonvError> {
    let _ = parse_label_line(input, Path::new("<fuzz>"), 1)?;
    Ok(())
}

fn parse_unit_token(
    raw: &str,
    field_name: &str,
    file_path: &Path,
    line_num: usize,
) -> Result<f64, CococonvError> {
    let value = raw.parse::<f64>().map_err(|_| {
        malformed(
            file_path,
            line_num,
            format!("invalid {field_name} '{raw}'; expected floating-point number"),
        )
    })?;

    if !(0.0..=1.0).contains(&value) {
        return Err(malformed(
            file_path,
            line_num,
            format!("{field_name} {raw} is outside [0, 1]"),
        ));
    }

    Ok(value)
}

fn malformed(path: &Path, line: usize, message: String) -> CococonvError {
    CococonvError::MalformedRecord {
        path: path.to_path_buf(),
        line: Some(line),
        message,
    }
}

/// Path of the label file for `file_name` below `labels/<split>/`.
pub fn label_rel_path(file_name: &str) -> PathBuf {
    Path::new(file_name).with_extension(LABEL_EXTENSION)
}

#[derive(Debug, Serialize)]
struct DataYaml<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    train: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    val: Option<String>,
    nc: usize,
    names: BTreeMap<usize, &'a str>,
}

/// Writes `data.yaml` at `root`, pointing at the manifests of `splits`.
pub fn write_data_yaml(
    root: &Path,
    splits: &[Split],
    class_names: &[String],
) -> Result<(), CococonvError> {
    let manifest = |split: Split| splits.contains(&split).then(|| split.manifest_name());
    let data = DataYaml {
        path: ".",
        train: manifest(Split::Train),
        val: manifest(Split::Val),
        nc: class_names.len(),
        names: class_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx, name.as_str()))
            .collect(),
    };

    let path = root.join(DATA_YAML);
    let yaml = serde_yaml::to_string(&data).map_err(|source| CococonvError::DataYamlWrite {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, yaml).map_err(CococonvError::Io)
}
