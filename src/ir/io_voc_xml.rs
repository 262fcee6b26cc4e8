//! Pascal VOC XML records.
//!
//! One document per image: `<size>` plus one `<object>` per box with integer
//! `<bndbox>` corners. Rendering is hand-formatted; parsing uses `roxmltree`
//! and reports every structural problem as
//! [`CococonvError::MalformedRecord`].

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use roxmltree::Node;

use super::model::Image;
use crate::error::CococonvError;

pub const VOC_XML_EXTENSION: &str = "xml";
const VOC_DATABASE: &str = "COCO";

/// A parsed (or to-be-written) VOC annotation document.
#[derive(Clone, Debug, PartialEq)]
pub struct VocDocument {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub depth: Option<u32>,
    pub objects: Vec<VocObject>,
}

/// One `<object>` element.
#[derive(Clone, Debug, PartialEq)]
pub struct VocObject {
    pub name: String,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    /// The object extends past the image border and was clipped.
    pub truncated: bool,
    pub difficult: bool,
}

/// Renders the VOC document for `image`.
///
/// Corners are written as given; the converter has already truncated them to
/// whole pixels.
pub fn render_voc_xml(image: &Image, objects: &[VocObject]) -> String {
    let mut xml = String::new();

    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    writeln!(xml, "<annotation>").expect("write to string");
    writeln!(xml, "  <folder>JPEGImages</folder>").expect("write to string");
    writeln!(
        xml,
        "  <filename>{}</filename>",
        xml_escape(&image.file_name)
    )
    .expect("write to string");
    writeln!(xml, "  <source>").expect("write to string");
    writeln!(xml, "    <database>{VOC_DATABASE}</database>").expect("write to string");
    writeln!(xml, "  </source>").expect("write to string");
    writeln!(xml, "  <size>").expect("write to string");
    writeln!(xml, "    <width>{}</width>", image.width).expect("write to string");
    writeln!(xml, "    <height>{}</height>", image.height).expect("write to string");
    writeln!(xml, "    <depth>3</depth>").expect("write to string");
    writeln!(xml, "  </size>").expect("write to string");
    writeln!(xml, "  <segmented>0</segmented>").expect("write to string");

    for object in objects {
        writeln!(xml, "  <object>").expect("write to string");
        writeln!(xml, "    <name>{}</name>", xml_escape(&object.name)).expect("write to string");
        writeln!(xml, "    <pose>Unspecified</pose>").expect("write to string");
        writeln!(xml, "    <truncated>{}</truncated>", u8::from(object.truncated))
            .expect("write to string");
        writeln!(xml, "    <difficult>{}</difficult>", u8::from(object.difficult))
            .expect("write to string");
        writeln!(xml, "    <bndbox>").expect("write to string");
        writeln!(xml, "      <xmin>{}</xmin>", object.xmin).expect("write to string");
        writeln!(xml, "      <ymin>{}</ymin>", object.ymin).expect("write to string");
        writeln!(xml, "      <xmax>{}</xmax>", object.xmax).expect("write to string");
        writeln!(xml, "      <ymax>{}</ymax>", object.ymax).expect("write to string");
        writeln!(xml, "    </bndbox>").expect("write to string");
        writeln!(xml, "  </object>").expect("write to string");
    }

    writeln!(xml, "</annotation>").expect("write to string");
    xml
}

/// Parses a VOC document. `path` only labels errors.
pub fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<VocDocument, CococonvError> {
    let document = roxmltree::Document::parse(xml).map_err(|source| malformed(path, source))?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(malformed(path, "missing <annotation> root element"));
    }

    let filename = required_child_text(annotation, "filename", path, "<annotation>")?;

    let size = required_child_element(annotation, "size", path, "<annotation>")?;
    let width = parse_required_u32(size, "width", path, "<size>")?;
    let height = parse_required_u32(size, "height", path, "<size>")?;
    let depth = optional_child_text(size, "depth")
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| {
                malformed(
                    path,
                    format!("invalid <depth> value '{raw}' in <size>; expected u32"),
                )
            })
        })
        .transpose()?;

    let mut objects = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name = required_child_text(object, "name", path, "<object>")?;
        let bndbox = required_child_element(object, "bndbox", path, "<object>")?;

        objects.push(VocObject {
            name,
            xmin: parse_required_f64(bndbox, "xmin", path, "<bndbox>")?,
            ymin: parse_required_f64(bndbox, "ymin", path, "<bndbox>")?,
            xmax: parse_required_f64(bndbox, "xmax", path, "<bndbox>")?,
            ymax: parse_required_f64(bndbox, "ymax", path, "<bndbox>")?,
            truncated: optional_flag(object, "truncated"),
            difficult: optional_flag(object, "difficult"),
        });
    }

    Ok(VocDocument {
        filename,
        width,
        height,
        depth,
        objects,
    })
}

/// Parses VOC XML from bytes, which must be valid UTF-8.
pub fn from_voc_xml_slice(bytes: &[u8]) -> Result<VocDocument, CococonvError> {
    let origin = PathBuf::from("<memory>");
    let xml = std::str::from_utf8(bytes)
        .map_err(|source| malformed(&origin, format!("input is not valid UTF-8: {source}")))?;
    parse_voc_xml_str(xml, &origin)
}

/// Path of the record for `file_name` below the `Annotations/` directory.
pub fn record_rel_path(file_name: &str) -> PathBuf {
    Path::new(file_name).with_extension(VOC_XML_EXTENSION)
}

fn malformed(path: &Path, message: impl ToString) -> CococonvError {
    CococonvError::MalformedRecord {
        path: path.to_path_buf(),
        line: None,
        message: message.to_string(),
    }
}

fn required_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<Node<'a, 'input>, CococonvError> {
    child_element(node, tag).ok_or_else(|| malformed(path, format!("missing <{tag}> in {context}")))
}

fn required_child_text(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<String, CococonvError> {
    optional_child_text(node, tag)
        .ok_or_else(|| malformed(path, format!("missing <{tag}> in {context}")))
}

fn parse_required_u32(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<u32, CococonvError> {
    let raw = required_child_text(node, tag, path, context)?;
    raw.parse::<u32>().map_err(|_| {
        malformed(
            path,
            format!("invalid <{tag}> value '{raw}' in {context}; expected u32"),
        )
    })
}

fn parse_required_f64(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<f64, CococonvError> {
    let raw = required_child_text(node, tag, path, context)?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(malformed(
            path,
            format!("invalid <{tag}> value '{raw}' in {context}; expected a finite number"),
        )),
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn optional_flag(node: Node<'_, '_>, tag: &str) -> bool {
    matches!(
        optional_child_text(node, tag)
            .map(|raw| raw.to_ascii_lowercase())
            .as_deref(),
        Some("1" | "true" | "yes")
    )
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
