//! COCO JSON reader.
//!
//! COCO bounding boxes use `[x, y, width, height]` with `(x, y)` the top-left
//! corner in absolute pixels. The reader keeps that spelling in
//! [`RawBox::Coco`]; nothing is clamped or repaired here.
//!
//! Data errors (a missing `images` array, a string where a number belongs, a
//! three-element `bbox`) are reported as [`CococonvError::MalformedSource`].
//! Only unreadable or syntactically broken files become
//! [`CococonvError::SourceJsonParse`].

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use super::model::{Annotation, Category, Dataset, Image, Split};
use super::{AnnotationId, CategoryId, ImageId, RawBox};
use crate::error::CococonvError;

// ============================================================================
// COCO schema types (internal to this module)
// ============================================================================

/// Top-level COCO document. The three collections are optional at the serde
/// level so that their absence can be reported by name.
#[derive(Debug, Deserialize)]
struct CocoDataset {
    #[serde(default)]
    images: Option<Vec<CocoImage>>,

    #[serde(default)]
    annotations: Option<Vec<CocoAnnotation>>,

    #[serde(default)]
    categories: Option<Vec<CocoCategory>>,
}

#[derive(Debug, Deserialize)]
struct CocoImage {
    id: u64,
    width: u32,
    height: u32,
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct CocoCategory {
    id: u64,
    name: String,

    #[serde(default)]
    supercategory: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CocoAnnotation {
    id: u64,
    image_id: u64,
    category_id: u64,

    /// `[x, y, width, height]`
    bbox: [f64; 4],

    #[serde(default)]
    iscrowd: Option<u8>,
}

// ============================================================================
// Public API
// ============================================================================

/// Reads one split's COCO JSON file.
///
/// # Errors
/// [`CococonvError::Io`] if the file cannot be opened,
/// [`CococonvError::SourceJsonParse`] for broken JSON and
/// [`CococonvError::MalformedSource`] for a structurally wrong document.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use cococonv::ir::io_coco_json::read_coco_json;
/// use cococonv::ir::Split;
///
/// let dataset = read_coco_json(Path::new("instances_train.json"), Split::Train)?;
/// # Ok::<(), cococonv::CococonvError>(())
/// ```
pub fn read_coco_json(path: &Path, split: Split) -> Result<Dataset, CococonvError> {
    let file = File::open(path).map_err(CococonvError::Io)?;
    let reader = BufReader::new(file);

    let coco: CocoDataset =
        serde_json::from_reader(reader).map_err(|source| classify_error(path, source))?;

    coco_to_ir(coco, split, path)
}

/// Reads one split's COCO JSON from a string. `origin` only labels errors.
pub fn from_coco_str(json: &str, split: Split, origin: &Path) -> Result<Dataset, CococonvError> {
    let coco: CocoDataset =
        serde_json::from_str(json).map_err(|source| classify_error(origin, source))?;
    coco_to_ir(coco, split, origin)
}

/// Reads COCO JSON from raw bytes.
///
/// Useful for fuzzing without UTF-8 validation overhead.
pub fn from_coco_slice(bytes: &[u8], split: Split) -> Result<Dataset, CococonvError> {
    let origin = Path::new("<memory>");
    let coco: CocoDataset =
        serde_json::from_slice(bytes).map_err(|source| classify_error(origin, source))?;
    coco_to_ir(coco, split, origin)
}

fn classify_error(path: &Path, source: serde_json::Error) -> CococonvError {
    match source.classify() {
        serde_json::error::Category::Data => CococonvError::MalformedSource {
            path: path.to_path_buf(),
            message: source.to_string(),
        },
        serde_json::error::Category::Io => CococonvError::Io(source.into()),
        _ => CococonvError::SourceJsonParse {
            path: path.to_path_buf(),
            source,
        },
    }
}

// ============================================================================
// Conversion: COCO -> IR
// ============================================================================

fn coco_to_ir(coco: CocoDataset, split: Split, path: &Path) -> Result<Dataset, CococonvError> {
    let missing = |field: &str| CococonvError::MalformedSource {
        path: path.to_path_buf(),
        message: format!("missing required top-level '{field}' array"),
    };

    let images = coco
        .images
        .ok_or_else(|| missing("images"))?
        .into_iter()
        .map(|img| Image::new(ImageId::new(img.id), img.file_name, img.width, img.height, split))
        .collect();

    let categories = coco
        .categories
        .ok_or_else(|| missing("categories"))?
        .into_iter()
        .map(|cat| Category {
            id: CategoryId::new(cat.id),
            name: cat.name,
            supercategory: cat.supercategory,
        })
        .collect();

    let annotations = coco
        .annotations
        .ok_or_else(|| missing("annotations"))?
        .into_iter()
        .map(|ann| {
            let [x, y, w, h] = ann.bbox;
            let mut annotation = Annotation::new(
                AnnotationId::new(ann.id),
                ImageId::new(ann.image_id),
                CategoryId::new(ann.category_id),
                RawBox::Coco { x, y, w, h },
            );
            annotation.iscrowd = ann.iscrowd.unwrap_or(0) != 0;
            annotation
        })
        .collect();

    Ok(Dataset {
        images,
        categories,
        annotations,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_coco_json() -> &'static str {
        r#"{
            "info": {"year": 2014, "description": "sample"},
            "licenses": [],
            "images": [
                {"id": 1, "width": 640, "height": 480, "file_name": "image001.jpg", "license": 1}
            ],
            "categories": [
                {"id": 18, "name": "dog", "supercategory": "animal"}
            ],
            "annotations": [
                {
                    "id": 7,
                    "image_id": 1,
                    "category_id": 18,
                    "bbox": [10.0, 20.0, 90.0, 60.0],
                    "area": 5400.0,
                    "iscrowd": 1,
                    "segmentation": [[10, 20, 100, 20, 100, 80]]
                }
            ]
        }"#
    }

    #[test]
    fn reads_typed_records() {
        let dataset =
            from_coco_str(sample_coco_json(), Split::Val, Path::new("a.json")).expect("parse");

        assert_eq!(dataset.images.len(), 1);
        let img = &dataset.images[0];
        assert_eq!(img.id.as_u64(), 1);
        assert_eq!(img.file_name, "image001.jpg");
        assert_eq!(img.split, Split::Val);

        let cat = &dataset.categories[0];
        assert_eq!(cat.id.as_u64(), 18);
        assert_eq!(cat.supercategory.as_deref(), Some("animal"));

        let ann = &dataset.annotations[0];
        assert_eq!(ann.id.as_u64(), 7);
        assert!(ann.iscrowd);
        assert_eq!(
            ann.bbox,
            RawBox::Coco {
                x: 10.0,
                y: 20.0,
                w: 90.0,
                h: 60.0
            }
        );
    }

    #[test]
    fn missing_collection_is_malformed_source() {
        let json = r#"{"images": [], "categories": []}"#;
        let err = from_coco_str(json, Split::Train, Path::new("a.json")).unwrap_err();
        match err {
            CococonvError::MalformedSource { message, .. } => {
                assert!(message.contains("annotations"), "{message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn short_bbox_is_malformed_source() {
        let json = r#"{
            "images": [{"id": 1, "width": 10, "height": 10, "file_name": "a.jpg"}],
            "categories": [{"id": 1, "name": "cat"}],
            "annotations": [{"id": 1, "image_id": 1, "category_id": 1, "bbox": [1, 2, 3]}]
        }"#;
        let err = from_coco_str(json, Split::Train, Path::new("a.json")).unwrap_err();
        assert!(matches!(err, CococonvError::MalformedSource { .. }));
    }

    #[test]
    fn broken_json_is_parse_error() {
        let err = from_coco_slice(b"{\"images\": [", Split::Train).unwrap_err();
        assert!(matches!(err, CococonvError::SourceJsonParse { .. }));
    }
}
