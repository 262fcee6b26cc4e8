#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const TRAIN_FIXTURE: &str = "tests/fixtures/sample_train.coco.json";
pub const VAL_FIXTURE: &str = "tests/fixtures/sample_val.coco.json";
pub const MALFORMED_FIXTURE: &str = "tests/fixtures/sample_malformed.coco.json";

pub fn fixture(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(path)
}

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// One image of a generated COCO file.
pub struct CocoImage<'a> {
    pub id: u64,
    pub file_name: &'a str,
    pub width: u32,
    pub height: u32,
    /// `(category_id, [x, y, w, h])`
    pub boxes: Vec<(u64, [f64; 4])>,
}

/// Renders a COCO document over `categories` (ids start at 1) and `images`.
pub fn coco_json(categories: &[&str], images: &[CocoImage<'_>]) -> String {
    let categories = serde_json::Value::Array(
        categories
            .iter()
            .enumerate()
            .map(|(idx, name)| serde_json::json!({"id": idx + 1, "name": name}))
            .collect(),
    );

    let mut next_annotation = 1u64;
    let mut annotations = Vec::new();
    for image in images {
        for (category_id, bbox) in &image.boxes {
            annotations.push(serde_json::json!({
                "id": next_annotation,
                "image_id": image.id,
                "category_id": category_id,
                "bbox": bbox,
                "iscrowd": 0,
            }));
            next_annotation += 1;
        }
    }

    let images: Vec<serde_json::Value> = images
        .iter()
        .map(|image| {
            serde_json::json!({
                "id": image.id,
                "file_name": image.file_name,
                "width": image.width,
                "height": image.height,
            })
        })
        .collect();

    serde_json::json!({
        "images": images,
        "categories": categories,
        "annotations": annotations,
    })
    .to_string()
}

/// Sorted relative paths of every file below `root`.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .expect("entry below root")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}
