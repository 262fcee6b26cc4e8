#![allow(dead_code)]

use cococonv::ir::{ImageDims, RawBox};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub const CLASS_NAMES: [&str; 4] = ["person", "car", "dog", "bicycle"];

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_dims() -> BoxedStrategy<ImageDims> {
    (1u32..=512, 1u32..=512)
        .prop_map(|(w, h)| ImageDims::new(w, h))
        .boxed()
}

/// Any finite COCO box near `dims`, including negative, zero-sized and
/// fully outside ones.
pub fn arb_coco_box_near(dims: ImageDims) -> BoxedStrategy<RawBox> {
    let (w, h) = (dims.w(), dims.h());
    (-w..2.0 * w, -h..2.0 * h, -w..w, -h..h)
        .prop_map(|(x, y, w, h)| RawBox::Coco { x, y, w, h })
        .boxed()
}

/// Integer COCO box with positive extent lying inside `dims`.
pub fn arb_int_box_within(dims: ImageDims) -> BoxedStrategy<RawBox> {
    let (img_w, img_h) = (dims.width, dims.height);
    (0..img_w, 0..img_h)
        .prop_flat_map(move |(x, y)| (Just(x), Just(y), 1..=img_w - x, 1..=img_h - y))
        .prop_map(|(x, y, w, h)| RawBox::Coco {
            x: f64::from(x),
            y: f64::from(y),
            w: f64::from(w),
            h: f64::from(h),
        })
        .boxed()
}

/// `(category_id, [x, y, w, h])` with integer values that may reach past any
/// border or have zero extent.
fn arb_int_annotation(width: u32, height: u32) -> BoxedStrategy<(u64, [f64; 4])> {
    let (w, h) = (i64::from(width), i64::from(height));
    (
        1u64..=CLASS_NAMES.len() as u64,
        -10..w + 10,
        -10..h + 10,
        0..=w,
        0..=h,
    )
        .prop_map(|(category, x, y, bw, bh)| {
            (category, [x as f64, y as f64, bw as f64, bh as f64])
        })
        .boxed()
}

/// A COCO document with up to `max_images` images of unique file names and
/// up to `max_boxes` annotations each.
pub fn arb_coco_source(max_images: usize, max_boxes: usize) -> BoxedStrategy<String> {
    let image = (1u32..=256, 1u32..=256)
        .prop_flat_map(move |(w, h)| {
            (
                Just((w, h)),
                prop::collection::vec(arb_int_annotation(w, h), 0..=max_boxes),
            )
        })
        .boxed();

    prop::collection::vec(image, 1..=max_images)
        .prop_map(|images| {
            let categories: Vec<serde_json::Value> = CLASS_NAMES
                .iter()
                .enumerate()
                .map(|(idx, name)| serde_json::json!({"id": idx + 1, "name": name}))
                .collect();

            let mut image_values = Vec::new();
            let mut annotations = Vec::new();
            for (idx, ((w, h), boxes)) in images.into_iter().enumerate() {
                let image_id = idx as u64 + 1;
                image_values.push(serde_json::json!({
                    "id": image_id,
                    "file_name": format!("img_{image_id:04}.jpg"),
                    "width": w,
                    "height": h,
                }));
                for (category_id, bbox) in boxes {
                    annotations.push(serde_json::json!({
                        "id": annotations.len() + 1,
                        "image_id": image_id,
                        "category_id": category_id,
                        "bbox": bbox,
                    }));
                }
            }

            serde_json::json!({
                "images": image_values,
                "categories": categories,
                "annotations": annotations,
            })
            .to_string()
        })
        .boxed()
}

/// A non-empty allow-list drawn from [`CLASS_NAMES`], possibly repeating names.
pub fn arb_allow_list() -> BoxedStrategy<Vec<String>> {
    prop::collection::vec(prop::sample::select(CLASS_NAMES.to_vec()), 1..=6)
        .prop_map(|names| names.into_iter().map(str::to_string).collect())
        .boxed()
}
