//! Integration tests for COCO to YOLO conversion.

use std::fs;

use cococonv::conversion::{convert, ConvertOptions, TargetFormat};
use cococonv::index::AnnotationIndex;
use cococonv::ir::Split;
use cococonv::normalize::DropReason;
use cococonv::verify::{verify_yolo_dir, DiscrepancyCode, VerifyOptions};

mod common;
use common::{coco_json, fixture, list_files, write_bmp, CocoImage, TRAIN_FIXTURE, VAL_FIXTURE};

fn small_source() -> String {
    coco_json(
        &["person", "bicycle"],
        &[
            CocoImage {
                id: 1,
                file_name: "img_a.bmp",
                width: 20,
                height: 10,
                boxes: vec![(1, [6.0, 3.0, 8.0, 4.0]), (2, [1.0, 2.0, 2.0, 2.0])],
            },
            CocoImage {
                id: 2,
                file_name: "img_b.bmp",
                width: 12,
                height: 8,
                boxes: vec![(2, [3.0, 2.0, 6.0, 4.0])],
            },
            CocoImage {
                id: 3,
                file_name: "img_c.bmp",
                width: 6,
                height: 6,
                boxes: vec![],
            },
        ],
    )
}

fn write_small_images(dir: &std::path::Path) {
    write_bmp(&dir.join("img_a.bmp"), 20, 10);
    write_bmp(&dir.join("img_b.bmp"), 12, 8);
    write_bmp(&dir.join("img_c.bmp"), 6, 6);
}

#[test]
fn writes_normalized_center_rows() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let index = AnnotationIndex::load(&[(Split::Train, fixture(TRAIN_FIXTURE))]).expect("index");
    let summary =
        convert(&index, &ConvertOptions::new(temp.path(), TargetFormat::Yolo)).expect("convert");

    assert_eq!(summary.totals.kept, 5);
    assert_eq!(summary.totals.images_written, 3);

    let label =
        fs::read_to_string(temp.path().join("labels/train/000002.txt")).expect("read label");
    assert_eq!(
        label,
        "1 0.275000 0.300000 0.500000 0.500000\n0 0.006250 0.012500 0.012500 0.025000\n"
    );

    assert_eq!(
        fs::read_to_string(temp.path().join("train.txt")).expect("read manifest"),
        "images/train/000001.jpg\nimages/train/000002.jpg\nimages/train/000003.jpg\n"
    );
}

#[test]
fn data_yaml_lists_splits_and_names() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let index = AnnotationIndex::load(&[
        (Split::Train, fixture(TRAIN_FIXTURE)),
        (Split::Val, fixture(VAL_FIXTURE)),
    ])
    .expect("index");
    let mut options = ConvertOptions::new(temp.path(), TargetFormat::Yolo);
    options.allow_list = Some(vec!["dog".to_string(), "cat".to_string()]);
    convert(&index, &options).expect("convert");

    let yaml = fs::read_to_string(temp.path().join("data.yaml")).expect("read data.yaml");
    let value: serde_yaml::Value = serde_yaml::from_str(&yaml).expect("parse data.yaml");
    assert_eq!(value["train"].as_str(), Some("train.txt"));
    assert_eq!(value["val"].as_str(), Some("val.txt"));
    assert_eq!(value["nc"].as_u64(), Some(2));
    assert_eq!(value["names"][0].as_str(), Some("dog"));
    assert_eq!(value["names"][1].as_str(), Some("cat"));
}

#[test]
fn train_only_source_omits_val_from_data_yaml() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let index = AnnotationIndex::load(&[(Split::Train, fixture(TRAIN_FIXTURE))]).expect("index");
    convert(&index, &ConvertOptions::new(temp.path(), TargetFormat::Yolo)).expect("convert");

    let yaml = fs::read_to_string(temp.path().join("data.yaml")).expect("read data.yaml");
    let value: serde_yaml::Value = serde_yaml::from_str(&yaml).expect("parse data.yaml");
    assert!(value.get("val").is_none(), "{yaml}");
    assert!(!temp.path().join("labels/val").exists());
}

#[test]
fn verify_falls_back_to_image_headers() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let images = temp.path().join("src_images");
    write_small_images(&images);

    let json = small_source();
    let index = AnnotationIndex::from_sources(&[(Split::Train, json.as_str())]).expect("index");
    let out = temp.path().join("yolo");
    let mut options = ConvertOptions::new(&out, TargetFormat::Yolo);
    options.image_dirs.insert(Split::Train, images);
    let summary = convert(&index, &options).expect("convert");
    assert_eq!(summary.totals.images_written, 2);
    assert_eq!(summary.totals.images_skipped_empty, 1);

    assert_eq!(
        list_files(&out),
        [
            "classes.txt",
            "data.yaml",
            "images/train/img_a.bmp",
            "images/train/img_b.bmp",
            "labels/train/img_a.txt",
            "labels/train/img_b.txt",
            "train.txt",
        ]
    );

    // No source dimensions: every size comes from the linked BMP headers.
    let report = verify_yolo_dir(&out, &VerifyOptions::default()).expect("verify");
    assert!(report.is_ok(), "{report}");
    assert_eq!(report.image_count(), 2);
    assert_eq!(report.box_count(), 3);

    let person = &report.images[0].boxes[0];
    assert_eq!(person.class_name, "person");
    assert!((person.bbox.xmin - 6.0).abs() < 1e-3);
    assert!((person.bbox.xmax - 14.0).abs() < 1e-3);
    assert!((person.bbox.ymax - 7.0).abs() < 1e-3);
}

#[test]
fn verify_reports_missing_dimensions() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let json = small_source();
    let index = AnnotationIndex::from_sources(&[(Split::Train, json.as_str())]).expect("index");
    convert(&index, &ConvertOptions::new(temp.path(), TargetFormat::Yolo)).expect("convert");

    let report = verify_yolo_dir(temp.path(), &VerifyOptions::default()).expect("verify");
    assert_eq!(report.discrepancy_count(), 2);
    assert!(report
        .discrepancies()
        .all(|(_, d)| d.code == DiscrepancyCode::MissingDimensions));

    let report =
        verify_yolo_dir(temp.path(), &VerifyOptions::from_index(&index)).expect("verify");
    assert!(report.is_ok(), "{report}");
}

#[test]
fn verify_flags_bad_label_rows() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let json = small_source();
    let index = AnnotationIndex::from_sources(&[(Split::Train, json.as_str())]).expect("index");
    convert(&index, &ConvertOptions::new(temp.path(), TargetFormat::Yolo)).expect("convert");
    let opts = VerifyOptions::from_index(&index);

    fs::write(temp.path().join("labels/train/img_a.txt"), "7 0.5 0.5 0.2 0.2\n")
        .expect("rewrite label a");
    fs::write(temp.path().join("labels/train/img_b.txt"), "").expect("empty label b");
    fs::write(temp.path().join("labels/train/stray.txt"), "0 0.5 0.5 0.1 0.1\n")
        .expect("write stray label");

    let report = verify_yolo_dir(temp.path(), &opts).expect("verify");
    let codes: Vec<DiscrepancyCode> = report.discrepancies().map(|(_, d)| d.code).collect();
    assert_eq!(
        codes,
        [
            DiscrepancyCode::UnknownClass,
            DiscrepancyCode::EmptyRecord,
            DiscrepancyCode::OrphanRecord,
        ]
    );
}

#[test]
fn verify_flags_rows_outside_the_image() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let json = small_source();
    let index = AnnotationIndex::from_sources(&[(Split::Train, json.as_str())]).expect("index");
    convert(&index, &ConvertOptions::new(temp.path(), TargetFormat::Yolo)).expect("convert");

    fs::write(
        temp.path().join("labels/train/img_b.txt"),
        "1 0.95 0.5 0.4 0.2\n",
    )
    .expect("rewrite label b");

    let report =
        verify_yolo_dir(temp.path(), &VerifyOptions::from_index(&index)).expect("verify");
    let codes: Vec<DiscrepancyCode> = report.discrepancies().map(|(_, d)| d.code).collect();
    assert_eq!(codes, [DiscrepancyCode::OutsideImage]);
}

#[test]
fn hairline_box_is_dropped_instead_of_written_with_zero_width() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let json = coco_json(
        &["person"],
        &[CocoImage {
            id: 1,
            file_name: "wide.jpg",
            width: 800,
            height: 600,
            boxes: vec![(1, [10.0, 10.0, 0.0003, 20.0]), (1, [100.0, 100.0, 80.0, 60.0])],
        }],
    );
    let index = AnnotationIndex::from_sources(&[(Split::Train, json.as_str())]).expect("index");
    let summary =
        convert(&index, &ConvertOptions::new(temp.path(), TargetFormat::Yolo)).expect("convert");

    assert_eq!(summary.totals.kept, 1);
    assert_eq!(summary.totals.dropped, 1);
    assert_eq!(
        summary.drop_reasons.get(&DropReason::DegenerateAfterRounding),
        Some(&1)
    );

    let label = fs::read_to_string(temp.path().join("labels/train/wide.txt")).expect("read label");
    assert_eq!(label, "0 0.175000 0.216667 0.100000 0.100000\n");

    let report =
        verify_yolo_dir(temp.path(), &VerifyOptions::from_index(&index)).expect("verify");
    assert!(report.is_ok(), "{report}");
}

#[test]
fn rerun_without_val_removes_its_labels() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let full = AnnotationIndex::load(&[
        (Split::Train, fixture(TRAIN_FIXTURE)),
        (Split::Val, fixture(VAL_FIXTURE)),
    ])
    .expect("index");
    convert(&full, &ConvertOptions::new(temp.path(), TargetFormat::Yolo)).expect("first convert");
    assert!(temp.path().join("labels/val").is_dir());

    let train = AnnotationIndex::load(&[(Split::Train, fixture(TRAIN_FIXTURE))]).expect("index");
    convert(&train, &ConvertOptions::new(temp.path(), TargetFormat::Yolo)).expect("second convert");

    assert!(!temp.path().join("labels/val").exists());
    assert!(!temp.path().join("val.txt").exists());
    let report =
        verify_yolo_dir(temp.path(), &VerifyOptions::from_index(&train)).expect("verify");
    assert!(report.is_ok(), "{report}");
}
