//! Fuzz target for COCO JSON parsing.
//!
//! Feeds arbitrary bytes to the COCO reader and, when they parse, through
//! the split index validation as well.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_json_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use cococonv::index::AnnotationIndex;
use cococonv::ir::io_coco_json::from_coco_slice;
use cococonv::ir::Split;

fuzz_target!(|data: &[u8]| {
    // 10MB is generous for one annotation file.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if from_coco_slice(data, Split::Train).is_err() {
        return;
    }
    if let Ok(json) = std::str::from_utf8(data) {
        let _ = AnnotationIndex::from_sources(&[(Split::Train, json)]);
    }
});
