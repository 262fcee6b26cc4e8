//! Fuzz target for YOLO label parsing.
//!
//! Exercises the single-line parser and the verifier's whole-record parser
//! on arbitrary UTF-8 input.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use cococonv::ir::io_yolo::fuzz_parse_label_line;
use cococonv::ir::ImageDims;
use cococonv::verify::parse_yolo_record;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Some(first) = text.lines().next() {
        let _ = fuzz_parse_label_line(first);
    }
    let classes = ["person".to_string(), "car".to_string()];
    let _ = parse_yolo_record(text, Path::new("<fuzz>"), &classes, ImageDims::new(640, 480));
});
