//! Fuzz target for VOC record parsing.
//!
//! Runs arbitrary bytes through the raw XML reader and the verifier's record
//! parser, which also resolves class names and rejects zero-sized images.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use cococonv::ir::io_voc_xml::from_voc_xml_slice;
use cococonv::verify::parse_voc_record;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_voc_xml_slice(data);

    let Ok(xml) = std::str::from_utf8(data) else {
        return;
    };
    let classes = ["person".to_string(), "car".to_string()];
    let _ = parse_voc_record(xml, Path::new("<fuzz>"), &classes);
});
