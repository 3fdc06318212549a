#![no_main]

use libfuzzer_sys::fuzz_target;
use lookout_proto::{parse_backtrace, tags_from_label};

mod utils;

fuzz_target!(|data: &[u8]| {
    let Some(text) = utils::capped_text(data) else {
        return;
    };

    for call in parse_backtrace(text) {
        assert!(!call.call.is_empty());
        assert_eq!(call.file.is_some(), call.line.is_some());
    }
    for tag in tags_from_label(text) {
        assert!(!tag.is_empty());
    }
});
