#![no_main]

use libfuzzer_sys::fuzz_target;
use lookout_dump::{Dumper, DumperLimits};

mod utils;

fuzz_target!(|data: &[u8]| {
    let Some(text) = utils::capped_text(data) else {
        return;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };

    // Tight limits so truncation paths get exercised on small inputs.
    let dumper = Dumper::new(DumperLimits {
        level_limit: 3,
        items_count_limit: 4,
        item_size_limit: 16,
        dump_size_limit: 512,
    });
    let dumped = dumper.dump_value(&value);
    serde_json::to_string(&dumped).expect("dumped values always serialize");

    let unbounded = Dumper::default().dump_value(&value);
    serde_json::to_string(&unbounded).expect("dumped values always serialize");
});
