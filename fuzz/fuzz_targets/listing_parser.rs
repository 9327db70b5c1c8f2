#![no_main]

use libfuzzer_sys::fuzz_target;
use tvlai_core::parse_listing;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Parse errors are expected for malformed input
    if let Ok(blocks) = parse_listing(text) {
        // Rendered blocks must parse back to the same ops
        for block in &blocks {
            let rendered = block.to_string();
            let reparsed = parse_listing(&rendered).expect("rendered block must parse");
            assert_eq!(reparsed.len(), 1);
            assert_eq!(reparsed[0].ops, block.ops);
        }
    }
});
