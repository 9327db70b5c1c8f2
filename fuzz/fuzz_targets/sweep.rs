#![no_main]

use libfuzzer_sys::fuzz_target;
use tvlai_core::parse_listing;
use tvlai_emulate::{Analyzer, AnalyzerConfig, UnimplementedPolicy};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(blocks) = parse_listing(text) else {
        return;
    };

    // Malformed ops may fail, but a sweep should never panic
    let config = AnalyzerConfig {
        on_unimplemented: UnimplementedPolicy::Havoc,
        max_instructions: 256,
        ..AnalyzerConfig::default()
    };
    let mut analyzer = Analyzer::new(config);
    let _ = analyzer.run(&blocks);
});
