//! Fuzz target for the `STATS` table parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_stats_parser
//!
//! Besides looking for panics, checks that every data line ends up either as
//! a record or as an error.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let rsp = ngctl_core::stats::parse_stats(s);
        let body = s.trim_end_matches(['\n', '\r']);
        let data_lines = if body.is_empty() {
            0
        } else {
            body.split('\n').count() - 1
        };
        assert_eq!(rsp.stats.len() + rsp.errors.len(), data_lines);

        let families = ngctl_core::metrics::stats_to_families(&rsp.stats);
        let _ = ngctl_core::metrics::encode_text(&families);
    }
});
