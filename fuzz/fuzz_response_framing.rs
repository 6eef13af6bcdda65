//! Fuzz target for control-socket response framing.
//!
//! Run with: cargo +nightly fuzz run fuzz_response_framing

#![no_main]

use libfuzzer_sys::fuzz_target;
use ngctl_core::channel::read_response;

fuzz_target!(|data: &[u8]| {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    rt.block_on(async {
        if let Ok(body) = read_response(tokio::io::BufReader::new(data), 4096).await {
            // Lossy decoding widens a bad byte to U+FFFD, at most 3x.
            assert!(body.len() <= 3 * 4096);
            assert!(body.lines().all(|l| l != "."));
        }
    });
});
