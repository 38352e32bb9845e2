//! Fuzz target for TFRecords container parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the container reader in
//! lenient mode and dumps whatever records survive, checking for panics,
//! crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tfrec::{ReadOptions, TfRecordsReader};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(reader) = TfRecordsReader::with_options(data, &ReadOptions { lenient: true }) {
        let _ = reader.to_json();
    }
});
