//! Fuzz target for `Example` payload decoding.
//!
//! Anything that decodes must re-encode and decode to the same feature map.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tfrec::wire::{decode_example, encode_example};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(features) = decode_example(data) {
        let reencoded = encode_example(&features);
        let again = decode_example(&reencoded).expect("re-encoded example must decode");
        assert_eq!(features.len(), again.len());
    }
});
