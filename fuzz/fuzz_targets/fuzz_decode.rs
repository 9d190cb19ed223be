#![no_main]

use libfuzzer_sys::fuzz_target;
use oblit_protocol::core::frame::decode;

fuzz_target!(|data: &[u8]| {
    // Walk every complete frame; malformed input must never panic
    let mut rest = data;
    while let Some(decoded) = decode(rest) {
        assert!(decoded.remainder.len() < rest.len());
        rest = decoded.remainder;
    }
});
