#![no_main]

use libfuzzer_sys::fuzz_target;
use oblit_protocol::core::frame::WireVersion;
use oblit_protocol::core::guard::OverflowGuard;
use oblit_protocol::core::reassembler::StreamReassembler;

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size; the rest is the byte stream
    let Some((&step, stream)) = data.split_first() else {
        return;
    };
    let step = usize::from(step).max(1);

    let guard = OverflowGuard::for_max_payload(256);
    let mut reassembler = StreamReassembler::new(WireVersion::V1, guard);
    for chunk in stream.chunks(step) {
        if reassembler.feed(chunk).is_err() {
            assert_eq!(reassembler.buffered(), 0);
            return;
        }
        assert!(reassembler.buffered() <= guard.limit());
    }
});
