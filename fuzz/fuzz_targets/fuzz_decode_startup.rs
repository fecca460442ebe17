#![no_main]

use libfuzzer_sys::fuzz_target;
use pg_transport::protocol::decode_startup;

fuzz_target!(|data: &[u8]| {
    if let Ok(Some((packet, consumed))) = decode_startup(data, 10_000) {
        assert!(consumed >= 8 && consumed <= data.len());
        let _ = packet.parameters();
    }
});
