#![no_main]

use libfuzzer_sys::fuzz_target;
use pg_transport::connection::SessionState;
use pg_transport::protocol::decode_message;

const MAX_LEN: usize = 1 << 20;

fuzz_target!(|data: &[u8]| {
    let mut offset = 0;
    let mut session = SessionState::new();

    // Several frontend messages may arrive in a single TCP segment
    while offset < data.len() {
        match decode_message(&data[offset..], MAX_LEN) {
            Ok(Some((msg, consumed))) => {
                assert!(consumed >= 5);
                session.observe(&msg);
                offset += consumed;
            }
            Ok(None) | Err(_) => break,
        }
    }
});
