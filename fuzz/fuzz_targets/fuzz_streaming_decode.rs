#![no_main]

use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use pg_transport::protocol::decode_message;

const MAX_LEN: usize = 1 << 20;

#[derive(Debug)]
struct StreamingInput {
    data: Vec<u8>,
    split_points: Vec<u8>,
}

impl<'a> Arbitrary<'a> for StreamingInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        let data: Vec<u8> = u.arbitrary()?;
        let split_points: Vec<u8> = u.arbitrary()?;
        Ok(Self { data, split_points })
    }
}

fuzz_target!(|input: StreamingInput| {
    if input.data.is_empty() {
        return;
    }

    // Generate split indices from the raw split_points bytes
    let mut splits: Vec<usize> = input
        .split_points
        .iter()
        .map(|&b| (b as usize) % (input.data.len() + 1))
        .collect();
    splits.push(0);
    splits.push(input.data.len());
    splits.sort_unstable();
    splits.dedup();

    // Chunked delivery must decode the same messages as one contiguous buffer
    let mut whole = Vec::new();
    let mut offset = 0;
    while let Ok(Some((msg, consumed))) = decode_message(&input.data[offset..], MAX_LEN) {
        whole.push(msg);
        offset += consumed;
    }

    let mut chunked = Vec::new();
    let mut buf = Vec::new();
    'outer: for window in splits.windows(2) {
        buf.extend_from_slice(&input.data[window[0]..window[1]]);
        loop {
            match decode_message(&buf, MAX_LEN) {
                Ok(Some((msg, consumed))) => {
                    chunked.push(msg);
                    buf.drain(..consumed);
                }
                Ok(None) => break,
                Err(_) => break 'outer,
            }
        }
    }

    assert_eq!(whole, chunked);
});
