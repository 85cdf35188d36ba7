#![no_main]

use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;
use typedkv_core::codec;

fuzz_target!(|data: &[u8]| {
    let _ = codec::decode::<u64>(data);
    let _ = codec::decode::<String>(data);
    let _ = codec::decode::<Vec<u8>>(data);
    let _ = codec::decode::<BTreeMap<String, Vec<u32>>>(data);

    if let Some(rest) = codec::strip_prefix(b"ns", data) {
        assert_eq!(codec::prefix_key(b"ns", rest), data);
    }
});
