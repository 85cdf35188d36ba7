#![no_main]

use libfuzzer_sys::fuzz_target;
use typedkv_snapshot::BackupReader;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the reader, only yield errors
    if let Ok(reader) = BackupReader::new(data) {
        for entry in reader.take(10_000) {
            if entry.is_err() {
                break;
            }
        }
    }
});
