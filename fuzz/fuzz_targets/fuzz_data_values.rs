#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdb_reader::{ByteStore, DataDecoder};

fuzz_target!(|data: &[u8]| {
    let store = ByteStore::from_vec(data.to_vec());
    let decoder = DataDecoder::new(&store, 0).with_max_depth(32);
    for offset in 0..store.len().min(64) {
        if let Ok(value) = decoder.decode(offset) {
            // Display must cope with anything the decoder produces
            let _ = value.to_string();
        }
    }
});
