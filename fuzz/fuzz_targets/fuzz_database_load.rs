#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // This should never crash or panic, even on garbage input
    if let Ok(db) = mmdb_reader::Database::from_bytes(data.to_vec()) {
        let _ = db.metadata_value();
        let _ = db.lookup_str("1.2.3.4");
        let _ = db.lookup_str("2001:db8::1");
    }
});
