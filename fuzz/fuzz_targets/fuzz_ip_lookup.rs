#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdb_reader::Database;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fuzz_target!(|data: &[u8]| {
    // First 16 bytes pick the address, the rest is the database image
    if data.len() < 16 {
        return;
    }
    let (addr, image) = data.split_at(16);
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(addr);

    if let Ok(db) = Database::from_bytes(image.to_vec()) {
        let _ = db.lookup_ip(IpAddr::V6(Ipv6Addr::from(bytes)));
        let _ = db.lookup_ip(IpAddr::V4(Ipv4Addr::new(
            bytes[0], bytes[1], bytes[2], bytes[3],
        )));

        let mut high = [0u8; 8];
        high.copy_from_slice(&bytes[..8]);
        let _ = db.lookup(u64::from_be_bytes(high), u32::from(bytes[8] % 65));
    }
});
