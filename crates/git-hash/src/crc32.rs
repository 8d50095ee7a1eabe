//! CRC32 (IEEE 802.3 polynomial), for pack-index consumers.
//!
//! Hand-rolled rather than pulled in via `crc32fast`: it's a three-line
//! table-driven checksum and this crate already owns the hot path for
//! hashing/compression, so there's no remaining reason to add a dependency
//! for it (see DESIGN.md).

const POLY: u32 = 0xEDB8_8320;

fn table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLY ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// Compute the IEEE CRC32 of `bytes`.
#[must_use]
pub fn crc32_ieee(bytes: &[u8]) -> u32 {
    let table = table();
    let mut crc = 0xFFFF_FFFFu32;
    for &b in bytes {
        let idx = ((crc ^ u32::from(b)) & 0xFF) as usize;
        crc = table[idx] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}
