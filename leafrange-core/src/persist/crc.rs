//! CRC-32 (IEEE 802.3, reflected)

const POLY: u32 = 0xEDB8_8320;

/// CRC-32 of `data`
pub fn crc32(data: &[u8]) -> u32 {
    !crc32_update(0xFFFF_FFFF, data)
}

/// Fold `data` into a running (non-inverted) CRC
pub fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
