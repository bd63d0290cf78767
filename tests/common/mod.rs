#![allow(dead_code)]

pub fn setup_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Walk a descriptor table by its length bytes, returning `(type, bytes)` per descriptor
pub fn walk(table: &[u8]) -> Vec<(u8, &[u8])> {
    let mut out = vec![];
    let mut offset = 0;
    while offset < table.len() {
        let len = table[offset] as usize;
        assert!(len >= 2, "zero-length descriptor at {offset}");
        out.push((table[offset + 1], &table[offset..offset + len]));
        offset += len;
    }
    assert_eq!(offset, table.len());
    out
}

/// Little-endian 16-bit word at `at`
pub fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}
