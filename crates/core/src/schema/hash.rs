//! FNV-1a hashing for the field name index
//!
//! Field names are case-insensitive, so the index hashes the ASCII-lowercased
//! bytes. Lookups must still compare the names after a hash hit.

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001B3;

/// FNV-1a 64-bit hash of the ASCII-lowercased input (compile-time capable)
pub const fn fnv1a_64_nocase(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < data.len() {
        hash ^= data[i].to_ascii_lowercase() as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Index key for a field name
#[inline]
pub fn name_key(name: &str) -> u64 {
    fnv1a_64_nocase(name.as_bytes())
}
