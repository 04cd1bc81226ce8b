//! Hashed resource names.

use std::fmt::{Display, Formatter};

use static_assertions::const_assert_eq;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// A resource name hashed with 64-bit FNV-1a. Hashes are stable across runs and platforms, so they can be
/// computed at compile time and stored in assets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameHash(pub u64);

impl NameHash {
    /// Hash a resource name.
    pub const fn of(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        NameHash(hash)
    }
}

const_assert_eq!(NameHash::of("").0, FNV_OFFSET_BASIS);

impl From<&str> for NameHash {
    fn from(value: &str) -> Self {
        NameHash::of(value)
    }
}

impl Display for NameHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
