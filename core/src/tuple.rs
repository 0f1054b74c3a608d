//! The fixed-size record partitioned by this crate.

use serde::{Deserialize, Serialize};

/// A 16-byte key/value record.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tuple {
    pub key: u64,
    pub value: u64,
}

impl Tuple {
    pub const fn new(key: u64, value: u64) -> Self {
        Self { key, value }
    }
}

impl From<(u64, u64)> for Tuple {
    fn from((key, value): (u64, u64)) -> Self {
        Self::new(key, value)
    }
}
