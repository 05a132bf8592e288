//! The two small value types every other component passes around:
//! `RawResource` (an undecoded resource body) and `Dependency` (an edge in
//! the dependency graph).

use crate::asset_id::AssetId;
use crate::fourcc::FourCC;

/// A `(type, bytes)` pair — the canonical in-memory representation of any
/// resource whose typed parser hasn't been invoked (or didn't need to be).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResource {
    pub kind: FourCC,
    pub data: Vec<u8>,
}

impl RawResource {
    pub fn new(kind: FourCC, data: Vec<u8>) -> Self {
        Self { kind, data }
    }
}

/// An edge in the asset dependency graph. `exclude_from_mlvl` marks a
/// dependency that is real but must be omitted from the MLVL-level list
/// (self-edges, and a small per-game hard-coded ignore list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub kind: FourCC,
    pub asset_id: AssetId,
    pub exclude_from_mlvl: bool,
}

impl Dependency {
    pub fn new(kind: FourCC, asset_id: AssetId) -> Self {
        Self { kind, asset_id, exclude_from_mlvl: false }
    }

    pub fn excluded(kind: FourCC, asset_id: AssetId) -> Self {
        Self { kind, asset_id, exclude_from_mlvl: true }
    }

    pub fn with_exclude(mut self, exclude: bool) -> Self {
        self.exclude_from_mlvl = self.exclude_from_mlvl || exclude;
        self
    }
}
