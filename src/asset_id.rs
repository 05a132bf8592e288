//! The game-dependent integer that names a resource.
//!
//! Prime 1 and Prime 2 address resources with a 32-bit id; Prime 3 widens to
//! 64 bits. The remaster's 128-bit GUID scheme is out of scope (spec §1:
//! Prime 1-3 only) but the enum is left open to grow an `Id128` variant
//! without touching call sites, since every consumer matches on `AssetId`
//! rather than assuming a width.

use std::fmt;

/// A resource identifier, sized per the owning game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetId {
    Id32(u32),
    Id64(u64),
}

impl AssetId {
    pub fn is_zero(self) -> bool {
        match self {
            AssetId::Id32(v) => v == 0,
            AssetId::Id64(v) => v == 0,
        }
    }

    /// Widens a 32-bit id to `u64` for use in maps keyed uniformly regardless
    /// of the owning game's width.
    pub fn as_u64(self) -> u64 {
        match self {
            AssetId::Id32(v) => v as u64,
            AssetId::Id64(v) => v,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Id32(v) => write!(f, "{v:#010x}"),
            AssetId::Id64(v) => write!(f, "{v:#018x}"),
        }
    }
}

/// Either a user-facing name (resolved through the manager's custom-asset
/// alias table) or a raw asset id. Most manager operations accept this so
/// callers can pass either a literal id or a registered alias.
#[derive(Debug, Clone)]
pub enum NameOrAssetId {
    Name(String),
    Id(AssetId),
}

impl From<AssetId> for NameOrAssetId {
    fn from(id: AssetId) -> Self {
        NameOrAssetId::Id(id)
    }
}

impl From<&str> for NameOrAssetId {
    fn from(name: &str) -> Self {
        NameOrAssetId::Name(name.to_string())
    }
}

impl From<String> for NameOrAssetId {
    fn from(name: String) -> Self {
        NameOrAssetId::Name(name)
    }
}

impl fmt::Display for NameOrAssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrAssetId::Name(n) => write!(f, "{n}"),
            NameOrAssetId::Id(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_hex() {
        assert_eq!(AssetId::Id32(0xDEAD_BEEF).to_string(), "0xdeadbeef");
        assert_eq!(AssetId::Id64(0xDEAD_BEEF).to_string(), "0x00000000deadbeef");
    }

    #[test]
    fn widening_preserves_value() {
        assert_eq!(AssetId::Id32(42).as_u64(), 42);
        assert_eq!(AssetId::Id64(42).as_u64(), 42);
    }
}
