//! Which title is being parsed, and the handful of behaviors that differ by
//! title: asset id width, id validity, whether LZO framing is used, and the
//! per-game MLVL-dependency-ignore set.

use crate::asset_id::AssetId;

/// The supported Retro Studios titles. Ordered by release so `Game::Echoes <
/// Game::Corruption` reads the way the original `game_check.Game` enum's
/// `__lt__`/`__ge__` overloads intended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Game {
    Prime = 1,
    Echoes = 2,
    Corruption = 3,
}

impl Game {
    /// Prime 1/2 address resources with a 32-bit id.
    pub fn uses_asset_id_32(self) -> bool {
        self <= Game::Echoes
    }

    /// Prime 3 addresses resources with a 64-bit id.
    pub fn uses_asset_id_64(self) -> bool {
        self == Game::Corruption
    }

    /// Echoes and Corruption LZO-frame their PAK bodies and MREA blocks;
    /// Prime 1 compresses per-resource (or not at all).
    pub fn uses_lzo(self) -> bool {
        matches!(self, Game::Echoes | Game::Corruption)
    }

    /// The reserved "invalid" id for this game's asset id width.
    pub fn invalid_asset_id(self) -> AssetId {
        if self.uses_asset_id_32() {
            AssetId::Id32(u32::MAX)
        } else {
            AssetId::Id64(u64::MAX)
        }
    }

    /// Prime 1/2 additionally treat zero as invalid; Corruption does not
    /// (0 is a legitimate 64-bit id there).
    pub fn is_valid_asset_id(self, id: AssetId) -> bool {
        if self.uses_asset_id_32() && id.is_zero() {
            return false;
        }
        id != self.invalid_asset_id()
    }

    /// Ids that are real dependencies but must never surface in an MLVL-level
    /// dependency list, regardless of what their source flagged. Echoes has
    /// exactly one documented entry; no other title needs one.
    pub fn mlvl_dependencies_to_ignore(self) -> &'static [u32] {
        match self {
            Game::Echoes => &[0x7b2ea5b1],
            _ => &[],
        }
    }

    /// PAK body alignment in bytes. Prime 1 pads to 16, Echoes/Corruption
    /// pad to 32 (matching their global LZO block alignment).
    pub fn pak_alignment(self) -> u64 {
        if self == Game::Prime {
            16
        } else {
            32
        }
    }
}
