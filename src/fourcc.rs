//! The 4-byte ASCII type tag every resource is stamped with (`MREA`, `STRG`,
//! `ANCS`, `AGSC`, `ATBL`, `DGRP`, ...).

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(tag: &[u8; 4]) -> Self {
        FourCC(*tag)
    }

    pub fn from_u32_be(value: u32) -> Self {
        FourCC(value.to_be_bytes())
    }

    pub fn as_u32_be(self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if s.chars().all(|c| c.is_ascii_graphic()) => write!(f, "{s}"),
            _ => write!(f, "{:02x}{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2], self.0[3]),
        }
    }
}

/// Shorthand for declaring a tag constant from an ASCII literal, e.g.
/// `pub const MREA: FourCC = fourcc(b"MREA");`.
pub const fn fourcc(tag: &[u8; 4]) -> FourCC {
    FourCC::new(tag)
}

pub mod tags {
    use super::{fourcc, FourCC};

    pub const MREA: FourCC = fourcc(b"MREA");
    pub const MLVL: FourCC = fourcc(b"MLVL");
    pub const STRG: FourCC = fourcc(b"STRG");
    pub const ANCS: FourCC = fourcc(b"ANCS");
    pub const AGSC: FourCC = fourcc(b"AGSC");
    pub const ATBL: FourCC = fourcc(b"ATBL");
    pub const DGRP: FourCC = fourcc(b"DGRP");
    pub const MAPW: FourCC = fourcc(b"MAPW");
    pub const MAPA: FourCC = fourcc(b"MAPA");
    pub const TXTR: FourCC = fourcc(b"TXTR");
    pub const CMDL: FourCC = fourcc(b"CMDL");
    pub const RULE: FourCC = fourcc(b"RULE");
    pub const FSM2: FourCC = fourcc(b"FSM2");
    pub const PTLA: FourCC = fourcc(b"PTLA");
    pub const EGMC: FourCC = fourcc(b"EGMC");
    pub const PATH: FourCC = fourcc(b"PATH");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_be_u32() {
        let tag = tags::MREA;
        assert_eq!(FourCC::from_u32_be(tag.as_u32_be()), tag);
    }

    #[test]
    fn displays_as_ascii() {
        assert_eq!(tags::STRG.to_string(), "STRG");
    }
}
