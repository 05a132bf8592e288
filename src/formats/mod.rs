//! Individual resource-type codecs. Spec §1 treats these as external
//! collaborators; `mapw` is kept in-tree as the one canonical worked example
//! (spec §6), since it's simple enough to fully specify and is exercised
//! directly by the registry's cheat table.

pub mod mapw;
