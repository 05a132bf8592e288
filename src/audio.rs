//! The audio-group dependency index (component I): maps sound ids to their
//! owning `AGSC` asset, built once per session for Echoes.
//!
//! Grounded on `asset_manager.py`'s audio-group table build: scan every
//! asset for a unique `ATBL` and all `AGSC`s, parse each AGSC's "define ids",
//! then walk the `ATBL`'s raw sound-id array through that map.

use ahash::{AHashMap, AHashSet};
use byteorder::{BigEndian, ReadBytesExt};

use crate::asset_id::AssetId;
use crate::error::{Error, Result};
use crate::resource::Dependency;

/// The `DGRP` asset id bundling every audio group Echoes always keeps
/// resident (`asset_manager.py`'s `audio_groups_single_player_DGRP`). An AGSC
/// among its dependencies is excluded from MLVL-level dependency lists
/// (spec §4.I); the manager resolves this id's own `AGSC` dependencies via
/// the registry's cheat scan and passes the resulting set into `build`.
pub const AUDIO_GROUPS_SINGLE_PLAYER_DGRP: u32 = 0x31CB_5ADB;

/// A sentinel define id meaning "no owning AGSC". Both `0xFFFF` and `-1`
/// (`0xFFFF_FFFF`) are treated as null (spec open question: unclear whether
/// the `-1` form is reached in shipped data; kept for safety).
fn is_null_define_id(value: u32) -> bool {
    value == 0xFFFF || value == 0xFFFF_FFFF
}

/// `sound_id -> AGSC asset id`, built once per session.
pub struct AudioGroupIndex {
    sound_id_to_agsc: AHashMap<u16, AssetId>,
    always_loaded: AHashSet<AssetId>,
}

impl AudioGroupIndex {
    /// Builds the index from every `(AGSC id, define-id array)` pair, the
    /// single `ATBL`'s raw sound-id-indexed array of define ids, and the set
    /// of AGSCs the always-loaded bundle already depends on.
    pub fn build(atbl: &[u8], agscs: &[(AssetId, Vec<u32>)], always_loaded: AHashSet<AssetId>) -> Result<Self> {
        let mut define_id_to_agsc = AHashMap::new();
        for (agsc_id, define_ids) in agscs {
            for &define_id in define_ids {
                if is_null_define_id(define_id) {
                    continue;
                }
                define_id_to_agsc.entry(define_id).or_insert(*agsc_id);
            }
        }

        let mut cursor = std::io::Cursor::new(atbl);
        let mut sound_id_to_agsc = AHashMap::new();
        let mut sound_id: u16 = 0;
        while (cursor.position() as usize) + 4 <= atbl.len() {
            let define_id = cursor.read_u32::<BigEndian>()?;
            if !is_null_define_id(define_id) {
                if let Some(agsc_id) = define_id_to_agsc.get(&define_id) {
                    sound_id_to_agsc.insert(sound_id, *agsc_id);
                }
            }
            sound_id = sound_id.wrapping_add(1);
        }

        Ok(Self { sound_id_to_agsc, always_loaded })
    }

    /// Yields the `AGSC` dependency for `sound_id`, flagged excluded when
    /// the owning group is already a dependency of the always-loaded bundle.
    pub fn get_audio_group_dependency(&self, sound_id: u16) -> Option<Dependency> {
        let agsc_id = *self.sound_id_to_agsc.get(&sound_id)?;
        let excluded = self.always_loaded.contains(&agsc_id);
        Some(Dependency { kind: crate::fourcc::tags::AGSC, asset_id: agsc_id, exclude_from_mlvl: excluded })
    }
}

/// Parses an `AGSC`'s define-id array. The rest of the AGSC body (sample
/// data) is an external collaborator's concern (spec §1 excludes audio
/// editing); this crate only needs the define-id list for the audio index.
pub fn parse_agsc_define_ids(data: &[u8]) -> Result<Vec<u32>> {
    let mut cursor = std::io::Cursor::new(data);
    let count = cursor.read_u32::<BigEndian>().map_err(|_| Error::Codec {
        path: "AGSC".to_string(),
        reason: "truncated define-id count".to_string(),
    })?;
    let mut ids = Vec::with_capacity(count as usize);
    for _ in 0..count {
        ids.push(cursor.read_u32::<BigEndian>()?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn atbl_bytes(define_ids: &[u32]) -> Vec<u8> {
        let mut buf = Vec::new();
        for id in define_ids {
            buf.write_u32::<BigEndian>(*id).unwrap();
        }
        buf
    }

    #[test]
    fn maps_sound_id_to_owning_agsc() {
        let atbl = atbl_bytes(&[10, 20, 0xFFFF]);
        let agscs = vec![(AssetId::Id32(0x100), vec![10]), (AssetId::Id32(0x200), vec![20])];
        let index = AudioGroupIndex::build(&atbl, &agscs, AHashSet::new()).unwrap();

        assert_eq!(index.get_audio_group_dependency(0).unwrap().asset_id, AssetId::Id32(0x100));
        assert_eq!(index.get_audio_group_dependency(1).unwrap().asset_id, AssetId::Id32(0x200));
        assert!(index.get_audio_group_dependency(2).is_none());
    }

    #[test]
    fn negative_one_define_id_is_also_null() {
        let atbl = atbl_bytes(&[0xFFFF_FFFF]);
        let index = AudioGroupIndex::build(&atbl, &[], AHashSet::new()).unwrap();
        assert!(index.get_audio_group_dependency(0).is_none());
    }

    #[test]
    fn always_loaded_bundle_is_excluded_from_mlvl() {
        let atbl = atbl_bytes(&[5]);
        let agscs = vec![(AssetId::Id32(0x900), vec![5])];
        let mut always_loaded = AHashSet::new();
        always_loaded.insert(AssetId::Id32(0x900));
        let index = AudioGroupIndex::build(&atbl, &agscs, always_loaded).unwrap();
        assert!(index.get_audio_group_dependency(0).unwrap().exclude_from_mlvl);
    }
}
