//! MAPW: the simplest collaborating resource codec, included in full as the
//! canonical worked example (spec §6). A world map's area-map asset ids.
//!
//! On-disc: magic `0xDEADF00D`, version `1`, then a big-endian `u32`-prefixed
//! array of `MAPA` asset ids.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::asset_id::AssetId;
use crate::error::{Error, Result};
use crate::fourcc::tags;
use crate::resource::Dependency;

const MAPW_MAGIC: u32 = 0xDEADF00D;
const MAPW_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapw {
    pub area_map_ids: Vec<AssetId>,
}

impl Mapw {
    pub fn parse(data: &[u8], game: crate::game::Game) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(data);
        let magic = cursor.read_u32::<BigEndian>()?;
        if magic != MAPW_MAGIC {
            return Err(Error::Codec { path: "MAPW".to_string(), reason: format!("bad magic {magic:#x}") });
        }
        let version = cursor.read_u32::<BigEndian>()?;
        if version != MAPW_VERSION {
            return Err(Error::Codec { path: "MAPW".to_string(), reason: format!("unexpected version {version}") });
        }
        let count = cursor.read_u32::<BigEndian>()?;
        let mut area_map_ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            area_map_ids.push(if game.uses_asset_id_32() {
                AssetId::Id32(cursor.read_u32::<BigEndian>()?)
            } else {
                AssetId::Id64(cursor.read_u64::<BigEndian>()?)
            });
        }
        Ok(Self { area_map_ids })
    }

    pub fn build(&self, game: crate::game::Game) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(MAPW_MAGIC)?;
        buf.write_u32::<BigEndian>(MAPW_VERSION)?;
        buf.write_u32::<BigEndian>(self.area_map_ids.len() as u32)?;
        for id in &self.area_map_ids {
            match (*id, game.uses_asset_id_32()) {
                (AssetId::Id32(v), true) => buf.write_u32::<BigEndian>(v)?,
                (AssetId::Id64(v), false) => buf.write_u64::<BigEndian>(v)?,
                _ => {
                    return Err(Error::Codec {
                        path: "MAPW".to_string(),
                        reason: "area map id width does not match game".to_string(),
                    })
                }
            }
        }
        Ok(buf)
    }
}

/// The registry's cheat-table scanner: every id in a MAPW is a `MAPA`
/// dependency, in array order (spec §8 scenario S3).
pub fn dependencies_for(data: &[u8]) -> Result<Vec<Dependency>> {
    let mut cursor = std::io::Cursor::new(data);
    let magic = cursor.read_u32::<BigEndian>()?;
    if magic != MAPW_MAGIC {
        return Err(Error::Codec { path: "MAPW".to_string(), reason: format!("bad magic {magic:#x}") });
    }
    let _version = cursor.read_u32::<BigEndian>()?;
    let count = cursor.read_u32::<BigEndian>()?;
    let mut deps = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = cursor.read_u32::<BigEndian>()?;
        deps.push(Dependency::new(tags::MAPA, AssetId::Id32(id)));
    }
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s3_dependency_enumeration() {
        let bytes: Vec<u8> =
            vec![0xDE, 0xAD, 0xF0, 0x0D, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0xAA, 0xAA, 0xAA, 0xAA, 0xBB, 0xBB, 0xBB, 0xBB];
        let deps = dependencies_for(&bytes).unwrap();
        assert_eq!(
            deps,
            vec![Dependency::new(tags::MAPA, AssetId::Id32(0xAAAA_AAAA)), Dependency::new(tags::MAPA, AssetId::Id32(0xBBBB_BBBB))]
        );
    }

    #[test]
    fn round_trips_through_build() {
        let mapw = Mapw { area_map_ids: vec![AssetId::Id32(1), AssetId::Id32(2)] };
        let bytes = mapw.build(crate::game::Game::Echoes).unwrap();
        let reparsed = Mapw::parse(&bytes, crate::game::Game::Echoes).unwrap();
        assert_eq!(reparsed, mapw);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = Mapw::parse(&[0, 0, 0, 0], crate::game::Game::Echoes).unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
    }
}
