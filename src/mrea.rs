//! The MREA area-file splitter (component E): a monolithic per-room blob
//! partitioned into named, order-dependent section groups, some of them
//! LZO-framed compressed-block streams (via `compression`).
//!
//! Grounded on `mrea.py`'s `Area` class: header parse, the data-section-size
//! array, the `compressed_blocks` flag gating whether `_decode_compressed_blocks`
//! runs, and the group-offset table used to slice the flat section list back
//! into labeled groups.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::align::{seek_to_alignment, write_padding};
use crate::asset_id::AssetId;
use crate::compression::{self, CompressedBlockHeader, LabeledSection};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::game::Game;
use crate::script_layer::ScriptLayer;

const MREA_MAGIC: u32 = 0xDEADBEEF;

/// The seven MREA header versions shipped across Prime 1-3 (spec §6). Each
/// gates which section groups are present and whether the data region is
/// compressed-block framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MreaVersion {
    V0c,
    V0f,
    V15,
    V19,
    V1d,
    V1e,
    V20,
}

impl MreaVersion {
    pub fn from_u32(value: u32) -> Result<Self> {
        Ok(match value {
            0x0C => MreaVersion::V0c,
            0x0F => MreaVersion::V0f,
            0x15 => MreaVersion::V15,
            0x19 => MreaVersion::V19,
            0x1D => MreaVersion::V1d,
            0x1E => MreaVersion::V1e,
            0x20 => MreaVersion::V20,
            other => {
                return Err(Error::Codec {
                    path: "mrea header".to_string(),
                    reason: format!("unrecognized mrea version {other:#x}"),
                })
            }
        })
    }

    pub fn as_u32(self) -> u32 {
        match self {
            MreaVersion::V0c => 0x0C,
            MreaVersion::V0f => 0x0F,
            MreaVersion::V15 => 0x15,
            MreaVersion::V19 => 0x19,
            MreaVersion::V1d => 0x1D,
            MreaVersion::V1e => 0x1E,
            MreaVersion::V20 => 0x20,
        }
    }

    /// Versions at or after Echoes' first revision frame their data region as
    /// a compressed-block stream; Prime 1 stores sections back-to-back raw.
    pub fn is_compressed(self) -> bool {
        !matches!(self, MreaVersion::V0c | MreaVersion::V0f)
    }
}

/// The section group labels recognized by the core, in the order they're
/// declared in the header's offset table. The last two are opaque to every
/// consumer but this splitter (spec §9: "writers must preserve their bytes
/// verbatim when unchanged").
pub const SECTION_LABELS: [&str; 12] = [
    "geometry",
    "script_layers",
    "generated_script_objects",
    "collision",
    "lights",
    "visibility_tree",
    "path",
    "portal_area",
    "static_geometry_map",
    "area_octree",
    "unknown_a",
    "unknown_b",
];

/// Parsed, pre-padding header fields common to every version.
#[derive(Debug, Clone)]
pub struct MreaHeader {
    pub version: MreaVersion,
    /// Area transform matrix; opaque beyond round-tripping (spec §1 excludes
    /// resource-body geometry semantics).
    pub transform: [u8; 48],
    pub world_model_count: u32,
    pub data_section_count: u32,
    pub compressed_block_count: Option<u32>,
    /// Index into the flat section-size array where each present group
    /// starts; `None` for a group absent in this version. Monotone
    /// non-decreasing across present entries (spec §4.E invariant).
    pub group_offsets: Vec<Option<u32>>,
}

/// One section group: either still-raw byte slices as read off disc, or
/// decoded into a parsed form. The transition is one-way (spec §9).
#[derive(Debug, Clone)]
pub enum SectionGroup {
    Raw(Vec<Vec<u8>>),
    ScriptLayers(Vec<ScriptLayer>),
    GeneratedObjects(ScriptLayer),
}

impl SectionGroup {
    pub fn raw(&self) -> Option<&[Vec<u8>]> {
        match self {
            SectionGroup::Raw(v) => Some(v),
            _ => None,
        }
    }
}

/// A parsed MREA: header plus every present section group.
#[derive(Debug, Clone)]
pub struct Area {
    pub header: MreaHeader,
    /// `groups[i]` corresponds to `SECTION_LABELS[i]`; `None` for a label
    /// absent in this version.
    groups: Vec<Option<SectionGroup>>,
}

fn read_section_sizes(r: &mut impl Read, count: u32) -> std::io::Result<Vec<u32>> {
    (0..count).map(|_| r.read_u32::<BigEndian>()).collect()
}

impl Area {
    /// Parses an MREA body. `r` must be positioned at the start of the
    /// resource (offset 0 of the `MREA` body, magic included).
    pub fn parse(r: &mut (impl Read + std::io::Seek), game: Game, config: &Config) -> Result<Self> {
        let magic = r.read_u32::<BigEndian>()?;
        if magic != MREA_MAGIC {
            return Err(Error::Codec {
                path: "mrea header".to_string(),
                reason: format!("bad magic {magic:#x}"),
            });
        }
        let version = MreaVersion::from_u32(r.read_u32::<BigEndian>()?)?;

        let mut transform = [0u8; 48];
        r.read_exact(&mut transform)?;

        let world_model_count = r.read_u32::<BigEndian>()?;

        let mut group_offsets = Vec::with_capacity(SECTION_LABELS.len());
        for _ in SECTION_LABELS {
            let raw = r.read_u32::<BigEndian>()?;
            group_offsets.push(if raw == u32::MAX { None } else { Some(raw) });
        }
        check_monotone(&group_offsets)?;

        let data_section_count = r.read_u32::<BigEndian>()?;
        let compressed_block_count = if version.is_compressed() {
            Some(r.read_u32::<BigEndian>()?)
        } else {
            None
        };

        seek_to_alignment(r, 32)?;

        let section_sizes = read_section_sizes(r, data_section_count)?;
        seek_to_alignment(r, 32)?;

        let flat_sections: Vec<Vec<u8>> = if version.is_compressed() {
            let count = compressed_block_count.unwrap_or(0) as usize;
            let (headers, blocks) = compression::read_blocks(r, count, config)?;
            compression::decode_blocks(&headers, &blocks, &section_sizes)?
        } else {
            let mut out = Vec::with_capacity(section_sizes.len());
            for &size in &section_sizes {
                let mut buf = vec![0u8; size as usize];
                r.read_exact(&mut buf)?;
                out.push(buf);
            }
            out
        };

        let total = flat_sections.len() as u32;
        let mut groups = Vec::with_capacity(SECTION_LABELS.len());
        for (i, offset) in group_offsets.iter().enumerate() {
            let Some(start) = *offset else {
                groups.push(None);
                continue;
            };
            let end = group_offsets[i + 1..]
                .iter()
                .find_map(|o| *o)
                .unwrap_or(total);
            let slice = flat_sections[start as usize..end as usize].to_vec();
            groups.push(Some(raw_or_decode(SECTION_LABELS[i], slice)?));
        }

        let header = MreaHeader {
            version,
            transform,
            world_model_count,
            data_section_count,
            compressed_block_count,
            group_offsets,
        };

        Ok(Self { header, groups })
    }

    fn group(&self, label: &str) -> Option<&SectionGroup> {
        let idx = SECTION_LABELS.iter().position(|l| *l == label)?;
        self.groups[idx].as_ref()
    }

    fn group_mut(&mut self, label: &str) -> Option<&mut SectionGroup> {
        let idx = SECTION_LABELS.iter().position(|l| *l == label)?;
        self.groups[idx].as_mut()
    }

    /// The raw geometry section group, unparsed (geometry codecs are an
    /// external collaborator per spec §1).
    pub fn geometry(&self) -> Option<&[Vec<u8>]> {
        self.group("geometry").and_then(SectionGroup::raw)
    }

    /// Every non-generated script layer, lazily decoded on first access.
    pub fn script_layers(&mut self) -> Result<&[ScriptLayer]> {
        self.decode_script_layers()?;
        match self.group("script_layers") {
            Some(SectionGroup::ScriptLayers(layers)) => Ok(layers),
            _ => Ok(&[]),
        }
    }

    fn decode_script_layers(&mut self) -> Result<()> {
        let idx = SECTION_LABELS.iter().position(|l| *l == "script_layers").unwrap();
        if let Some(SectionGroup::Raw(raw)) = &self.groups[idx] {
            let layers = raw
                .iter()
                .enumerate()
                .map(|(i, bytes)| ScriptLayer::parse(bytes, i as u32))
                .collect::<Result<Vec<_>>>()?;
            self.groups[idx] = Some(SectionGroup::ScriptLayers(layers));
        }
        Ok(())
    }

    /// The synthetic generated-objects layer (spec §3: "members carry their
    /// owning layer in the id").
    pub fn generated_objects(&mut self) -> Result<Option<&ScriptLayer>> {
        let idx = SECTION_LABELS.iter().position(|l| *l == "generated_script_objects").unwrap();
        if let Some(SectionGroup::Raw(raw)) = &self.groups[idx] {
            let bytes = raw.first().cloned().unwrap_or_default();
            let layer = ScriptLayer::parse(&bytes, ScriptLayer::GENERATED_LAYER_INDEX)?;
            self.groups[idx] = Some(SectionGroup::GeneratedObjects(layer));
        }
        match &self.groups[idx] {
            Some(SectionGroup::GeneratedObjects(layer)) => Ok(Some(layer)),
            _ => Ok(None),
        }
    }

    fn single_asset_id(&self, label: &str, game: Game) -> Result<Option<AssetId>> {
        let Some(SectionGroup::Raw(raw)) = self.group(label) else { return Ok(None) };
        let Some(bytes) = raw.first() else { return Ok(None) };
        let mut cursor = std::io::Cursor::new(bytes);
        Ok(Some(if game.uses_asset_id_32() {
            AssetId::Id32(cursor.read_u32::<BigEndian>()?)
        } else {
            AssetId::Id64(cursor.read_u64::<BigEndian>()?)
        }))
    }

    pub fn portal_area_id(&self, game: Game) -> Result<Option<AssetId>> {
        self.single_asset_id("portal_area", game)
    }

    pub fn static_geometry_map_id(&self, game: Game) -> Result<Option<AssetId>> {
        self.single_asset_id("static_geometry_map", game)
    }

    pub fn path_id(&self, game: Game) -> Result<Option<AssetId>> {
        self.single_asset_id("path", game)
    }

    /// True if any present script layer (or the generated-objects layer) has
    /// been mutated, invalidating the area's cached MLVL-level dependency
    /// list (spec §4.F).
    pub fn is_modified(&self) -> bool {
        self.groups.iter().any(|g| match g {
            Some(SectionGroup::ScriptLayers(layers)) => layers.iter().any(ScriptLayer::is_modified),
            Some(SectionGroup::GeneratedObjects(layer)) => layer.is_modified(),
            _ => false,
        })
    }

    /// Rebuilds the MREA body: concatenates groups in declared order,
    /// recomputes header offsets, and re-segments into compressed blocks
    /// with §4.D's label-aware boundary rules.
    pub fn build(&self, w: &mut impl Write, game: Game, config: &Config) -> Result<()> {
        let mut flat: Vec<(&str, Vec<u8>)> = Vec::new();
        let mut group_offsets = Vec::with_capacity(SECTION_LABELS.len());

        for (i, group) in self.groups.iter().enumerate() {
            let label = SECTION_LABELS[i];
            match group {
                None => group_offsets.push(None),
                Some(g) => {
                    group_offsets.push(Some(flat.len() as u32));
                    for bytes in group_to_raw_sections(g)? {
                        flat.push((label, bytes));
                    }
                }
            }
        }
        check_monotone(&group_offsets)?;

        w.write_u32::<BigEndian>(MREA_MAGIC)?;
        w.write_u32::<BigEndian>(self.header.version.as_u32())?;
        w.write_all(&self.header.transform)?;
        w.write_u32::<BigEndian>(self.header.world_model_count)?;
        for offset in &group_offsets {
            w.write_u32::<BigEndian>(offset.unwrap_or(u32::MAX))?;
        }
        w.write_u32::<BigEndian>(flat.len() as u32)?;

        let labeled: Vec<LabeledSection> =
            flat.iter().map(|(label, bytes)| LabeledSection { label, data: bytes }).collect();

        let blocks: Option<Vec<(CompressedBlockHeader, Vec<u8>)>> = if self.header.version.is_compressed() {
            Some(compression::encode_blocks(&labeled, config)?)
        } else {
            None
        };

        if let Some(blocks) = &blocks {
            w.write_u32::<BigEndian>(blocks.len() as u32)?;
        }

        // magic + version + transform + world_model_count + group offsets + data_section_count
        let mut header_written = 4 + 4 + 48 + 4 + (SECTION_LABELS.len() as u64) * 4 + 4;
        if blocks.is_some() {
            header_written += 4; // compressed_block_count
        }
        write_padding(w, header_written, 32)?;

        let mut size_buf = Vec::new();
        for (_, bytes) in &flat {
            size_buf.write_u32::<BigEndian>(bytes.len() as u32)?;
        }
        w.write_all(&size_buf)?;
        write_padding(w, size_buf.len() as u64, 32)?;

        let _ = game;
        match blocks {
            Some(blocks) => compression::write_blocks(w, &blocks, config)?,
            None => {
                for (_, bytes) in &flat {
                    w.write_all(bytes)?;
                }
            }
        }

        Ok(())
    }
}

fn group_to_raw_sections(group: &SectionGroup) -> Result<Vec<Vec<u8>>> {
    match group {
        SectionGroup::Raw(v) => Ok(v.clone()),
        SectionGroup::ScriptLayers(layers) => layers.iter().map(ScriptLayer::build).collect(),
        SectionGroup::GeneratedObjects(layer) => Ok(vec![layer.build()?]),
    }
}

fn raw_or_decode(_label: &str, slice: Vec<Vec<u8>>) -> Result<SectionGroup> {
    Ok(SectionGroup::Raw(slice))
}

fn check_monotone(offsets: &[Option<u32>]) -> Result<()> {
    let mut last = 0u32;
    for offset in offsets.iter().flatten() {
        if *offset < last {
            return Err(Error::Codec {
                path: "mrea header".to_string(),
                reason: "section group offsets are not monotone non-decreasing".to_string(),
            });
        }
        last = *offset;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_header_bytes(version: MreaVersion, group_data: &[(&str, &[u8])]) -> Vec<u8> {
        let mut flat = Vec::new();
        let mut offsets = vec![None; SECTION_LABELS.len()];
        for (label, data) in group_data {
            let idx = SECTION_LABELS.iter().position(|l| l == label).unwrap();
            offsets[idx] = Some(flat.len() as u32);
            flat.push(*data);
        }

        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(MREA_MAGIC).unwrap();
        buf.write_u32::<BigEndian>(version.as_u32()).unwrap();
        buf.extend_from_slice(&[0u8; 48]);
        buf.write_u32::<BigEndian>(0).unwrap();
        for o in &offsets {
            buf.write_u32::<BigEndian>(o.unwrap_or(u32::MAX)).unwrap();
        }
        buf.write_u32::<BigEndian>(flat.len() as u32).unwrap();
        if version.is_compressed() {
            buf.write_u32::<BigEndian>(0).unwrap();
        }
        let rem = buf.len() % 32;
        if rem != 0 {
            buf.extend(std::iter::repeat(0u8).take(32 - rem));
        }

        let mut size_buf = Vec::new();
        for data in &flat {
            size_buf.write_u32::<BigEndian>(data.len() as u32).unwrap();
        }
        buf.extend_from_slice(&size_buf);
        let rem = buf.len() % 32;
        if rem != 0 {
            buf.extend(std::iter::repeat(0u8).take(32 - rem));
        }

        for data in &flat {
            buf.extend_from_slice(data);
        }
        buf
    }

    #[test]
    fn parses_uncompressed_prime1_layout() {
        let bytes = minimal_header_bytes(MreaVersion::V0f, &[("geometry", b"geodata"), ("collision", b"colldata")]);
        let mut cur = Cursor::new(bytes);
        let area = Area::parse(&mut cur, Game::Prime, &Config::default()).unwrap();
        assert_eq!(area.geometry().unwrap()[0], b"geodata");
    }

    #[test]
    fn version_from_u32_rejects_unknown() {
        assert!(MreaVersion::from_u32(0x99).is_err());
    }

    #[test]
    fn portal_area_id_reads_be_u32_for_32_bit_games() {
        let id_bytes = 0x1234_5678u32.to_be_bytes();
        let bytes = minimal_header_bytes(MreaVersion::V0f, &[("portal_area", &id_bytes)]);
        let mut cur = Cursor::new(bytes);
        let area = Area::parse(&mut cur, Game::Prime, &Config::default()).unwrap();
        assert_eq!(area.portal_area_id(Game::Prime).unwrap(), Some(AssetId::Id32(0x1234_5678)));
    }

    #[test]
    fn absent_group_returns_none() {
        let bytes = minimal_header_bytes(MreaVersion::V0f, &[("geometry", b"geodata")]);
        let mut cur = Cursor::new(bytes);
        let area = Area::parse(&mut cur, Game::Prime, &Config::default()).unwrap();
        assert!(area.path_id(Game::Prime).unwrap().is_none());
    }
}
