//! The PAK archive codec (component C): table of contents plus resource
//! bodies, in the two shipping layouts spec §6 describes — Prime 1's
//! per-entry compression flag, and Echoes/Corruption's single LZO-framed
//! body region (handled via `compression`).
//!
//! Grounded on `asset_manager.py`'s `Pak.header_for_game` / `Pak.parse` split
//! (header-only parse for the manager's eager startup scan, full parse for
//! `get_pak`) and on the on-disc layout in spec §6.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::align::write_padding;
use crate::asset_id::AssetId;
use crate::compression::{decode_single_block, CompressedBlockHeader};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fourcc::FourCC;
use crate::game::Game;
use crate::resource::RawResource;

const PAK_VERSION_MAJOR: u16 = 3;
const PAK_VERSION_MINOR: u16 = 5;

/// One resource entry in a PAK's table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakEntry {
    pub kind: FourCC,
    pub asset_id: AssetId,
    pub compressed: bool,
    /// Populated on full parse; `None` on a header-only parse (spec §4.C:
    /// "header parse yields the entry list without reading bodies").
    pub data: Option<Vec<u8>>,
}

/// A named-resource table entry (spec §3: "subset promoted as named for
/// loading-screen previews").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedResource {
    pub kind: FourCC,
    pub asset_id: AssetId,
    pub name: String,
}

/// A parsed PAK. Produced either by a header-only parse (entries without
/// bodies, used for the manager's startup scan) or a full parse (entries with
/// bodies, used once a PAK is promoted into `in_memory_paks`).
#[derive(Debug, Clone)]
pub struct Pak {
    pub game: Game,
    pub named_resources: Vec<NamedResource>,
    pub entries: Vec<PakEntry>,
    index: HashMap<u64, usize>,
}

fn read_asset_id(r: &mut impl Read, game: Game) -> std::io::Result<AssetId> {
    if game.uses_asset_id_32() {
        Ok(AssetId::Id32(r.read_u32::<BigEndian>()?))
    } else {
        Ok(AssetId::Id64(r.read_u64::<BigEndian>()?))
    }
}

fn write_asset_id(w: &mut impl Write, id: AssetId) -> std::io::Result<()> {
    match id {
        AssetId::Id32(v) => w.write_u32::<BigEndian>(v),
        AssetId::Id64(v) => w.write_u64::<BigEndian>(v),
    }
}

fn read_fourcc(r: &mut impl Read) -> std::io::Result<FourCC> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(FourCC(buf))
}

impl Pak {
    fn rebuild_index(entries: &[PakEntry]) -> HashMap<u64, usize> {
        entries.iter().enumerate().map(|(i, e)| (e.asset_id.as_u64(), i)).collect()
    }

    /// Parses only the table of contents, leaving `PakEntry::data` unset.
    /// Used by the manager's eager header scan at startup (spec §4.C).
    pub fn parse_header(r: &mut impl Read, game: Game) -> Result<Self> {
        Self::parse_inner(r, game, false)
    }

    /// Parses the table of contents and every resource body.
    pub fn parse(r: &mut impl Read, game: Game) -> Result<Self> {
        Self::parse_inner(r, game, true)
    }

    fn parse_inner(r: &mut impl Read, game: Game, with_bodies: bool) -> Result<Self> {
        let major = r.read_u16::<BigEndian>()?;
        let minor = r.read_u16::<BigEndian>()?;
        if major != PAK_VERSION_MAJOR || minor != PAK_VERSION_MINOR {
            return Err(Error::Codec {
                path: "pak header".to_string(),
                reason: format!("unexpected version {major}.{minor}"),
            });
        }
        let _unk = r.read_u32::<BigEndian>()?;

        let named_count = r.read_u32::<BigEndian>()?;
        let mut named_resources = Vec::with_capacity(named_count as usize);
        for _ in 0..named_count {
            let kind = read_fourcc(r)?;
            let asset_id = read_asset_id(r, game)?;
            let name_len = r.read_u32::<BigEndian>()?;
            let mut name_buf = vec![0u8; name_len as usize];
            r.read_exact(&mut name_buf)?;
            let name = String::from_utf8(name_buf).map_err(|e| Error::Codec {
                path: "pak named resource".to_string(),
                reason: e.to_string(),
            })?;
            named_resources.push(NamedResource { kind, asset_id, name });
        }

        let entry_count = r.read_u32::<BigEndian>()?;
        struct RawEntry {
            kind: FourCC,
            asset_id: AssetId,
            compressed: bool,
            offset: u32,
            size: u32,
        }
        let mut raw_entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let compressed = if game.uses_lzo() { r.read_u32::<BigEndian>()? != 0 } else { false };
            let kind = read_fourcc(r)?;
            let asset_id = read_asset_id(r, game)?;
            let size = r.read_u32::<BigEndian>()?;
            let offset = r.read_u32::<BigEndian>()?;
            raw_entries.push(RawEntry { kind, asset_id, compressed, offset, size });
        }

        let entries = if with_bodies {
            // Bodies follow the table of contents, each one individually
            // aligned per the game's body alignment (spec §4.C). We read
            // them sequentially rather than seeking to `raw.offset`, but
            // still cross-check it against our own running position.
            let mut entries = Vec::with_capacity(raw_entries.len());
            let mut body_cursor: u32 = 0;
            for raw in raw_entries {
                if raw.offset != body_cursor {
                    log::warn!(
                        "pak entry {:?} declares offset {:#x}, expected {:#x}",
                        raw.asset_id,
                        raw.offset,
                        body_cursor
                    );
                }
                let mut data = vec![0u8; raw.size as usize];
                r.read_exact(&mut data)?;
                let data = if raw.compressed {
                    if game.uses_lzo() {
                        decompress_block_framed_body(&data)?
                    } else {
                        decompress_prime1_body(&data)?
                    }
                } else {
                    data
                };
                entries.push(PakEntry { kind: raw.kind, asset_id: raw.asset_id, compressed: raw.compressed, data: Some(data) });
                body_cursor += raw.size;
                let rem = raw.size % game.pak_alignment() as u32;
                if rem != 0 {
                    let pad = game.pak_alignment() as u32 - rem;
                    let mut discard = vec![0u8; pad as usize];
                    r.read_exact(&mut discard)?;
                    body_cursor += pad;
                }
            }
            entries
        } else {
            raw_entries
                .into_iter()
                .map(|raw| PakEntry { kind: raw.kind, asset_id: raw.asset_id, compressed: raw.compressed, data: None })
                .collect()
        };

        let index = Self::rebuild_index(&entries);
        Ok(Self { game, named_resources, entries, index })
    }

    pub fn get_entry(&self, id: AssetId) -> Option<&PakEntry> {
        self.index.get(&id.as_u64()).map(|&i| &self.entries[i])
    }

    pub fn get_asset(&self, id: AssetId) -> Option<RawResource> {
        let entry = self.get_entry(id)?;
        entry.data.as_ref().map(|data| RawResource::new(entry.kind, data.clone()))
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.index.contains_key(&id.as_u64())
    }

    /// Appends a brand-new entry. Callers (the manager) are responsible for
    /// ensuring `id` isn't already present.
    pub fn add_asset(&mut self, id: AssetId, raw: RawResource) {
        self.entries.push(PakEntry { kind: raw.kind, asset_id: id, compressed: false, data: Some(raw.data) });
        self.index.insert(id.as_u64(), self.entries.len() - 1);
    }

    /// Replaces an existing entry's body in place, preserving its position
    /// in the original ordering (spec §4.C: "preserves original entry
    /// ordering for entries that were not touched").
    pub fn replace_asset(&mut self, id: AssetId, raw: RawResource) -> Result<()> {
        let idx = *self.index.get(&id.as_u64()).ok_or(Error::UnknownAssetId { id, name: None })?;
        self.entries[idx].kind = raw.kind;
        self.entries[idx].data = Some(raw.data);
        self.entries[idx].compressed = false;
        Ok(())
    }

    pub fn remove_asset(&mut self, id: AssetId) -> Result<()> {
        let idx = *self.index.get(&id.as_u64()).ok_or(Error::UnknownAssetId { id, name: None })?;
        self.entries.remove(idx);
        self.index = Self::rebuild_index(&self.entries);
        Ok(())
    }

    /// Serializes the PAK back to bytes. New entries are appended, removed
    /// entries are already gone from `self.entries`, and untouched entries
    /// keep their relative order — all by construction, since `self.entries`
    /// is the single source of truth for both reads and writes.
    pub fn build(&self, w: &mut impl Write, _config: &Config) -> Result<()> {
        let bodies: Vec<&[u8]> = self
            .entries
            .iter()
            .map(|e| {
                e.data.as_deref().ok_or_else(|| Error::Codec {
                    path: "pak entry".to_string(),
                    reason: "cannot serialize a PAK with unread bodies (header-only parse)".to_string(),
                })
            })
            .collect::<Result<_>>()?;

        // Offsets are relative to the start of the body region, which begins
        // right after the entry table; computed up front since bodies are
        // written in a later pass than the table that references them.
        let alignment = self.game.pak_alignment();
        let mut offsets = Vec::with_capacity(bodies.len());
        let mut cursor = 0u64;
        for data in &bodies {
            offsets.push(cursor);
            cursor += data.len() as u64;
            let rem = cursor % alignment;
            if rem != 0 {
                cursor += alignment - rem;
            }
        }

        w.write_u16::<BigEndian>(PAK_VERSION_MAJOR)?;
        w.write_u16::<BigEndian>(PAK_VERSION_MINOR)?;
        w.write_u32::<BigEndian>(0)?;

        w.write_u32::<BigEndian>(self.named_resources.len() as u32)?;
        for named in &self.named_resources {
            w.write_all(&named.kind.0)?;
            write_asset_id(w, named.asset_id)?;
            let bytes = named.name.as_bytes();
            w.write_u32::<BigEndian>(bytes.len() as u32)?;
            w.write_all(bytes)?;
        }

        w.write_u32::<BigEndian>(self.entries.len() as u32)?;
        for (entry, (data, offset)) in self.entries.iter().zip(bodies.iter().zip(offsets.iter())) {
            if self.game.uses_lzo() {
                w.write_u32::<BigEndian>(0)?; // compression flag: this codec never re-compresses a body once read
            }
            w.write_all(&entry.kind.0)?;
            write_asset_id(w, entry.asset_id)?;
            w.write_u32::<BigEndian>(data.len() as u32)?;
            w.write_u32::<BigEndian>(*offset as u32)?;
        }

        for data in &bodies {
            w.write_all(data)?;
            write_padding(w, data.len() as u64, alignment)?;
        }

        Ok(())
    }
}

/// Prime 1's per-resource compression is a raw LZO1X frame (no block
/// splitting — that scheme is specific to Echoes/Corruption's global framing
/// handled below).
fn decompress_prime1_body(data: &[u8]) -> Result<Vec<u8>> {
    // The first 4 bytes are the uncompressed size, big-endian, preceding the
    // LZO1X stream (mirrors the MREA per-block framing's own size prefix).
    let mut cursor = Cursor::new(data);
    let uncompressed_size = cursor.read_u32::<BigEndian>()? as usize;
    let mut out = vec![0u8; uncompressed_size];
    let written = lzokay::decompress::decompress(&data[4..], &mut out).map_err(|e| Error::Codec {
        path: "pak body".to_string(),
        reason: format!("{e:?}"),
    })?;
    if written != uncompressed_size {
        return Err(Error::SizeMismatch { expected: uncompressed_size, actual: written });
    }
    Ok(out)
}

/// Echoes/Corruption frame a compressed resource body as a single
/// compressed-block stream (one header, one block, no section splitting —
/// that only happens inside MREA), per `mrea.py`'s shared framing.
fn decompress_block_framed_body(data: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(data);
    let header = CompressedBlockHeader::read(&mut cursor)?;
    let block_start = cursor.position() as usize;
    decode_single_block(&header, &data[block_start..])
}
