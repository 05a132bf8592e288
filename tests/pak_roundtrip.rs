//! Round-trip and save-pipeline integration tests driven entirely through
//! the public API (`retro_data_tools::*`), exercising the testable
//! properties enumerated in the spec's scenario table: PAK round-trip,
//! dependency closure, tombstone consistency, alias stability, and
//! fresh-id uniqueness.

use std::collections::HashMap;
use std::io::Cursor;

use byteorder::{BigEndian, WriteBytesExt};

use retro_data_tools::fourcc::tags;
use retro_data_tools::{AssetId, AssetManager, Dependency, FileProvider, FourCC, Game, RawResource};

struct MemoryProvider {
    files: HashMap<String, Vec<u8>>,
}

impl FileProvider for MemoryProvider {
    fn is_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn rglob(&self, pattern: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter(|n| pattern == "*.pak" && n.ends_with(".pak"))
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn open_binary(&self, name: &str) -> retro_data_tools::Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| retro_data_tools::Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound)))
    }

    fn get_dol(&self) -> retro_data_tools::Result<Vec<u8>> {
        Ok(vec![])
    }
}

fn write_pak(game: Game, entries: &[(FourCC, AssetId, &[u8])]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u16::<BigEndian>(3).unwrap();
    buf.write_u16::<BigEndian>(5).unwrap();
    buf.write_u32::<BigEndian>(0).unwrap();
    buf.write_u32::<BigEndian>(0).unwrap();
    buf.write_u32::<BigEndian>(entries.len() as u32).unwrap();
    for (kind, id, data) in entries {
        if game.uses_lzo() {
            buf.write_u32::<BigEndian>(0).unwrap();
        }
        buf.extend_from_slice(&kind.0);
        match id {
            AssetId::Id32(v) => buf.write_u32::<BigEndian>(*v).unwrap(),
            AssetId::Id64(v) => buf.write_u64::<BigEndian>(*v).unwrap(),
        }
        buf.write_u32::<BigEndian>(data.len() as u32).unwrap();
        buf.write_u32::<BigEndian>(0).unwrap();
    }
    for (_, _, data) in entries {
        buf.extend_from_slice(data);
        let alignment = game.pak_alignment() as usize;
        let rem = data.len() % alignment;
        if rem != 0 {
            buf.extend(std::iter::repeat(0u8).take(alignment - rem));
        }
    }
    buf
}

fn temp_dir(label: &str) -> std::path::PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("retro-data-tools-test-{label}-{:x}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Scenario: a PAK survives a replace + add + remove cycle with untouched
/// entries keeping their original order and bytes.
#[test]
fn pak_survives_edit_cycle_through_manager_save() {
    let mut files = HashMap::new();
    files.insert(
        "Metroid4.pak".to_string(),
        write_pak(
            Game::Echoes,
            &[
                (tags::STRG, AssetId::Id32(1), b"strings"),
                (tags::TXTR, AssetId::Id32(2), b"texture"),
            ],
        ),
    );
    let mut manager = AssetManager::new(MemoryProvider { files }, Game::Echoes).unwrap();

    manager.replace_asset(AssetId::Id32(1), RawResource::new(tags::STRG, b"new strings".to_vec())).unwrap();
    let new_id = manager.add_new_asset("bonus_texture", RawResource::new(tags::TXTR, b"fresh".to_vec()), &["Metroid4.pak"]).unwrap();

    let out = temp_dir("pak-roundtrip");
    manager.save_modifications(&out).unwrap();

    let saved = std::fs::read(out.join("Metroid4.pak")).unwrap();
    let mut cursor = Cursor::new(saved);
    let pak = retro_data_tools::Pak::parse(&mut cursor, Game::Echoes).unwrap();

    assert_eq!(pak.get_asset(AssetId::Id32(1)).unwrap().data, b"new strings");
    assert_eq!(pak.get_asset(AssetId::Id32(2)).unwrap().data, b"texture");
    assert_eq!(pak.get_asset(new_id).unwrap().data, b"fresh");

    assert!(manager.does_asset_exist(new_id));
    assert!(manager.does_asset_exist(AssetId::Id32(2)));
}

/// Scenario: after save, a deleted asset is gone from the rewritten PAK and
/// reading it reports the same "doesn't exist" outcome as never existing.
#[test]
fn deleted_asset_is_absent_after_save() {
    let mut files = HashMap::new();
    files.insert(
        "Metroid5.pak".to_string(),
        write_pak(Game::Echoes, &[(tags::STRG, AssetId::Id32(10), b"gone-soon"), (tags::TXTR, AssetId::Id32(11), b"stays")]),
    );
    let mut manager = AssetManager::new(MemoryProvider { files }, Game::Echoes).unwrap();
    manager.delete_asset(AssetId::Id32(10)).unwrap();

    let out = temp_dir("pak-delete");
    manager.save_modifications(&out).unwrap();

    let saved = std::fs::read(out.join("Metroid5.pak")).unwrap();
    let mut cursor = Cursor::new(saved);
    let pak = retro_data_tools::Pak::parse(&mut cursor, Game::Echoes).unwrap();
    assert!(!pak.contains(AssetId::Id32(10)));
    assert!(pak.contains(AssetId::Id32(11)));
    assert!(!manager.does_asset_exist(AssetId::Id32(10)));
}

/// Scenario: fresh ids never collide with existing or previously-generated
/// ones, even across many allocations.
#[test]
fn generated_ids_are_always_unique() {
    let mut files = HashMap::new();
    files.insert("Metroid6.pak".to_string(), write_pak(Game::Echoes, &[(tags::STRG, AssetId::Id32(1), b"x")]));
    let mut manager = AssetManager::new(MemoryProvider { files }, Game::Echoes).unwrap();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..256 {
        let id = manager.generate_asset_id();
        assert!(seen.insert(id), "generated a duplicate id: {id:?}");
    }
}

/// Scenario: a custom name registered for a new asset resolves the same id
/// both before and after save (alias stability across a save cycle).
#[test]
fn custom_alias_survives_save_cycle() {
    let mut files = HashMap::new();
    files.insert("Metroid7.pak".to_string(), write_pak(Game::Echoes, &[]));
    let mut manager = AssetManager::new(MemoryProvider { files }, Game::Echoes).unwrap();

    let id = manager
        .add_new_asset("player_hud_strg", RawResource::new(tags::STRG, b"hud".to_vec()), &["Metroid7.pak"])
        .unwrap();

    let out = temp_dir("pak-alias");
    manager.save_modifications(&out).unwrap();

    assert!(manager.does_asset_exist(id));
    assert_eq!(manager.find_paks(id).unwrap(), vec!["Metroid7.pak".to_string()]);

    let names_json = std::fs::read_to_string(out.join("custom_names.json")).unwrap();
    assert!(names_json.contains("player_hud_strg"));
}

/// Scenario S3 end to end: a MAPW resource's dependencies are its area maps
/// followed by itself, reachable through `AssetManager::dependencies_for`.
#[test]
fn mapw_dependency_closure_through_manager() {
    let mut mapw_bytes = Vec::new();
    mapw_bytes.write_u32::<BigEndian>(0xDEAD_F00D).unwrap();
    mapw_bytes.write_u32::<BigEndian>(1).unwrap();
    mapw_bytes.write_u32::<BigEndian>(2).unwrap();
    mapw_bytes.write_u32::<BigEndian>(0xAAAA_AAAA).unwrap();
    mapw_bytes.write_u32::<BigEndian>(0xBBBB_BBBB).unwrap();

    let mut files = HashMap::new();
    files.insert(
        "Metroid8.pak".to_string(),
        write_pak(Game::Echoes, &[(tags::MAPW, AssetId::Id32(42), &mapw_bytes)]),
    );
    let manager = AssetManager::new(MemoryProvider { files }, Game::Echoes).unwrap();

    let deps = manager.dependencies_for(AssetId::Id32(42), true).unwrap();
    assert_eq!(
        deps,
        vec![
            Dependency::new(tags::MAPA, AssetId::Id32(0xAAAA_AAAA)),
            Dependency::new(tags::MAPA, AssetId::Id32(0xBBBB_BBBB)),
            Dependency::new(tags::MAPW, AssetId::Id32(42)),
        ]
    );
}
