//! The dependency engine (component G): transitive enumeration of the asset
//! ids an asset depends on, with cycle-safe on-stack tracking, commit-once
//! caching, and per-game override layers.
//!
//! Grounded on `asset_manager.py`'s `get_dependencies_for_asset` /
//! `get_dependencies_for_ancs`, re-architected per spec §9's note: cache
//! writes happen on return (post-recursion) but cycle safety comes from an
//! explicit on-stack visited set threaded through the recursion, not from
//! the cache itself.

use ahash::AHashSet;
use once_cell::sync::Lazy;

use crate::asset_id::AssetId;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fourcc::FourCC;
use crate::game::Game;
use crate::resource::Dependency;
use crate::script_layer::ScriptInstance;

/// The narrow surface the dependency engine needs from the asset manager:
/// "what type is this id, and what are its raw bytes" — kept as a trait so
/// `dependency` has no upward dependency on `manager`. The last two methods
/// are the seam external collaborators plug into: per-object-type property
/// schemas (script instances) and the audio-group index (sound ids), both
/// out of this crate's scope (spec §1) but reachable through this context
/// so a schema supplied by the manager can still resolve them.
pub trait DependencyContext {
    fn asset_type(&self, id: AssetId) -> Option<FourCC>;
    fn asset_bytes(&self, id: AssetId) -> Option<Vec<u8>>;
    fn game(&self) -> Game;
    fn config(&self) -> Config;
    fn script_instance_dependencies(&self, instance: &ScriptInstance) -> Vec<Dependency>;
    fn audio_group_dependency(&self, sound_id: u16) -> Option<Dependency>;
}

/// Function-pointer seam for per-script-instance dependency extraction,
/// supplied by the manager (spec §1: per-object-type property schemas are an
/// external collaborator). Receives the full context so an extractor can
/// call back into it, e.g. `ctx.audio_group_dependency(sound_id)` for a
/// property that names a sound rather than an asset id directly.
pub type ScriptInstanceExtractor = fn(&dyn DependencyContext, &ScriptInstance) -> Vec<Dependency>;

/// A hard-coded `(area id, layer name) -> extra dependencies` augmentation,
/// patching known bugs in shipped PAK data (spec §4.G, scenario S5). The
/// sentinel `"!!non_layer!!"` key marks area-scoped additions not tied to
/// any one layer.
pub const NON_LAYER_SENTINEL: &str = "!!non_layer!!";

struct Augmentation {
    area_id: u32,
    layer: &'static str,
    kind: FourCC,
    asset_id: u32,
}

static HARDCODED_AUGMENTATIONS: Lazy<Vec<Augmentation>> = Lazy::new(|| {
    vec![
        // Sanctum (Echoes), "Emperor Ing Stage 1": a TXTR referenced only by
        // an animation the default script-instance scan misses (spec §8 S5).
        Augmentation {
            area_id: 0xD7C3_B839,
            layer: "Emperor Ing Stage 1",
            kind: crate::fourcc::tags::TXTR,
            asset_id: 0x52C7_D438,
        },
    ]
});

/// Extra `(type, id)` pairs for `area_id`/`layer`, where `layer` is either a
/// real layer name or [`NON_LAYER_SENTINEL`].
pub fn hardcoded_augmentations(area_id: AssetId, layer: &str) -> Vec<Dependency> {
    let AssetId::Id32(area_id) = area_id else { return Vec::new() };
    HARDCODED_AUGMENTATIONS
        .iter()
        .filter(|a| a.area_id == area_id && a.layer == layer)
        .map(|a| Dependency::new(a.kind, AssetId::Id32(a.asset_id)))
        .collect()
}

/// Memoized transitive edges, keyed by asset id, plus the ANCS-per-character
/// two-level cache (spec §3).
#[derive(Default)]
pub struct DependencyCache {
    by_asset: std::collections::HashMap<u64, Vec<Dependency>>,
    by_ancs_character: std::collections::HashMap<(u64, u32), Vec<Dependency>>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached entry. Used by `save_modifications` once the
    /// manager re-scans from the output (spec §4.H step 7): stale entries
    /// could otherwise reference assets at positions that no longer exist.
    pub fn clear(&mut self) {
        self.by_asset.clear();
        self.by_ancs_character.clear();
    }
}

/// Special ANCS dependencies prepended ahead of character-scoped ones
/// (spec §4.G). Empty for every currently supported title; left as an
/// extension point the same way `Game::mlvl_dependencies_to_ignore` is.
fn special_ancs_dependencies(_game: Game) -> Vec<Dependency> {
    Vec::new()
}

/// Enumerates `id`'s transitive dependencies, post-order (children before
/// the asset itself), honoring the per-game MLVL-ignore override. Returns
/// `Ok(vec![])` for an unknown id when `must_exist` is false; fails with
/// `UnknownAssetId` otherwise (spec §4.G steps 1-2, §7 "the dependency
/// engine may swallow `UnknownAssetId`").
pub fn get_dependencies_for_asset(
    ctx: &impl DependencyContext,
    cache: &mut DependencyCache,
    id: AssetId,
    must_exist: bool,
) -> Result<Vec<Dependency>> {
    let mut visited = AHashSet::new();
    resolve(ctx, cache, id, must_exist, &mut visited)
}

fn resolve(
    ctx: &impl DependencyContext,
    cache: &mut DependencyCache,
    id: AssetId,
    must_exist: bool,
    on_stack: &mut AHashSet<u64>,
) -> Result<Vec<Dependency>> {
    let game = ctx.game();
    if !game.is_valid_asset_id(id) {
        return Ok(Vec::new());
    }

    let Some(kind) = ctx.asset_type(id) else {
        return if must_exist { Err(Error::UnknownAssetId { id, name: None }) } else { Ok(Vec::new()) };
    };

    if let Some(cached) = cache.by_asset.get(&id.as_u64()) {
        return Ok(apply_overrides(game, cached.clone()));
    }

    // Cycle guard: an asset currently being resolved higher on the stack
    // contributes no further children here (spec §9: cycles are tolerated,
    // not cached across recursion).
    if !on_stack.insert(id.as_u64()) {
        return Ok(Vec::new());
    }

    let mut children = Vec::new();
    if let Some(result) = registry_cheat_scan(ctx, id, kind, game) {
        children = result?;
    } else if crate::registry::has_dependencies(kind, game) {
        for child in direct_children(ctx, id, kind)? {
            children.extend(resolve(ctx, cache, child, false, on_stack)?);
        }
    }

    on_stack.remove(&id.as_u64());

    children.push(Dependency::new(kind, id));
    cache.by_asset.insert(id.as_u64(), children.clone());

    Ok(apply_overrides(game, children))
}

fn registry_cheat_scan(ctx: &impl DependencyContext, id: AssetId, kind: FourCC, game: Game) -> Option<Result<Vec<Dependency>>> {
    let data = ctx.asset_bytes(id)?;
    crate::registry::cheat_dependencies(kind, &data, game)
}

/// For non-cheated, dependency-bearing types, this would invoke the
/// registered parser's `dependencies_for`. Most of those parsers are
/// external collaborators (spec §1) and, absent one, a type registered with
/// `has_dependencies == true` but no cheat scanner yields no children.
///
/// `MREA` is the one exception the core owns directly: it enumerates its
/// script layers and relays each instance through
/// [`DependencyContext::script_instance_dependencies`] (spec §4.F/§4.G).
fn direct_children(ctx: &impl DependencyContext, id: AssetId, kind: FourCC) -> Result<Vec<AssetId>> {
    if kind != crate::fourcc::tags::MREA {
        return Ok(Vec::new());
    }
    mrea_script_dependencies(ctx, id)
}

/// Enumerates every script-layer and generated-objects instance in the
/// `MREA` at `id` and relays each through the context's per-instance
/// extractor, flattening to the set of asset ids referenced.
fn mrea_script_dependencies(ctx: &impl DependencyContext, id: AssetId) -> Result<Vec<AssetId>> {
    let Some(data) = ctx.asset_bytes(id) else { return Ok(Vec::new()) };
    let mut cursor = std::io::Cursor::new(data);
    let mut area = crate::mrea::Area::parse(&mut cursor, ctx.game(), &ctx.config())?;

    let mut ids = Vec::new();
    for layer in area.script_layers()?.to_vec() {
        for dep in layer.dependencies(|i| ctx.script_instance_dependencies(i)) {
            ids.push(dep.asset_id);
        }
    }
    if let Some(layer) = area.generated_objects()?.cloned() {
        for dep in layer.dependencies(|i| ctx.script_instance_dependencies(i)) {
            ids.push(dep.asset_id);
        }
    }
    Ok(ids)
}

/// Area-level dependency rebuild (spec §4.G): merges every script layer's
/// instance-extracted dependencies with the hardcoded augmentation for that
/// layer's name (and the area-scoped [`NON_LAYER_SENTINEL`] augmentations),
/// then resolves each transitively. `layer_names` maps layer index to name
/// and is supplied by the caller (MLVL layer metadata is an external
/// collaborator, spec §1); unlike [`get_dependencies_for_asset`] this is not
/// cached by asset id alone since its result depends on `layer_names` too.
pub fn get_area_dependencies(
    ctx: &impl DependencyContext,
    cache: &mut DependencyCache,
    area_id: AssetId,
    layer_names: &[String],
) -> Result<Vec<Dependency>> {
    let kind = ctx.asset_type(area_id).ok_or(Error::UnknownAssetId { id: area_id, name: None })?;
    if kind != crate::fourcc::tags::MREA {
        return Err(Error::WrongResourceType { expected: crate::fourcc::tags::MREA, actual: kind });
    }
    let data = ctx.asset_bytes(area_id).ok_or(Error::UnknownAssetId { id: area_id, name: None })?;
    let mut cursor = std::io::Cursor::new(data);
    let mut area = crate::mrea::Area::parse(&mut cursor, ctx.game(), &ctx.config())?;

    let mut raw_deps = hardcoded_augmentations(area_id, NON_LAYER_SENTINEL);

    for layer in area.script_layers()?.to_vec() {
        raw_deps.extend(layer.dependencies(|i| ctx.script_instance_dependencies(i)));
        if let Some(name) = layer_names.get(layer.layer_index as usize) {
            raw_deps.extend(hardcoded_augmentations(area_id, name));
        }
    }
    if let Some(layer) = area.generated_objects()?.cloned() {
        raw_deps.extend(layer.dependencies(|i| ctx.script_instance_dependencies(i)));
    }

    let mut resolved = Vec::new();
    let mut visited = AHashSet::new();
    for dep in raw_deps {
        resolved.extend(resolve(ctx, cache, dep.asset_id, false, &mut visited)?);
    }
    resolved.push(Dependency::new(kind, area_id));
    Ok(apply_overrides(ctx.game(), resolved))
}

fn apply_overrides(game: Game, mut deps: Vec<Dependency>) -> Vec<Dependency> {
    let ignore = game.mlvl_dependencies_to_ignore();
    for dep in &mut deps {
        if let AssetId::Id32(v) = dep.asset_id {
            if ignore.contains(&v) {
                dep.exclude_from_mlvl = true;
            }
        }
    }
    deps
}

/// ANCS-per-character dependency query (spec §4.G). Fails with
/// `WrongResourceType` if `id` is not an ANCS.
pub fn get_dependencies_for_ancs(
    ctx: &impl DependencyContext,
    cache: &mut DependencyCache,
    id: AssetId,
    character_index: u32,
) -> Result<Vec<Dependency>> {
    let kind = ctx.asset_type(id).ok_or(Error::UnknownAssetId { id, name: None })?;
    if kind != crate::fourcc::tags::ANCS {
        return Err(Error::WrongResourceType { expected: crate::fourcc::tags::ANCS, actual: kind });
    }

    let key = (id.as_u64(), character_index);
    if let Some(cached) = cache.by_ancs_character.get(&key) {
        return Ok(cached.clone());
    }

    let mut deps = special_ancs_dependencies(ctx.game());
    // Character-scoped dependency extraction (textures/animations/sounds for
    // one ANCS character) belongs to the ANCS codec, an external
    // collaborator; absent that parser, only the special and self edges are
    // produced here.
    deps.push(Dependency::new(kind, id));

    cache.by_ancs_character.insert(key, deps.clone());
    Ok(deps)
}
