//! The script-layer accessor (component F): an ordered list of script
//! instances per MREA layer, lazily parsed, with append/remove mutation and
//! a modified flag that invalidates the owning area's cached dependency list.
//!
//! Grounded on `mrea.py`'s `ScriptLayer`/`ScriptInstance` pair. Per-instance
//! typed property parsing and the "mlvl dependencies" routine are external
//! collaborators (spec §1 excludes individual resource codecs); this module
//! only owns instance framing, layer bookkeeping, and the mutation surface.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;
use crate::resource::Dependency;

/// A script instance's id: the low bits are an index local to the layer, the
/// high byte (or half-word, depending on game) encodes the owning layer.
/// Generated-objects instances carry `ScriptLayer::GENERATED_LAYER_INDEX`
/// here instead of a real layer index (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u32);

impl InstanceId {
    pub fn layer_index(self) -> u32 {
        self.0 >> 26
    }

    pub fn local_index(self) -> u32 {
        self.0 & 0x03FF_FFFF
    }

    pub fn new(layer_index: u32, local_index: u32) -> Self {
        InstanceId((layer_index << 26) | (local_index & 0x03FF_FFFF))
    }
}

/// One scripted object: its type tag (an engine-internal object-type code,
/// distinct from the 4-byte resource type tags elsewhere in this crate),
/// opaque property bytes, and its outgoing connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInstance {
    pub id: InstanceId,
    pub object_type: u8,
    pub properties: Vec<u8>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub state: u32,
    pub message: u32,
    pub target: InstanceId,
}

/// An ordered list of script instances. Prime 1 shares a single blob across
/// all "layers" (spec §4.F); later games give each its own section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLayer {
    pub layer_index: u32,
    pub instances: Vec<ScriptInstance>,
    modified: bool,
}

impl ScriptLayer {
    /// Sentinel layer index used for the synthetic generated-objects layer.
    pub const GENERATED_LAYER_INDEX: u32 = 0xFFFF_FFFF;

    fn parse_instance(r: &mut impl std::io::Read) -> std::io::Result<ScriptInstance> {
        let object_type = r.read_u8()?;
        let instance_len = r.read_u32::<BigEndian>()?;
        let id = InstanceId(r.read_u32::<BigEndian>()?);
        let properties_len = r.read_u32::<BigEndian>()?;
        let mut properties = vec![0u8; properties_len as usize];
        r.read_exact(&mut properties)?;

        let connection_count = r.read_u32::<BigEndian>()?;
        let mut connections = Vec::with_capacity(connection_count as usize);
        for _ in 0..connection_count {
            let state = r.read_u32::<BigEndian>()?;
            let message = r.read_u32::<BigEndian>()?;
            let target = InstanceId(r.read_u32::<BigEndian>()?);
            connections.push(Connection { state, message, target });
        }

        let _ = instance_len;
        Ok(ScriptInstance { id, object_type, properties, connections })
    }

    fn write_instance(w: &mut impl std::io::Write, instance: &ScriptInstance) -> std::io::Result<()> {
        let mut body = Vec::new();
        body.write_u32::<BigEndian>(instance.id.0)?;
        body.write_u32::<BigEndian>(instance.properties.len() as u32)?;
        body.write_all(&instance.properties)?;
        body.write_u32::<BigEndian>(instance.connections.len() as u32)?;
        for c in &instance.connections {
            body.write_u32::<BigEndian>(c.state)?;
            body.write_u32::<BigEndian>(c.message)?;
            body.write_u32::<BigEndian>(c.target.0)?;
        }

        w.write_u8(instance.object_type)?;
        w.write_u32::<BigEndian>(body.len() as u32)?;
        w.write_all(&body)?;
        Ok(())
    }

    /// Parses one layer's raw section bytes.
    pub fn parse(bytes: &[u8], layer_index: u32) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(bytes);
        let count = cursor.read_u32::<BigEndian>()?;
        let mut instances = Vec::with_capacity(count as usize);
        for _ in 0..count {
            instances.push(Self::parse_instance(&mut cursor)?);
        }
        Ok(Self { layer_index, instances, modified: false })
    }

    /// Serializes the layer back to its section bytes.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(self.instances.len() as u32)?;
        for instance in &self.instances {
            Self::write_instance(&mut buf, instance)?;
        }
        Ok(buf)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn get(&self, id: InstanceId) -> Option<&ScriptInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// Appends a new instance, assigning it this layer's index.
    pub fn append(&mut self, mut instance: ScriptInstance) -> InstanceId {
        instance.id = InstanceId::new(self.layer_index, instance.id.local_index());
        let id = instance.id;
        self.instances.push(instance);
        self.modified = true;
        id
    }

    /// Removes an instance by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: InstanceId) -> bool {
        let before = self.instances.len();
        self.instances.retain(|i| i.id != id);
        let removed = self.instances.len() != before;
        if removed {
            self.modified = true;
        }
        removed
    }

    /// Dependency query: delegates to each instance's external "mlvl
    /// dependencies" routine. The core only flattens and preserves source
    /// order (spec §4.F); the routine itself lives with each object type's
    /// property schema, an external collaborator.
    pub fn dependencies<F>(&self, mut per_instance: F) -> Vec<Dependency>
    where
        F: FnMut(&ScriptInstance) -> Vec<Dependency>,
    {
        self.instances.iter().flat_map(|i| per_instance(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instance(id: u32) -> ScriptInstance {
        ScriptInstance {
            id: InstanceId(id),
            object_type: 0x10,
            properties: vec![1, 2, 3],
            connections: vec![Connection { state: 1, message: 2, target: InstanceId(0) }],
        }
    }

    #[test]
    fn instance_id_packs_layer_and_local_index() {
        let id = InstanceId::new(3, 42);
        assert_eq!(id.layer_index(), 3);
        assert_eq!(id.local_index(), 42);
    }

    #[test]
    fn round_trips_through_build_and_parse() {
        let layer = ScriptLayer { layer_index: 0, instances: vec![sample_instance(7)], modified: false };
        let bytes = layer.build().unwrap();
        let reparsed = ScriptLayer::parse(&bytes, 0).unwrap();
        assert_eq!(reparsed.instances, layer.instances);
    }

    #[test]
    fn append_sets_modified_flag_and_layer_index() {
        let mut layer = ScriptLayer { layer_index: 2, instances: vec![], modified: false };
        let id = layer.append(sample_instance(0));
        assert!(layer.is_modified());
        assert_eq!(id.layer_index(), 2);
    }

    #[test]
    fn remove_unknown_id_is_a_no_op() {
        let mut layer = ScriptLayer { layer_index: 0, instances: vec![sample_instance(1)], modified: false };
        assert!(!layer.remove(InstanceId(999)));
        assert!(!layer.is_modified());
    }

    #[test]
    fn dependencies_flattens_in_instance_order() {
        let layer = ScriptLayer {
            layer_index: 0,
            instances: vec![sample_instance(1), sample_instance(2)],
            modified: false,
        };
        let deps = layer.dependencies(|i| vec![Dependency::new(crate::fourcc::tags::TXTR, crate::asset_id::AssetId::Id32(i.id.0))]);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].asset_id, crate::asset_id::AssetId::Id32(1));
    }
}
