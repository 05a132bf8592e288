//! Named constants for the handful of magic numbers the codecs rely on,
//! collected into one struct so tests can exercise non-default values
//! without recompiling. Generalizes `asset-system/build.rs`'s
//! `Config`/`GroupConfig` pair (there read once from a `config.toml` at
//! build time) into an explicit runtime struct, since this crate's manager
//! is a library invoked at runtime rather than a build script.

/// Tunables for the PAK codec and the MREA compressed-block encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Compressed-block encoder's size rule: close the current block once
    /// adding the next section would exceed this many uncompressed bytes.
    pub script_boundary_size_limit: u32,
    /// Alignment, in bytes, of every compressed block payload and of the
    /// section-size / compressed-block-header arrays.
    pub block_alignment: u32,
    /// PAK body alignment for the per-resource-compression layout (Prime 1).
    pub pak_alignment_prime1: u64,
    /// PAK body alignment for the global-LZO-framed layout (Echoes/Corruption).
    pub pak_alignment_prime2: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            script_boundary_size_limit: 0x20000,
            block_alignment: 32,
            pak_alignment_prime1: 16,
            pak_alignment_prime2: 32,
        }
    }
}
