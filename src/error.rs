//! Crate-wide error taxonomy.
//!
//! Mirrors the four buckets a caller actually needs to branch on: lookup
//! errors (asset/pak/type not found), decoding errors (malformed on-disc
//! data), policy errors (the manager's own bookkeeping rules), and I/O errors
//! propagated verbatim from the file provider.

use thiserror::Error;

use crate::asset_id::AssetId;
use crate::fourcc::FourCC;

/// Every fallible operation in this crate returns this error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when an asset id is referenced but not present in any known PAK,
    /// and the caller asked for it to be required to exist.
    #[error("unknown asset id {id:?}{}", name.as_ref().map(|n| format!(" ({n})")).unwrap_or_default())]
    UnknownAssetId { id: AssetId, name: Option<String> },

    /// Raised by `ensure_present`/`get_pak` for a pak name never seen during
    /// header scan.
    #[error("unknown pak: {0}")]
    UnknownPakName(String),

    /// Raised when the registry has no descriptor for a resource type and the
    /// operation requires one (opaque-bytes handling does not raise this).
    #[error("unknown resource type: {0}")]
    UnknownResourceType(FourCC),

    /// The asset a caller fetched turned out not to be of the expected type.
    #[error("wrong resource type: expected {expected}, got {actual}")]
    WrongResourceType { expected: FourCC, actual: FourCC },

    /// A `FileProvider` could not be interpreted as a disc image, or the
    /// image has no data partition.
    #[error("not a valid disc image, or no data partition: {0}")]
    InvalidImage(String),

    /// Malformed header, magic mismatch, or structurally inconsistent data,
    /// reported with path/offset context where available.
    #[error("codec error at {path}: {reason}")]
    Codec { path: String, reason: String },

    /// A decompressed block's length did not match its header-declared size.
    #[error("decompression size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A read was attempted against an asset id that has been tombstoned by
    /// `delete_asset` in the current session.
    #[error("asset {0:?} was deleted")]
    DeletedAsset(AssetId),

    /// `register_custom_asset_name` was called with a name already bound to a
    /// different asset id.
    #[error("name {0:?} is already bound to a different asset id")]
    DuplicateName(String),

    /// `add_new_asset` / `register_custom_asset_name` was called with an id
    /// that already exists.
    #[error("asset {0:?} already exists")]
    AssetAlreadyExists(AssetId),

    /// Propagated verbatim from the `FileProvider` or from serialization I/O.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
