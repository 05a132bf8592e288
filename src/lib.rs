//! Asset manager and transitive-dependency engine for Retro Studios
//! GameCube/Wii PAK archives (Metroid Prime 1-3).
//!
//! The crate is organized leaf-first: `align`/`fourcc`/`asset_id`/`game`/
//! `resource`/`config`/`error` are shared primitives; `compression` and
//! `pak` are the on-disc codecs; `mrea`/`script_layer` split an area file
//! into its section groups; `registry`/`dependency` resolve what an asset
//! references; `manager` ties all of it into one editing session.
//!
//! Individual resource-type bodies (`ANCS`, `CMDL`, `STRG`, textures, …),
//! the GameCube/Wii disc reader, and the CLI that drives this crate are
//! external collaborators and live outside it.

pub mod align;
pub mod asset_id;
pub mod audio;
pub mod compression;
pub mod config;
pub mod dependency;
pub mod error;
pub mod file_provider;
pub mod formats;
pub mod fourcc;
pub mod game;
pub mod manager;
pub mod mrea;
pub mod pak;
pub mod registry;
pub mod resource;
pub mod script_layer;

pub use asset_id::{AssetId, NameOrAssetId};
pub use config::Config;
pub use error::{Error, Result};
pub use file_provider::{DirectoryFileProvider, DiscFileProvider, DiscPartition, FileProvider};
pub use fourcc::FourCC;
pub use game::Game;
pub use manager::AssetManager;
pub use pak::Pak;
pub use resource::{Dependency, RawResource};
