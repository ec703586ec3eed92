//! Asset resolution for Eastward game data
//!
//! Turns the game's metadata index plus its `.g` containers into typed,
//! possibly composite assets:
//!
//! - [`metadata`]: asset index, script library and texture index documents
//! - [`vfs`]: loaded containers overlaid on an optional on-disk tree
//! - [`resolver`]: type-driven dispatch with a per-run cache
//! - [`atlas`]: sprite crops out of stitched atlas sheets
//! - [`tree`]: display tree of materialisable asset names
//! - [`audio`]: sound bank string enumeration contract
//!
//! ```ignore
//! let metadata = Metadata::from_config_archive(&Archive::open("config.g")?)?;
//! let mut vfs = Vfs::new();
//! vfs.load_archive(Archive::open("game.g")?);
//!
//! let mut resolver = Resolver::new(metadata, vfs);
//! resolver.resolve_all();
//! let summary = resolver.export_all(Path::new("out"));
//! ```

pub mod asset;
pub mod atlas;
pub mod audio;
pub mod metadata;
pub mod resolver;
pub mod tree;
pub mod vfs;

pub use asset::{Asset, Package, Text};
pub use atlas::Atlas;
pub use audio::{list_strings, BankString, SoundBank};
pub use metadata::{AssetDescriptor, AssetIndex, FileType, Metadata, ScriptLibrary, TextureIndex};
pub use resolver::{strategy, Classify, LeafKind, Resolver, Strategy};
pub use tree::FileTree;
pub use vfs::Vfs;

pub use eastward_archive::{Archive, Texture};

/// Errors from metadata loading and asset resolution
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Archive '{0}' is not loaded")]
    ArchiveNotLoaded(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error(transparent)]
    Format(#[from] eastward_archive::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset '{asset}' has no '{role}' object file")]
    MissingRole { asset: String, role: String },

    #[error("No compiled script for '{0}'")]
    MissingScript(String),

    #[error("Invalid atlas layout in '{atlas}': {reason}")]
    InvalidLayout { atlas: String, reason: String },

    #[error("Sprite '{sprite}' not found in atlas '{atlas}'")]
    SpriteNotFound { atlas: String, sprite: String },

    #[error("Duplicate child '{0}'")]
    DuplicateChild(String),

    #[error("Missing metadata document: {0}")]
    MissingMetadata(String),
}

impl Error {
    /// Conditions the resolver swallows without logging
    ///
    /// Partially loaded archive sets are the normal case during incremental
    /// extraction, so an unloaded archive is not worth a warning.
    pub fn is_absorbed(&self) -> bool {
        matches!(self, Error::ArchiveNotLoaded(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
