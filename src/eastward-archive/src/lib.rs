//! Binary formats used by Eastward's shipped game data
//!
//! # Format Overview
//!
//! ## Container (`.g`)
//!
//! A flat table of named, independently compressed blobs:
//! - Bytes 0-3: Magic (`27191`, little-endian i32)
//! - Bytes 4-7: Entry count
//! - Entry table: NUL-terminated name, then offset, compression flag,
//!   decompressed size and compressed size (all little-endian i32)
//! - Payload region: zstd frames (flag `2`) or stored bytes, addressed by offset
//!
//! ## HMG texture
//!
//! A `PGF`-tagged header followed by one LZ4 block holding 32-bit BGRA pixels.
//!
//! Entries are addressed by virtual path, `"{archive}/{relative name}"`.

pub mod archive;
pub mod compression;
pub mod texture;

pub use archive::{is_archive, join_under, Archive, Entry};
pub use compression::{Codec, Lz4Block, ZstdFrame};
pub use texture::{decode as decode_texture, encode as encode_texture, is_texture, Texture};

/// Container magic, stored as a little-endian i32
pub const ARCHIVE_MAGIC: i32 = 27191;

/// Compression flag marking a zstd-framed entry
pub const FLAG_ZSTD: i32 = 2;

/// HMG texture magic
pub const TEXTURE_MAGIC: [u8; 3] = *b"PGF";

/// Errors from container and texture parsing
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Corrupt archive '{archive}': {reason}")]
    CorruptArchive { archive: String, reason: String },

    #[error("Invalid texture magic: expected 'PGF', got {0:02x?}")]
    InvalidTextureFormat([u8; 3]),

    #[error("Corrupt texture: {0}")]
    CorruptTexture(String),

    #[error("{codec} error: {message}")]
    Compression {
        codec: &'static str,
        message: String,
    },

    #[error("Decompression size mismatch: expected {expected}, got {actual}")]
    DecompressionSize { expected: usize, actual: usize },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(archive: &str, reason: impl Into<String>) -> Self {
        Error::CorruptArchive {
            archive: archive.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
