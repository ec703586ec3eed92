//! Compression backends
//!
//! Both formats delegate to general-purpose codecs:
//! - `ZstdFrame`: zstd frames, used by container entries
//! - `Lz4Block`: raw LZ4 blocks (no frame header), used by HMG pixel data

use crate::{Error, Result};

/// Trait for a whole-buffer compression codec
pub trait Codec: Send + Sync {
    /// Compress a whole buffer
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a buffer that must expand to exactly `expected` bytes
    fn decompress(&self, compressed: &[u8], expected: usize) -> Result<Vec<u8>>;

    /// Worst-case compressed size for `size` input bytes
    fn compress_bound(&self, size: usize) -> usize;

    /// Get the backend name for diagnostics
    fn name(&self) -> &'static str;
}

/// zstd frame codec
#[derive(Debug, Clone, Copy)]
pub struct ZstdFrame {
    level: i32,
}

impl ZstdFrame {
    pub const DEFAULT_LEVEL: i32 = 3;

    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdFrame {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

impl Codec for ZstdFrame {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(data, self.level).map_err(|e| Error::Compression {
            codec: self.name(),
            message: e.to_string(),
        })
    }

    fn decompress(&self, compressed: &[u8], expected: usize) -> Result<Vec<u8>> {
        let output =
            zstd::bulk::decompress(compressed, expected).map_err(|e| Error::Compression {
                codec: self.name(),
                message: e.to_string(),
            })?;

        if output.len() != expected {
            return Err(Error::DecompressionSize {
                expected,
                actual: output.len(),
            });
        }

        Ok(output)
    }

    fn compress_bound(&self, size: usize) -> usize {
        zstd::zstd_safe::compress_bound(size)
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

/// Raw LZ4 block codec
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Block;

impl Codec for Lz4Block {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::block::compress(data))
    }

    fn decompress(&self, compressed: &[u8], expected: usize) -> Result<Vec<u8>> {
        let mut output = vec![0u8; expected];

        let actual = lz4_flex::block::decompress_into(compressed, &mut output).map_err(|e| {
            Error::Compression {
                codec: self.name(),
                message: e.to_string(),
            }
        })?;

        if actual != expected {
            return Err(Error::DecompressionSize { expected, actual });
        }

        Ok(output)
    }

    fn compress_bound(&self, size: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(size)
    }

    fn name(&self) -> &'static str {
        "lz4"
    }
}
