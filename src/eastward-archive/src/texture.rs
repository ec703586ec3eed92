//! HMG texture codec
//!
//! Layout (little-endian):
//! - Bytes 0-2: `PGF` magic
//! - Byte 3: Length of the first padding chunk (always 2 when written)
//! - Bytes 4-7: Total file size
//! - Padding chunk (a 2-byte sentinel when written)
//! - Compressed size, width, height (i32 each)
//! - Bit depth (32), format version (1), second padding length (2), compression type (0 = LZ4)
//! - Second padding chunk (another 2-byte sentinel)
//! - One LZ4 block of `width * height` BGRA pixels
//!
//! In memory a [`Texture`] is always RGBA, rows top-down.

use std::io::{Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use image::{ImageBuffer, ImageFormat, Rgba};

use crate::compression::{Codec, Lz4Block};
use crate::{Error, Result, TEXTURE_MAGIC};

const FIRST_SENTINEL: u16 = 24984;
const SECOND_SENTINEL: u16 = 48297;
const BIT_DEPTH: u8 = 32;
const FORMAT_VERSION: u8 = 1;
const COMPRESSION_LZ4: u8 = 0;

/// Header bytes preceding the compressed payload when written
const HEADER_SIZE: usize = 3 + 1 + 4 + 2 + 4 + 4 + 4 + 1 + 1 + 1 + 1 + 2;

/// Upper bound on LZ4 expansion, used to reject absurd dimensions before allocating
const MAX_LZ4_RATIO: usize = 255;

/// Decoded RGBA8 raster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Texture {
    /// Wrap an RGBA8 buffer, rows top-down
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = buffer_len(width, height)?;
        if pixels.len() != expected {
            return Err(Error::CorruptTexture(format!(
                "{}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Transparent black raster
    pub fn blank(width: u32, height: u32) -> Result<Self> {
        Self::new(width, height, vec![0; buffer_len(width, height)?])
    }

    /// Import rows from a bottom-up source (bitmap convention)
    pub fn from_bottom_up(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let mut texture = Self::new(width, height, pixels)?;
        texture.flip_vertical();
        Ok(texture)
    }

    /// Decode a PNG (or any format `image` sniffs) into RGBA
    pub fn from_png(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)?.to_rgba8();
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// RGBA at `(x, y)`, or `None` outside the raster
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Overwrite the pixel at `(x, y)`; ignored outside the raster
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }

    /// Reverse row order in place
    pub fn flip_vertical(&mut self) {
        let stride = self.width as usize * 4;
        if stride == 0 {
            return;
        }
        let rows = self.height as usize;
        for top in 0..rows / 2 {
            let bottom = rows - 1 - top;
            let (head, tail) = self.pixels.split_at_mut(bottom * stride);
            head[top * stride..(top + 1) * stride].swap_with_slice(&mut tail[..stride]);
        }
    }

    /// Encode as PNG bytes
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.image_buffer()?
            .write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Save as PNG regardless of the path's extension
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image_buffer()?
            .save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }

    fn image_buffer(&self) -> Result<ImageBuffer<Rgba<u8>, &[u8]>> {
        ImageBuffer::from_raw(self.width, self.height, self.pixels.as_slice())
            .ok_or_else(|| Error::CorruptTexture("pixel buffer does not match dimensions".into()))
    }
}

fn buffer_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::CorruptTexture(format!("{}x{} overflows", width, height)))
}

/// Swap the R and B channels of every pixel
fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

/// Check if data starts with the HMG magic
pub fn is_texture(data: &[u8]) -> bool {
    data.len() >= 3 && data[..3] == TEXTURE_MAGIC
}

/// Encode a texture as HMG bytes
pub fn encode(texture: &Texture) -> Result<Vec<u8>> {
    let mut wire = texture.pixels.clone();
    swap_red_blue(&mut wire);

    let compressed = Lz4Block.compress(&wire)?;
    let file_size = i32::try_from(HEADER_SIZE + compressed.len())
        .map_err(|_| Error::CorruptTexture("texture too large".into()))?;
    let compressed_len = i32::try_from(compressed.len())
        .map_err(|_| Error::CorruptTexture("texture too large".into()))?;
    let width = i32::try_from(texture.width)
        .map_err(|_| Error::CorruptTexture(format!("width {} too large", texture.width)))?;
    let height = i32::try_from(texture.height)
        .map_err(|_| Error::CorruptTexture(format!("height {} too large", texture.height)))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + compressed.len());
    out.extend_from_slice(&TEXTURE_MAGIC);
    out.write_u8(2)?;
    out.write_i32::<LE>(file_size)?;
    out.write_u16::<LE>(FIRST_SENTINEL)?;
    out.write_i32::<LE>(compressed_len)?;
    out.write_i32::<LE>(width)?;
    out.write_i32::<LE>(height)?;
    out.write_u8(BIT_DEPTH)?;
    out.write_u8(FORMAT_VERSION)?;
    out.write_u8(2)?;
    out.write_u8(COMPRESSION_LZ4)?;
    out.write_u16::<LE>(SECOND_SENTINEL)?;
    out.extend_from_slice(&compressed);

    Ok(out)
}

/// Decode HMG bytes into an RGBA texture
pub fn decode(data: &[u8]) -> Result<Texture> {
    if data.len() < 3 {
        return Err(Error::CorruptTexture(format!(
            "need at least 3 bytes, got {}",
            data.len()
        )));
    }
    if !is_texture(data) {
        return Err(Error::InvalidTextureFormat([data[0], data[1], data[2]]));
    }

    let truncated = |_: std::io::Error| Error::CorruptTexture("truncated header".into());
    let mut cursor = Cursor::new(&data[3..]);

    let padding = cursor.read_u8().map_err(truncated)?;
    let _file_size = cursor.read_i32::<LE>().map_err(truncated)?;
    skip(&mut cursor, padding as usize)?;

    let compressed_size = cursor.read_i32::<LE>().map_err(truncated)?;
    let width = cursor.read_i32::<LE>().map_err(truncated)?;
    let height = cursor.read_i32::<LE>().map_err(truncated)?;
    let _bit_depth = cursor.read_u8().map_err(truncated)?;
    let _format_version = cursor.read_u8().map_err(truncated)?;
    let padding = cursor.read_u8().map_err(truncated)?;
    let _compression = cursor.read_u8().map_err(truncated)?;
    skip(&mut cursor, padding as usize)?;

    let (Ok(compressed_size), Ok(width), Ok(height)) = (
        usize::try_from(compressed_size),
        u32::try_from(width),
        u32::try_from(height),
    ) else {
        return Err(Error::CorruptTexture(format!(
            "negative field: size {}, {}x{}",
            compressed_size, width, height
        )));
    };

    let start = 3 + cursor.position() as usize;
    let payload = start
        .checked_add(compressed_size)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| {
            Error::CorruptTexture(format!(
                "payload of {} bytes at {} exceeds {} byte file",
                compressed_size,
                start,
                data.len()
            ))
        })?;

    let expected = buffer_len(width, height)?;
    if expected > payload.len().saturating_mul(MAX_LZ4_RATIO).saturating_add(16) {
        return Err(Error::CorruptTexture(format!(
            "{}x{} cannot come from {} compressed bytes",
            width, height, compressed_size
        )));
    }

    let mut pixels = Lz4Block
        .decompress(payload, expected)
        .map_err(|e| Error::CorruptTexture(e.to_string()))?;
    swap_red_blue(&mut pixels);

    Texture::new(width, height, pixels)
}

fn skip(cursor: &mut Cursor<&[u8]>, count: usize) -> Result<()> {
    let mut sink = vec![0u8; count];
    cursor
        .read_exact(&mut sink)
        .map_err(|_| Error::CorruptTexture(format!("truncated {}-byte padding chunk", count)))
}
