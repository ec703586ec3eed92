//! Texture command handlers

use anyhow::{Context, Result};
use eastward_archive::{decode_texture, encode_texture, Texture};
use std::fs;
use std::path::{Path, PathBuf};

/// Decode an HMG file and write it as PNG
pub fn decode(input: &Path, output: Option<&Path>) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let texture =
        decode_texture(&data).with_context(|| format!("Failed to decode {}", input.display()))?;

    let output = output_path(input, output, "png");
    texture
        .save_png(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!(
        "Decoded {}x{} texture to {}",
        texture.width(),
        texture.height(),
        output.display()
    );
    Ok(())
}

/// Encode a PNG as an HMG file
pub fn encode(input: &Path, output: Option<&Path>, bottom_up: bool) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let mut texture =
        Texture::from_png(&data).with_context(|| format!("Failed to load {}", input.display()))?;

    if bottom_up {
        let (width, height) = (texture.width(), texture.height());
        texture = Texture::from_bottom_up(width, height, texture.into_pixels())?;
    }

    let output = output_path(input, output, "hmg");
    let encoded = encode_texture(&texture)?;
    fs::write(&output, &encoded)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!(
        "Encoded {}x{} texture to {} ({} bytes)",
        texture.width(),
        texture.height(),
        output.display(),
        encoded.len()
    );
    Ok(())
}

fn output_path(input: &Path, output: Option<&Path>, extension: &str) -> PathBuf {
    output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension(extension))
}
