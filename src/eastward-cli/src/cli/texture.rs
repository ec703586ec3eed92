//! Texture subcommands

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum TextureCommand {
    /// Decode an HMG texture to PNG
    Decode {
        /// Input .hmg file
        input: PathBuf,

        /// Output PNG path (defaults to the input with a .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encode an image as an HMG texture
    Encode {
        /// Input image (PNG)
        input: PathBuf,

        /// Output .hmg path (defaults to the input with a .hmg extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Treat source rows as bottom-up and flip them on import
        #[arg(long)]
        bottom_up: bool,
    },
}
