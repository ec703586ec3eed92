//! Core CLI definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use super::texture::TextureCommand;

#[derive(Parser)]
#[command(name = "eastward")]
#[command(about = "Eastward game data extractor", long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Metadata source: a config container (config.g) or a directory holding
    /// asset_index, script_library and texture_index
    #[arg(short, long)]
    pub metadata: Option<PathBuf>,

    /// Container file or directory of containers (repeatable; defaults to the configured game dir)
    #[arg(short, long = "archive")]
    pub archives: Vec<PathBuf>,

    /// Loose-file root consulted for archives that are not loaded
    #[arg(long, env = "EASTWARD_FALLBACK_ROOT")]
    pub fallback_root: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only resolve assets whose name matches one of these globs
    #[arg(short, long)]
    pub select: Vec<String>,

    /// List matching asset names without extracting
    #[arg(short, long)]
    pub list: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve assets through the metadata index and export them
    #[command(visible_alias = "x")]
    Extract(ExtractArgs),

    /// Dump raw container entries to disk
    #[command(visible_alias = "u")]
    Unpack {
        /// Container files or directories of containers
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Build a container from a directory tree
    #[command(visible_alias = "p")]
    Pack {
        /// Directory whose files become entries
        input: PathBuf,

        /// Archive name (defaults to the directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Output container path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the entries of a container
    #[command(visible_alias = "l")]
    List {
        /// Container file
        input: PathBuf,
    },

    /// HMG texture conversion
    #[command(visible_alias = "t")]
    Texture {
        #[command(subcommand)]
        command: TextureCommand,
    },

    /// Print the tree of extractable asset names
    Tree {
        /// Metadata source (config.g or directory)
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Spaces between tree columns
        #[arg(long, default_value_t = 1)]
        indent: usize,
    },

    /// Count asset descriptors per type tag and file type
    Types {
        /// Metadata source (config.g or directory)
        #[arg(short, long)]
        metadata: Option<PathBuf>,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Directory holding the game's .g containers
        #[arg(long)]
        game_dir: Option<PathBuf>,

        /// Default loose-file fallback root
        #[arg(long)]
        fallback_root: Option<PathBuf>,

        /// Default output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}
