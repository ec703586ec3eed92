//! CLI argument definitions for eastward
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;
mod texture;

pub use core::{Cli, Commands, ExtractArgs};
pub use texture::TextureCommand;
