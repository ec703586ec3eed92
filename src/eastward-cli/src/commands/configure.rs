//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up eastward CLI defaults.

use crate::config::Config;
use anyhow::Result;
use std::path::PathBuf;

/// Handle the configure command
///
/// Any given path replaces the stored one; with nothing given, usage is shown.
pub fn handle(
    game_dir: Option<PathBuf>,
    fallback_root: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    show: bool,
) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if apply(&mut config, game_dir, fallback_root, output_dir) {
        config.save()?;
        show_config(&config);
        if let Ok(path) = Config::config_path() {
            println!("Config saved to: {}", path.display());
        }
    } else {
        show_usage();
    }

    Ok(())
}

/// Merge given settings into `config`; returns whether anything changed
fn apply(
    config: &mut Config,
    game_dir: Option<PathBuf>,
    fallback_root: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> bool {
    let mut changed = false;
    for (slot, value) in [
        (&mut config.game_dir, game_dir),
        (&mut config.fallback_root, fallback_root),
        (&mut config.output_dir, output_dir),
    ] {
        if value.is_some() {
            *slot = value;
            changed = true;
        }
    }
    changed
}

fn show_config(config: &Config) {
    let show = |label: &str, value: &Option<PathBuf>| match value {
        Some(path) => println!("{}: {}", label, path.display()),
        None => println!("{}: (not set)", label),
    };
    show("Game directory", &config.game_dir);
    show("Fallback root", &config.fallback_root);
    show("Output directory", &config.output_dir);

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

fn show_usage() {
    println!("Usage: eastward configure --game-dir PATH [--fallback-root PATH] [--output-dir PATH]");
    println!("   or: eastward configure --show");
    println!();
    println!("Note: the game directory is the folder holding config.g and the other .g containers.");
}
