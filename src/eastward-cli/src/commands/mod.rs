//! Command handlers for eastward CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod archive;
pub mod configure;
pub mod extract;
pub mod metadata;
pub mod texture;

use anyhow::{Context, Result};
use eastward::{Archive, Metadata};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// Container file extension
pub const CONTAINER_EXTENSION: &str = "g";

/// Load metadata from a `config.g` container or an unpacked directory
pub fn load_metadata(source: &Path) -> Result<Metadata> {
    if source.is_dir() {
        return Metadata::from_dir(source)
            .with_context(|| format!("Failed to read metadata from {}", source.display()));
    }

    let archive = Archive::open(source)
        .with_context(|| format!("Failed to open {}", source.display()))?;
    Metadata::from_config_archive(&archive)
        .with_context(|| format!("Failed to read metadata from {}", source.display()))
}

/// Expand files and directories into container paths, sorted
pub fn find_containers(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut containers = Vec::new();

    for input in inputs {
        if input.is_file() {
            containers.push(input.clone());
        } else if input.is_dir() {
            let mut found: Vec<_> = walkdir::WalkDir::new(input)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|path| path.is_file() && is_container(path))
                .collect();
            found.sort();
            containers.extend(found);
        } else {
            anyhow::bail!("Input path does not exist: {}", input.display());
        }
    }

    Ok(containers)
}

fn is_container(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
}

/// Progress bar in the house style
pub fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
