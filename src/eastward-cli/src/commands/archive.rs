//! Container command handlers (unpack, pack, list)

use anyhow::{Context, Result};
use eastward::Archive;
use std::path::{Path, PathBuf};

use super::{find_containers, progress_bar};

/// Dump the raw entries of every container under `output`
pub fn unpack(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let containers = find_containers(inputs)?;
    if containers.is_empty() {
        anyhow::bail!("No .g containers found");
    }

    let pb = progress_bar(containers.len())?;
    let mut total = 0usize;
    let mut failed = 0usize;

    for path in &containers {
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        match Archive::open(path).and_then(|archive| archive.extract_to(output)) {
            Ok(count) => total += count,
            Err(e) => {
                tracing::warn!(container = %path.display(), error = %e, "failed to unpack");
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    eprintln!(
        "Unpacked {} entries from {} containers to {}",
        total,
        containers.len() - failed,
        output.display()
    );
    if failed > 0 {
        eprintln!("{} containers failed (see log)", failed);
    }

    Ok(())
}

/// Build a container from every file below `input`
pub fn pack(input: &Path, name: Option<&str>, output: &Path) -> Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Cannot derive an archive name; pass --name")?,
    };

    let archive = build_archive(input, &name)?;
    archive
        .write_to_file(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!(
        "Packed {} entries into {} as '{}'",
        archive.len(),
        output.display(),
        name
    );
    Ok(())
}

fn build_archive(input: &Path, name: &str) -> Result<Archive> {
    if !input.is_dir() {
        anyhow::bail!("Input is not a directory: {}", input.display());
    }

    let mut archive = Archive::new(name);
    for entry in walkdir::WalkDir::new(input)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(input)?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let data = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        archive.insert(&relative, data)?;
    }

    Ok(archive)
}

/// Print each entry's virtual path and size
pub fn list(input: &Path) -> Result<()> {
    let archive =
        Archive::open(input).with_context(|| format!("Failed to open {}", input.display()))?;

    for entry in archive.entries() {
        println!("{:>10}  {}", entry.data.len(), entry.path);
    }
    eprintln!("{} entries", archive.len());

    Ok(())
}
