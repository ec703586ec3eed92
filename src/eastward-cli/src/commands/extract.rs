//! Extraction command handler
//!
//! Loads metadata and containers, resolves the selected assets and writes
//! them under the output directory.

use anyhow::Result;
use eastward::{Archive, Metadata, Resolver, Vfs};
use std::path::{Path, PathBuf};

use super::{find_containers, load_metadata, progress_bar};
use crate::cli::ExtractArgs;
use crate::config::Config;

/// Outcome of one extraction run
#[derive(Debug, Default, PartialEq, Eq)]
struct Report {
    selected: usize,
    resolved: usize,
    failed: usize,
    files: usize,
    unwritten: usize,
}

/// Handle the extract command
pub fn handle(config: &Config, args: ExtractArgs) -> Result<()> {
    let source = config.metadata_source(args.metadata)?;
    let metadata = load_metadata(&source)?;

    let mut vfs = Vfs::new();
    vfs.set_fallback_root(config.fallback_root(args.fallback_root));

    let names = select(&metadata, &args.select);
    if args.list {
        for name in &names {
            println!("{}", name);
        }
        eprintln!("{} of {} assets selected", names.len(), metadata.assets.len());
        return Ok(());
    }

    let containers = find_containers(&config.archive_sources(args.archives))?;
    let output = config.output_dir(args.output);
    let report = run(metadata, vfs, &containers, &names, &output)?;

    eprintln!();
    eprintln!("Extraction complete:");
    eprintln!("  Selected: {}", report.selected);
    eprintln!("  Resolved: {}", report.resolved);
    eprintln!("  Failed:   {}", report.failed);
    eprintln!("  Files:    {} written to {}", report.files, output.display());
    if report.unwritten > 0 {
        eprintln!("  {} assets could not be written (see log)", report.unwritten);
    }

    Ok(())
}

/// Asset names matching any glob, in name order; no globs selects everything
fn select(metadata: &Metadata, patterns: &[String]) -> Vec<String> {
    metadata
        .assets
        .names()
        .filter(|name| {
            patterns.is_empty()
                || patterns
                    .iter()
                    .any(|pattern| glob_match::glob_match(pattern, name))
        })
        .map(str::to_owned)
        .collect()
}

fn run(
    metadata: Metadata,
    mut vfs: Vfs,
    containers: &[PathBuf],
    names: &[String],
    output: &Path,
) -> Result<Report> {
    for path in containers {
        match Archive::open(path) {
            Ok(archive) => {
                tracing::debug!(archive = archive.name(), entries = archive.len(), "loaded");
                vfs.load_archive(archive);
            }
            Err(e) => {
                tracing::warn!(container = %path.display(), error = %e, "failed to load container");
            }
        }
    }
    tracing::info!(
        archives = vfs.loaded_archives().len(),
        fallback = ?vfs.fallback_root(),
        "virtual file system ready"
    );

    let mut resolver = Resolver::new(metadata, vfs);
    let pb = progress_bar(names.len())?;

    let mut resolved = 0usize;
    for name in names {
        pb.set_message(name.clone());
        if resolver.resolve(name).is_some() {
            resolved += 1;
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let mut failed = 0usize;
    for (name, message) in resolver.failures() {
        tracing::warn!(asset = name, error = message, "failed to resolve");
        failed += 1;
    }

    let summary = resolver.export_all(output);

    Ok(Report {
        selected: names.len(),
        resolved,
        failed,
        files: summary.files,
        unwritten: summary.failed,
    })
}
