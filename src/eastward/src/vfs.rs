//! Virtual file system over loaded containers
//!
//! A virtual path is `"{archive}/{rest}"`. Lookups go to the loaded container
//! named by the first segment; when that archive is not loaded, the optional
//! fallback root is consulted at `{root}/{archive}/{rest}`.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eastward_archive::Archive;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Loaded containers plus an optional on-disk root
#[derive(Debug, Default)]
pub struct Vfs {
    archives: HashMap<String, Archive>,
    fallback_root: Option<PathBuf>,
    reads: Cell<usize>,
}

/// First segment of a virtual path
pub fn archive_name(virtual_path: &str) -> &str {
    virtual_path
        .split_once('/')
        .map_or(virtual_path, |(archive, _)| archive)
}

/// Logical child name of a directory member
///
/// Members live at `"{archive}/{id}/{child}"`; the archive and the one-segment
/// id are dropped. Shorter paths yield their last segment.
pub fn child_name(member_path: &str) -> &str {
    let mut segments = member_path.splitn(3, '/');
    match (segments.next(), segments.next(), segments.next()) {
        (_, _, Some(child)) => child,
        (_, Some(last), None) => last,
        (first, None, None) => first.unwrap_or(member_path),
    }
}

impl Vfs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback_root(root: impl Into<PathBuf>) -> Self {
        Self {
            fallback_root: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn set_fallback_root(&mut self, root: Option<PathBuf>) {
        self.fallback_root = root;
    }

    pub fn fallback_root(&self) -> Option<&Path> {
        self.fallback_root.as_deref()
    }

    /// Register a container, returning any archive it replaced
    pub fn load_archive(&mut self, archive: Archive) -> Option<Archive> {
        tracing::debug!(archive = archive.name(), entries = archive.len(), "load archive");
        self.archives.insert(archive.name().to_string(), archive)
    }

    pub fn unload_archive(&mut self, name: &str) -> Option<Archive> {
        let archive = self.archives.remove(name);
        if archive.is_some() {
            tracing::debug!(archive = name, "unload archive");
        }
        archive
    }

    pub fn unload_all(&mut self) {
        tracing::debug!(count = self.archives.len(), "unload all archives");
        self.archives.clear();
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.archives.contains_key(name)
    }

    /// Names of loaded archives, sorted
    pub fn loaded_archives(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.archives.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn archive(&self, name: &str) -> Option<&Archive> {
        self.archives.get(name)
    }

    /// Number of file and directory reads served so far
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    /// Read one file
    pub fn read_file(&self, virtual_path: &str) -> Result<Vec<u8>> {
        self.reads.set(self.reads.get() + 1);
        let name = archive_name(virtual_path);

        if let Some(archive) = self.archives.get(name) {
            return archive
                .get(virtual_path)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| Error::EntryNotFound(virtual_path.to_string()));
        }

        match self.disk_path(virtual_path) {
            Some(path) if path.is_file() => Ok(std::fs::read(path)?),
            _ => Err(Error::ArchiveNotLoaded(name.to_string())),
        }
    }

    /// Read every file under a directory prefix, as `(virtual path, bytes)`
    ///
    /// Archive members come back in table order; disk members in sorted
    /// depth-first order. Prefix matching respects segment boundaries.
    pub fn read_dir(&self, virtual_path: &str) -> Result<Vec<(String, Vec<u8>)>> {
        self.reads.set(self.reads.get() + 1);
        let name = archive_name(virtual_path);
        let prefix = format!("{}/", virtual_path.trim_end_matches('/'));

        if let Some(archive) = self.archives.get(name) {
            return Ok(archive
                .entries()
                .iter()
                .filter(|entry| entry.path.starts_with(&prefix))
                .map(|entry| (entry.path.clone(), entry.data.clone()))
                .collect());
        }

        match self.disk_path(virtual_path) {
            Some(dir) if dir.is_dir() => read_disk_dir(&dir, &prefix),
            _ => Err(Error::ArchiveNotLoaded(name.to_string())),
        }
    }

    /// Disk location of a virtual path; rejects parent-directory segments
    fn disk_path(&self, virtual_path: &str) -> Option<PathBuf> {
        let root = self.fallback_root.as_ref()?;
        if virtual_path.split('/').any(|segment| segment == "..") {
            return None;
        }
        Some(root.join(virtual_path.trim_start_matches('/')))
    }
}

fn read_disk_dir(dir: &Path, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
    let mut members = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let relative: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        let data = std::fs::read(entry.path())?;
        members.push((format!("{}{}", prefix, relative.join("/")), data));
    }
    Ok(members)
}
