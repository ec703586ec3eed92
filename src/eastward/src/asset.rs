//! Resolved assets
//!
//! Leaves carry payload bytes (or a decoded raster); packages only compose
//! named children.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use eastward_archive::{join_under, Texture};

use crate::{Error, Result};

/// UTF-8 payload kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    bytes: Vec<u8>,
}

impl Text {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// String view; invalid sequences are replaced
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Named children, exported in key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    children: BTreeMap<String, Asset>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, child)` pairs; names must be unique
    pub fn from_children<I, S>(children: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Asset)>,
        S: Into<String>,
    {
        let mut package = Self::new();
        for (name, child) in children {
            package.attach_child(name, child)?;
        }
        Ok(package)
    }

    /// Append a child
    ///
    /// This is the only mutation a package allows after construction. The
    /// resolver uses it to hang a late-bound atlas texture on its parent.
    pub fn attach_child(&mut self, name: impl Into<String>, child: Asset) -> Result<()> {
        let name = name.into();
        if self.children.contains_key(&name) {
            return Err(Error::DuplicateChild(name));
        }
        self.children.insert(name, child);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Asset)> {
        self.children.iter().map(|(name, child)| (name.as_str(), child))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A resolved asset node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Binary(Vec<u8>),
    Text(Text),
    Texture(Texture),
    Package(Package),
}

impl Asset {
    pub fn text(bytes: Vec<u8>) -> Self {
        Asset::Text(Text::new(bytes))
    }

    /// Raw payload of a byte leaf
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Asset::Binary(data) => Some(data),
            Asset::Text(text) => Some(text.as_bytes()),
            Asset::Texture(_) | Asset::Package(_) => None,
        }
    }

    pub fn as_package(&self) -> Option<&Package> {
        match self {
            Asset::Package(package) => Some(package),
            _ => None,
        }
    }

    pub fn as_package_mut(&mut self) -> Option<&mut Package> {
        match self {
            Asset::Package(package) => Some(package),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<&Texture> {
        match self {
            Asset::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Asset::Binary(_) => "binary",
            Asset::Text(_) => "text",
            Asset::Texture(_) => "texture",
            Asset::Package(_) => "package",
        }
    }

    /// Number of files [`Asset::save_to`] writes
    pub fn leaf_count(&self) -> usize {
        match self {
            Asset::Package(package) => package.children.values().map(Asset::leaf_count).sum(),
            _ => 1,
        }
    }

    /// Write this asset under `path`
    ///
    /// Byte leaves are written verbatim and textures as PNG. Packages become
    /// a directory with one entry per child. Returns the number of files
    /// written.
    pub fn save_to(&self, path: &Path) -> Result<usize> {
        match self {
            Asset::Binary(data) => write_file(path, data),
            Asset::Text(text) => write_file(path, text.as_bytes()),
            Asset::Texture(texture) => {
                prepare_parent(path)?;
                texture.save_png(path)?;
                Ok(1)
            }
            Asset::Package(package) => {
                fs::create_dir_all(path)?;
                let mut written = 0;
                for (name, child) in &package.children {
                    written += child.save_to(&join_under(path, name))?;
                }
                Ok(written)
            }
        }
    }
}

fn prepare_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_file(path: &Path, data: &[u8]) -> Result<usize> {
    prepare_parent(path)?;
    fs::write(path, data)?;
    Ok(1)
}
