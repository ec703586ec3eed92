//! Metadata documents shipped in the `config` container
//!
//! - `asset_index`: one descriptor per logical asset
//! - `script_library`: compiled script lookup, keyed by asset name
//! - `texture_index`: implicit textures and the atlas cache holding them

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use eastward_archive::Archive;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

/// Storage shape of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileType {
    File,
    Directory,
    Virtual,
}

impl FileType {
    /// Parse an index tag (`f`, `d`, `v`); anything unrecognised is a plain file
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "d" | "directory" => FileType::Directory,
            "v" | "virtual" => FileType::Virtual,
            _ => FileType::File,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileType::File => "file",
            FileType::Directory => "directory",
            FileType::Virtual => "virtual",
        })
    }
}

/// One asset index record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub name: String,
    pub file_path: Option<String>,
    pub file_type: FileType,
    pub group_type: Option<String>,
    /// Role name (`def`, `pixmap`, `data`, ...) to virtual path
    pub object_files: BTreeMap<String, String>,
    /// Semantic type tag driving resolution
    pub asset_type: String,
}

impl AssetDescriptor {
    pub fn new(name: impl Into<String>, asset_type: impl Into<String>, file_type: FileType) -> Self {
        Self {
            name: name.into(),
            file_path: None,
            file_type,
            group_type: None,
            object_files: BTreeMap::new(),
            asset_type: asset_type.into(),
        }
    }

    /// Builder-style role assignment
    pub fn with_object_file(mut self, role: impl Into<String>, path: impl Into<String>) -> Self {
        self.object_files.insert(role.into(), path.into());
        self
    }

    pub fn object_file(&self, role: &str) -> Option<&str> {
        self.object_files.get(role).map(String::as_str)
    }

    /// Virtual path for `role`, or [`Error::MissingRole`]
    pub fn require(&self, role: &str) -> Result<&str> {
        self.object_file(role).ok_or_else(|| Error::MissingRole {
            asset: self.name.clone(),
            role: role.to_string(),
        })
    }

    pub fn has_object_files(&self) -> bool {
        !self.object_files.is_empty()
    }
}

/// Index record as it appears on disk
///
/// `filePath` is `false` for assets without a source file, and `objectFiles`
/// is serialised as `[]` when empty.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    #[serde(default)]
    file_path: Value,
    #[serde(default)]
    file_type: String,
    #[serde(default)]
    group_type: Value,
    #[serde(default)]
    object_files: Value,
    #[serde(rename = "type", default)]
    asset_type: String,
}

impl RawDescriptor {
    fn into_descriptor(self, name: String) -> AssetDescriptor {
        let object_files = match self.object_files {
            Value::Object(map) => map
                .into_iter()
                .filter_map(|(role, path)| match path {
                    Value::String(path) => Some((role, path)),
                    _ => None,
                })
                .collect(),
            _ => BTreeMap::new(),
        };

        AssetDescriptor {
            name,
            file_path: string_value(self.file_path),
            file_type: FileType::from_tag(&self.file_type),
            group_type: string_value(self.group_type),
            object_files,
            asset_type: self.asset_type,
        }
    }
}

fn string_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// All asset descriptors, keyed by asset name
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    assets: BTreeMap<String, AssetDescriptor>,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `asset_index` document
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawDescriptor> = serde_json::from_str(json)?;
        let assets = raw
            .into_iter()
            .map(|(name, raw)| {
                let descriptor = raw.into_descriptor(name.clone());
                (name, descriptor)
            })
            .collect();
        Ok(Self { assets })
    }

    /// Add or replace a descriptor
    pub fn insert(&mut self, descriptor: AssetDescriptor) {
        self.assets.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&AssetDescriptor> {
        self.assets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    /// Asset names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetDescriptor> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Count descriptors per `(type tag, file type)`
    pub fn type_census(&self) -> BTreeMap<(String, FileType), usize> {
        let mut census = BTreeMap::new();
        for descriptor in self.assets.values() {
            *census
                .entry((descriptor.asset_type.clone(), descriptor.file_type))
                .or_insert(0) += 1;
        }
        census
    }
}

/// Compiled script lookup: asset name to the virtual path of its bytecode
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    scripts: HashMap<String, String>,
}

impl ScriptLibrary {
    /// Parse the `script_library` document
    ///
    /// `source` and `export` are parallel tables sharing keys; each
    /// `source[key]` names the asset and `export[key]` locates its bytecode.
    pub fn from_json(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json)?;
        let export = root.get("export").and_then(Value::as_object);
        let source = root.get("source").and_then(Value::as_object);

        let mut scripts = HashMap::new();
        if let (Some(export), Some(source)) = (export, source) {
            for (key, name) in source {
                let (Some(name), Some(path)) =
                    (name.as_str(), export.get(key).and_then(Value::as_str))
                else {
                    continue;
                };
                scripts.insert(name.to_string(), path.to_string());
            }
        }

        Ok(Self { scripts })
    }

    pub fn insert(&mut self, asset_name: impl Into<String>, virtual_path: impl Into<String>) {
        self.scripts.insert(asset_name.into(), virtual_path.into());
    }

    pub fn get(&self, asset_name: &str) -> Option<&str> {
        self.scripts.get(asset_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

/// Implicit textures: texture asset name to atlas cache directory
#[derive(Debug, Clone, Default)]
pub struct TextureIndex {
    atlases: HashMap<String, String>,
}

impl TextureIndex {
    /// Parse the `texture_index` document
    ///
    /// Walks the group tree from `entry`. Groups with a non-null
    /// `atlasCachePath` claim every texture node listed in `textures`.
    pub fn from_json(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json)?;
        let mut index = Self::default();

        let (Some(nodes), Some(entry)) = (
            root.get("map").and_then(Value::as_object),
            root.get("entry").and_then(node_id),
        ) else {
            return Ok(index);
        };

        let mut pending = vec![entry];
        let mut visited = HashSet::new();

        while let Some(id) = pending.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(body) = nodes.get(&id).and_then(|node| node.get("body")) else {
                continue;
            };

            if let Some(groups) = body.get("groups").and_then(Value::as_array) {
                pending.extend(groups.iter().rev().filter_map(node_id));
            }

            let Some(atlas) = body.get("atlasCachePath").and_then(Value::as_str) else {
                continue;
            };
            let textures = body.get("textures").and_then(Value::as_array);
            for texture in textures.into_iter().flatten().filter_map(node_id) {
                let path = nodes
                    .get(&texture)
                    .and_then(|node| node.pointer("/body/path"))
                    .and_then(Value::as_str);
                if let Some(path) = path {
                    index
                        .atlases
                        .entry(path.to_string())
                        .or_insert_with(|| atlas.to_string());
                }
            }
        }

        Ok(index)
    }

    pub fn insert(&mut self, texture: impl Into<String>, atlas_path: impl Into<String>) {
        self.atlases.insert(texture.into(), atlas_path.into());
    }

    /// Atlas cache directory holding `texture`
    pub fn atlas_for(&self, texture: &str) -> Option<&str> {
        self.atlases.get(texture).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.atlases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atlases.is_empty()
    }
}

/// Node ids appear as strings or bare numbers
fn node_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The three metadata documents together
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub assets: AssetIndex,
    pub scripts: ScriptLibrary,
    pub textures: TextureIndex,
}

const ASSET_INDEX: &str = "asset_index";
const SCRIPT_LIBRARY: &str = "script_library";
const TEXTURE_INDEX: &str = "texture_index";

impl Metadata {
    /// Read the three documents from loose files
    pub fn from_files(
        asset_index: impl AsRef<Path>,
        script_library: impl AsRef<Path>,
        texture_index: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Self {
            assets: AssetIndex::from_json(&read_document(asset_index.as_ref())?)?,
            scripts: ScriptLibrary::from_json(&read_document(script_library.as_ref())?)?,
            textures: TextureIndex::from_json(&read_document(texture_index.as_ref())?)?,
        })
    }

    /// Read the documents from an unpacked `config` directory
    ///
    /// Each document may carry a `.json` extension.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Self::from_files(
            document_path(dir, ASSET_INDEX),
            document_path(dir, SCRIPT_LIBRARY),
            document_path(dir, TEXTURE_INDEX),
        )
    }

    /// Read the documents from a loaded `config` container
    pub fn from_config_archive(archive: &Archive) -> Result<Self> {
        let document = |name: &str| -> Result<String> {
            let path = archive.virtual_path(name);
            let data = archive.get(&path).ok_or(Error::MissingMetadata(path))?;
            Ok(String::from_utf8_lossy(data).into_owned())
        };

        Ok(Self {
            assets: AssetIndex::from_json(&document(ASSET_INDEX)?)?,
            scripts: ScriptLibrary::from_json(&document(SCRIPT_LIBRARY)?)?,
            textures: TextureIndex::from_json(&document(TEXTURE_INDEX)?)?,
        })
    }
}

fn document_path(dir: &Path, name: &str) -> PathBuf {
    let bare = dir.join(name);
    if bare.is_file() {
        return bare;
    }
    let json = dir.join(format!("{}.json", name));
    if json.is_file() {
        json
    } else {
        bare
    }
}

fn read_document(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::MissingMetadata(path.display().to_string()));
    }
    Ok(std::fs::read_to_string(path)?)
}
