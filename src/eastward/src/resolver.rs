//! Asset resolution engine
//!
//! Dispatches on each descriptor's type tag through a static strategy table,
//! pulls the referenced virtual files out of the [`Vfs`] and assembles
//! [`Asset`]s. Results are memoised per resolver.
//!
//! Resolution is lenient. An unloaded archive leaves the asset unresolved
//! without a log line; any other failure is logged against the asset name and
//! also leaves it unresolved. Neither is cached, so loading more archives and
//! resolving again can still succeed.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use eastward_archive::{decode_texture, join_under, Archive};

use crate::asset::{Asset, Package};
use crate::atlas::Atlas;
use crate::metadata::{AssetDescriptor, FileType, Metadata};
use crate::vfs::{child_name, Vfs};
use crate::{Error, Result};

/// Name suffix of virtual textures that belong to their parent asset
pub const ATLAS_TEXTURE_SUFFIX: &str = "_texture";

/// Child name a late-bound texture takes on its parent package
pub const ATLAS_CHILD: &str = "atlas";

/// How a fetched payload is wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Binary,
    Text,
    /// HMG bytes, decoded
    Texture,
}

/// Per-member leaf kind for directory packages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classify {
    /// Every member is text
    Text,
    /// `.hmg` members are textures, the rest text
    HmgTexture,
    /// `.png` members are binary, the rest text
    PngBinary,
}

impl Classify {
    pub fn kind(self, child: &str) -> LeafKind {
        match self {
            Classify::HmgTexture if child.ends_with(".hmg") => LeafKind::Texture,
            Classify::PngBinary if child.ends_with(".png") => LeafKind::Binary,
            _ => LeafKind::Text,
        }
    }
}

/// Resolution behaviour for one type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Consumed through a sibling; never materialised alone
    Skip,
    /// One role fetched as one leaf
    Leaf { role: &'static str, kind: LeafKind },
    /// Fixed package of `(child, role, kind)`
    Fixed(&'static [(&'static str, &'static str, LeafKind)]),
    /// Package of every member under a directory role
    Directory {
        role: &'static str,
        classify: Classify,
    },
    /// Directory of text members for directory scenes, else one scene group
    Scene,
    /// Compiled bytecode located through the script library
    Script,
    /// Pixmap, implicit atlas sprite, or late-bound parent texture
    Texture,
    /// Unrecognised tag
    Unknown,
}

impl Strategy {
    /// Whether the tag can ever produce a standalone asset
    pub fn is_materialised(self) -> bool {
        !matches!(self, Strategy::Skip | Strategy::Unknown)
    }
}

const NAMED_TILESET_PACK: &[(&str, &str, LeafKind)] = &[
    ("atlas", "atlas", LeafKind::Binary),
    ("def", "def", LeafKind::Text),
];

const MSPRITE: &[(&str, &str, LeafKind)] = &[("def", "def", LeafKind::Text)];

const SCENE_GROUP: &[(&str, &str, LeafKind)] = &[("default.scene_group", "def", LeafKind::Text)];

const fn leaf(role: &'static str, kind: LeafKind) -> Strategy {
    Strategy::Leaf { role, kind }
}

/// Strategy for a type tag
pub fn strategy(tag: &str) -> Strategy {
    use LeafKind::{Binary, Text};

    match tag {
        "folder" | "file" => Strategy::Skip,
        "deck2d.mquad" | "deck2d.mtileset" | "deck2d.quad" | "deck2d.quads"
        | "deck2d.stretchpatch" | "deck2d.tileset" | "deck2d.quad_array" => Strategy::Skip,
        "texture_pack" | "texture_processor" | "named_tileset" => Strategy::Skip,
        "fs_project" | "fs_event" | "fs_folder" => Strategy::Skip,

        "named_tileset_pack" => Strategy::Fixed(NAMED_TILESET_PACK),
        "msprite" => Strategy::Fixed(MSPRITE),
        "deck_pack" | "deck_pack_raw" => Strategy::Directory {
            role: "export",
            classify: Classify::HmgTexture,
        },
        "locale_pack" => Strategy::Directory {
            role: "data",
            classify: Classify::Text,
        },
        "mesh" => Strategy::Directory {
            role: "mesh",
            classify: Classify::PngBinary,
        },
        "scene" => Strategy::Scene,

        "font_ttf" => leaf("font", Binary),
        "font_bmfont" => leaf("font", Text),
        "shader_script" | "glsl" => leaf("src", Text),
        "data_json" | "data_csv" | "data_xls" | "animator_data" | "text" | "code_tileset"
        | "asset_map" | "multi_texture" | "tb_scheme" => leaf("data", Text),
        "raw" | "movie" => leaf("data", Binary),
        "sq_script" => leaf("data", Text),
        "proto" => leaf("def", Text),
        "effect" | "fsm_scheme" | "bt_script" | "material" | "physics_body_def"
        | "physics_material" | "scene_portal_graph" | "quest_scheme" | "stylesheet"
        | "prefab" | "story_graph" | "render_target" | "ui_style" | "deck2d" => {
            leaf("def", Text)
        }
        "com_script" => leaf("script", Text),
        "lut_texture" => leaf("texture", Binary),

        "lua" => Strategy::Script,
        "texture" => Strategy::Texture,

        _ => Strategy::Unknown,
    }
}

/// Parent asset of a late-bound texture (`dirname` of the name)
pub fn parent_name(asset_name: &str) -> Option<&str> {
    asset_name
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

/// Texture whose payload surfaces only through its parent
pub fn is_late_bound(descriptor: &AssetDescriptor) -> bool {
    descriptor.file_type == FileType::Virtual
        && descriptor.name.ends_with(ATLAS_TEXTURE_SUFFIX)
        && descriptor.has_object_files()
}

/// Cached result
#[derive(Debug)]
enum Slot {
    Resolved(Asset),
    /// Definitively absent; resolving again would do no work
    Absent,
}

/// Result of one resolution attempt
enum Resolution {
    Asset(Asset),
    Absent,
    /// Nothing cached; a later attempt may succeed
    Unavailable,
}

/// Files written by [`Resolver::export_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub assets: usize,
    pub files: usize,
    /// Assets whose write failed; logged and skipped
    pub failed: usize,
}

/// Resolution engine for one extraction run
pub struct Resolver {
    metadata: Metadata,
    vfs: Vfs,
    cache: BTreeMap<String, Slot>,
    atlases: BTreeMap<String, Atlas>,
    failures: BTreeMap<String, String>,
}

impl Resolver {
    pub fn new(metadata: Metadata, vfs: Vfs) -> Self {
        Self {
            metadata,
            vfs,
            cache: BTreeMap::new(),
            atlases: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    /// Register a container; cached results are kept
    pub fn load_archive(&mut self, archive: Archive) -> Option<Archive> {
        self.vfs.load_archive(archive)
    }

    /// Drop a container; assets already resolved from it stay cached
    pub fn unload_archive(&mut self, name: &str) -> Option<Archive> {
        self.vfs.unload_archive(name)
    }

    pub fn unload_all(&mut self) {
        self.vfs.unload_all();
    }

    /// Resolve one asset by name
    ///
    /// `None` covers assets that are absent by design as well as ones that
    /// could not be materialised right now.
    pub fn resolve(&mut self, name: &str) -> Option<&Asset> {
        if !self.cache.contains_key(name) {
            let slot = match self.materialise(name) {
                Resolution::Asset(asset) => Slot::Resolved(asset),
                Resolution::Absent => Slot::Absent,
                Resolution::Unavailable => return None,
            };
            self.failures.remove(name);
            self.cache.insert(name.to_string(), slot);
        }

        match self.cache.get(name) {
            Some(Slot::Resolved(asset)) => Some(asset),
            _ => None,
        }
    }

    /// Resolve every indexed asset in name order; returns how many resolved
    pub fn resolve_all(&mut self) -> usize {
        let names: Vec<String> = self.metadata.assets.names().map(str::to_owned).collect();
        let resolved = names
            .iter()
            .filter(|name| self.resolve(name).is_some())
            .count();

        tracing::info!(
            total = names.len(),
            resolved,
            failed = self.failures.len(),
            "resolved asset index"
        );
        resolved
    }

    /// Whether a result (asset or known absence) is cached for `name`
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Cached assets in name order
    pub fn resolved(&self) -> impl Iterator<Item = (&str, &Asset)> {
        self.cache.iter().filter_map(|(name, slot)| match slot {
            Slot::Resolved(asset) => Some((name.as_str(), asset)),
            Slot::Absent => None,
        })
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved().count()
    }

    /// Assets whose last attempt failed with a logged error, with the message
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.failures
            .iter()
            .map(|(name, message)| (name.as_str(), message.as_str()))
    }

    /// Drop every cached asset and decoded atlas
    pub fn clear_cache(&mut self) {
        tracing::debug!(
            assets = self.cache.len(),
            atlases = self.atlases.len(),
            "clear cache"
        );
        self.cache.clear();
        self.atlases.clear();
        self.failures.clear();
    }

    /// Drop one cached result
    pub fn forget(&mut self, name: &str) -> bool {
        self.cache.remove(name).is_some()
    }

    /// Write every cached asset to `{output_root}/{asset name}`
    ///
    /// Parent and root segments in names are dropped. A failed write is
    /// logged against the asset and the rest are still exported.
    pub fn export_all(&self, output_root: &Path) -> ExportSummary {
        let mut summary = ExportSummary::default();
        for (name, asset) in self.resolved() {
            match asset.save_to(&join_under(output_root, name)) {
                Ok(files) => {
                    summary.files += files;
                    summary.assets += 1;
                }
                Err(e) => {
                    tracing::warn!(asset = name, error = %e, "failed to export");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            assets = summary.assets,
            files = summary.files,
            failed = summary.failed,
            output = %output_root.display(),
            "exported assets"
        );
        summary
    }

    fn materialise(&mut self, name: &str) -> Resolution {
        let Some(descriptor) = self.metadata.assets.get(name).cloned() else {
            return Resolution::Absent;
        };

        match self.build(&descriptor) {
            Ok(resolution) => resolution,
            Err(e) if e.is_absorbed() => {
                tracing::trace!(asset = name, error = %e, "asset unavailable");
                Resolution::Unavailable
            }
            Err(e) => {
                tracing::warn!(asset = name, error = %e, "failed to resolve asset");
                self.failures.insert(name.to_string(), e.to_string());
                Resolution::Unavailable
            }
        }
    }

    fn build(&mut self, descriptor: &AssetDescriptor) -> Result<Resolution> {
        let strategy = strategy(&descriptor.asset_type);
        if !descriptor.has_object_files()
            && !matches!(strategy, Strategy::Script | Strategy::Texture)
        {
            return Ok(Resolution::Absent);
        }

        let asset = match strategy {
            Strategy::Skip | Strategy::Unknown => return Ok(Resolution::Absent),
            Strategy::Leaf { role, kind } => self.leaf(descriptor.require(role)?, kind)?,
            Strategy::Fixed(children) => self.fixed(descriptor, children)?,
            Strategy::Directory { role, classify } => {
                self.directory(descriptor.require(role)?, classify)?
            }
            Strategy::Scene if descriptor.file_type == FileType::Directory => {
                self.directory(descriptor.require("def")?, Classify::Text)?
            }
            Strategy::Scene => self.fixed(descriptor, SCENE_GROUP)?,
            Strategy::Script => {
                let path = self
                    .metadata
                    .scripts
                    .get(&descriptor.name)
                    .ok_or_else(|| Error::MissingScript(descriptor.name.clone()))?;
                Asset::Binary(self.vfs.read_file(path)?)
            }
            Strategy::Texture => return self.texture(descriptor),
        };

        Ok(Resolution::Asset(asset))
    }

    fn leaf(&self, path: &str, kind: LeafKind) -> Result<Asset> {
        wrap(self.vfs.read_file(path)?, kind)
    }

    fn fixed(
        &self,
        descriptor: &AssetDescriptor,
        children: &[(&'static str, &'static str, LeafKind)],
    ) -> Result<Asset> {
        let children = children
            .iter()
            .map(|&(child, role, kind)| -> Result<(&'static str, Asset)> {
                Ok((child, self.leaf(descriptor.require(role)?, kind)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Asset::Package(Package::from_children(children)?))
    }

    fn directory(&self, path: &str, classify: Classify) -> Result<Asset> {
        let members = self.vfs.read_dir(path)?;
        let mut package = Package::new();
        for (member, data) in members {
            let name = child_name(&member);
            package.attach_child(name, wrap(data, classify.kind(name))?)?;
        }
        Ok(Asset::Package(package))
    }

    fn texture(&mut self, descriptor: &AssetDescriptor) -> Result<Resolution> {
        let name = descriptor.name.as_str();

        if !descriptor.has_object_files() {
            let Some(atlas_path) = self.metadata.textures.atlas_for(name) else {
                return Ok(Resolution::Absent);
            };
            let atlas = match self.atlases.entry(atlas_path.to_string()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let atlas = Atlas::load(&self.vfs, entry.key())?;
                    entry.insert(atlas)
                }
            };
            return Ok(Resolution::Asset(Asset::Binary(atlas.sprite(name)?.to_vec())));
        }

        if is_late_bound(descriptor) {
            return self.attach_to_parent(descriptor);
        }

        let texture = decode_texture(&self.vfs.read_file(descriptor.require("pixmap")?)?)?;
        Ok(Resolution::Asset(Asset::Texture(texture)))
    }

    /// Decode the pixmap and hang it on the parent package as `atlas`
    fn attach_to_parent(&mut self, descriptor: &AssetDescriptor) -> Result<Resolution> {
        let Some(parent) = parent_name(&descriptor.name) else {
            return Ok(Resolution::Absent);
        };

        if self.resolve(parent).is_none() {
            return Ok(if self.is_cached(parent) {
                Resolution::Absent
            } else {
                Resolution::Unavailable
            });
        }

        let texture = decode_texture(&self.vfs.read_file(descriptor.require("pixmap")?)?)?;
        if let Some(Slot::Resolved(asset)) = self.cache.get_mut(parent) {
            let kind = asset.kind();
            match asset.as_package_mut() {
                Some(package) => package.attach_child(ATLAS_CHILD, Asset::Texture(texture))?,
                None => tracing::warn!(
                    asset = %descriptor.name,
                    parent,
                    kind,
                    "parent is not a package"
                ),
            }
        }

        Ok(Resolution::Absent)
    }
}

fn wrap(data: Vec<u8>, kind: LeafKind) -> Result<Asset> {
    Ok(match kind {
        LeafKind::Binary => Asset::Binary(data),
        LeafKind::Text => Asset::text(data),
        LeafKind::Texture => Asset::Texture(decode_texture(&data)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::AssetIndex;
    use eastward_archive::{encode_texture, Texture};

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Texture {
        Texture::new(width, height, rgba.repeat((width * height) as usize)).unwrap()
    }

    fn hmg(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        encode_texture(&solid(width, height, rgba)).unwrap()
    }

    fn desc(name: &str, tag: &str, file_type: FileType, roles: &[(&str, &str)]) -> AssetDescriptor {
        roles.iter().fold(
            AssetDescriptor::new(name, tag, file_type),
            |d, (role, path)| d.with_object_file(*role, *path),
        )
    }

    fn resolver(descriptors: Vec<AssetDescriptor>, archives: Vec<Archive>) -> Resolver {
        let mut assets = AssetIndex::new();
        for descriptor in descriptors {
            assets.insert(descriptor);
        }
        let metadata = Metadata {
            assets,
            ..Metadata::default()
        };
        let mut vfs = Vfs::new();
        for archive in archives {
            vfs.load_archive(archive);
        }
        Resolver::new(metadata, vfs)
    }

    fn archive(name: &str, entries: &[(&str, &[u8])]) -> Archive {
        Archive::from_entries(name, entries.iter().map(|(path, data)| (*path, data.to_vec())))
            .unwrap()
    }

    #[test]
    fn test_strategy_table() {
        assert_eq!(strategy("folder"), Strategy::Skip);
        assert_eq!(strategy("deck2d.quads"), Strategy::Skip);
        assert_eq!(strategy("fs_event"), Strategy::Skip);
        assert_eq!(strategy("font_ttf"), leaf("font", LeafKind::Binary));
        assert_eq!(strategy("font_bmfont"), leaf("font", LeafKind::Text));
        assert_eq!(strategy("glsl"), leaf("src", LeafKind::Text));
        assert_eq!(strategy("movie"), leaf("data", LeafKind::Binary));
        assert_eq!(strategy("ui_style"), leaf("def", LeafKind::Text));
        assert_eq!(strategy("com_script"), leaf("script", LeafKind::Text));
        assert_eq!(strategy("lut_texture"), leaf("texture", LeafKind::Binary));
        assert_eq!(strategy("lua"), Strategy::Script);
        assert_eq!(strategy("texture"), Strategy::Texture);
        assert_eq!(strategy("scene"), Strategy::Scene);
        assert_eq!(strategy("brand_new_type"), Strategy::Unknown);
        assert!(matches!(
            strategy("deck_pack_raw"),
            Strategy::Directory { role: "export", classify: Classify::HmgTexture }
        ));
        assert!(!strategy("named_tileset").is_materialised());
        assert!(strategy("msprite").is_materialised());
    }

    #[test]
    fn test_classify() {
        assert_eq!(Classify::HmgTexture.kind("a/b.hmg"), LeafKind::Texture);
        assert_eq!(Classify::HmgTexture.kind("a/b.json"), LeafKind::Text);
        assert_eq!(Classify::PngBinary.kind("skin.png"), LeafKind::Binary);
        assert_eq!(Classify::Text.kind("skin.png"), LeafKind::Text);
    }

    #[test]
    fn test_parent_name() {
        assert_eq!(parent_name("chars/hero.msprite/hero_texture"), Some("chars/hero.msprite"));
        assert_eq!(parent_name("hero_texture"), None);
    }

    #[test]
    fn test_leaf_types() {
        let mut r = resolver(
            vec![
                desc("ui/font.ttf", "font_ttf", FileType::File, &[("font", "font/01/font.ttf")]),
                desc("fx/glow.glsl", "glsl", FileType::File, &[("src", "shader/02/glow.glsl")]),
            ],
            vec![
                archive("font", &[("01/font.ttf", &[0, 1, 0, 0])]),
                archive("shader", &[("02/glow.glsl", b"void main() {}")]),
            ],
        );

        assert_eq!(r.resolve("ui/font.ttf"), Some(&Asset::Binary(vec![0, 1, 0, 0])));
        let shader = r.resolve("fx/glow.glsl").unwrap();
        match shader {
            Asset::Text(text) => assert_eq!(text.as_str(), "void main() {}"),
            other => panic!("expected text, got {}", other.kind()),
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut r = resolver(
            vec![desc("data/items.json", "data_json", FileType::File, &[("data", "data/03/items.json")])],
            vec![archive("data", &[("03/items.json", b"[1, 2]")])],
        );

        let first = r.resolve("data/items.json").cloned();
        let reads = r.vfs().read_count();
        assert_eq!(reads, 1);

        let second = r.resolve("data/items.json").cloned();
        assert_eq!(first, second);
        assert!(first.is_some());
        assert_eq!(r.vfs().read_count(), reads);
    }

    #[test]
    fn test_no_object_files_is_absent() {
        let tags = ["data_json", "deck_pack", "scene", "font_ttf", "msprite", "mystery"];
        let descriptors = tags
            .iter()
            .map(|tag| desc(&format!("empty/{}", tag), tag, FileType::File, &[]))
            .collect();
        let mut r = resolver(descriptors, vec![]);

        for tag in tags {
            let name = format!("empty/{}", tag);
            assert!(r.resolve(&name).is_none());
            assert!(r.is_cached(&name), "{} should be known absent", tag);
        }
        assert_eq!(r.vfs().read_count(), 0);
    }

    #[test]
    fn test_unindexed_and_skipped_are_absent() {
        let mut r = resolver(
            vec![desc("deck/q", "deck2d.quad", FileType::File, &[("def", "deck/04/q")])],
            vec![archive("deck", &[("04/q", b"{}")])],
        );
        assert!(r.resolve("not/in/index").is_none());
        assert!(r.resolve("deck/q").is_none());
        assert!(r.is_cached("deck/q"));
        assert_eq!(r.vfs().read_count(), 0);
    }

    #[test]
    fn test_directory_pairing() {
        let sheet = hmg(2, 2, [9, 8, 7, 255]);
        let mut r = resolver(
            vec![desc("ui/hud.deck", "deck_pack", FileType::Directory, &[("export", "deck/ab12")])],
            vec![archive(
                "deck",
                &[
                    ("ab12/hud.json", b"{\"quads\": []}"),
                    ("ab12/tex/hud.hmg", &sheet),
                    ("ab12/notes.txt", b"n"),
                    ("ab123/stray.txt", b"x"),
                ],
            )],
        );

        let package = r.resolve("ui/hud.deck").unwrap().as_package().unwrap().clone();
        assert_eq!(package.len(), 3);
        let names: Vec<_> = package.children().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["hud.json", "notes.txt", "tex/hud.hmg"]);
        assert_eq!(
            package.get("tex/hud.hmg").and_then(Asset::as_texture),
            Some(&solid(2, 2, [9, 8, 7, 255]))
        );
        assert_eq!(package.get("notes.txt").and_then(Asset::bytes), Some(&b"n"[..]));
    }

    #[test]
    fn test_mesh_and_locale_packages() {
        let mut r = resolver(
            vec![
                desc("chars/hero.mesh", "mesh", FileType::Directory, &[("mesh", "mesh/m1")]),
                desc("locale/en", "locale_pack", FileType::Directory, &[("data", "locale/l1")]),
            ],
            vec![
                archive("mesh", &[("m1/hero.obj", b"v 0 0 0"), ("m1/skin.png", &[0x89, b'P'])]),
                archive("locale", &[("l1/en/ui.csv", b"k,v")]),
            ],
        );

        let mesh = r.resolve("chars/hero.mesh").unwrap().as_package().unwrap().clone();
        assert!(matches!(mesh.get("skin.png"), Some(Asset::Binary(_))));
        assert!(matches!(mesh.get("hero.obj"), Some(Asset::Text(_))));

        let locale = r.resolve("locale/en").unwrap().as_package().unwrap().clone();
        assert!(matches!(locale.get("en/ui.csv"), Some(Asset::Text(_))));
    }

    #[test]
    fn test_scene_shapes() {
        let mut r = resolver(
            vec![
                desc("scene/town", "scene", FileType::Directory, &[("def", "scene/s1")]),
                desc("scene/cave", "scene", FileType::File, &[("def", "scene/s2/cave.json")]),
            ],
            vec![archive(
                "scene",
                &[("s1/a.layer", b"a"), ("s1/b.layer", b"b"), ("s2/cave.json", b"{}")],
            )],
        );

        assert_eq!(r.resolve("scene/town").unwrap().as_package().unwrap().len(), 2);
        let cave = r.resolve("scene/cave").unwrap().as_package().unwrap();
        assert_eq!(cave.len(), 1);
        assert!(cave.get("default.scene_group").is_some());
    }

    #[test]
    fn test_fixed_packages() {
        let mut r = resolver(
            vec![
                desc(
                    "tiles/forest",
                    "named_tileset_pack",
                    FileType::File,
                    &[("atlas", "tile/t1/atlas.hmg"), ("def", "tile/t1/def.json")],
                ),
                desc("tiles/broken", "named_tileset_pack", FileType::File, &[("def", "tile/t1/def.json")]),
            ],
            vec![archive("tile", &[("t1/atlas.hmg", &[1, 2]), ("t1/def.json", b"{}")])],
        );

        let forest = r.resolve("tiles/forest").unwrap().as_package().unwrap();
        assert_eq!(forest.get("atlas"), Some(&Asset::Binary(vec![1, 2])));
        assert!(matches!(forest.get("def"), Some(Asset::Text(_))));

        assert!(r.resolve("tiles/broken").is_none());
        assert!(!r.is_cached("tiles/broken"));
        let failures: Vec<_> = r.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["tiles/broken"]);
    }

    #[test]
    fn test_lua_through_script_library() {
        let mut r = resolver(
            vec![
                desc("scripts/main.lua", "lua", FileType::File, &[]),
                desc("scripts/lost.lua", "lua", FileType::File, &[]),
            ],
            vec![archive("lua", &[("ab/main.luac", b"\x1bLua")])],
        );
        r.metadata.scripts.insert("scripts/main.lua", "lua/ab/main.luac");

        assert_eq!(r.resolve("scripts/main.lua"), Some(&Asset::Binary(b"\x1bLua".to_vec())));
        assert!(r.resolve("scripts/lost.lua").is_none());
        assert!(!r.is_cached("scripts/lost.lua"));
    }

    #[test]
    fn test_texture_without_files_or_atlas_is_absent() {
        let mut r = resolver(vec![desc("foo", "texture", FileType::File, &[])], vec![]);
        assert!(r.resolve("foo").is_none());
        assert!(r.is_cached("foo"));
    }

    #[test]
    fn test_pixmap_texture() {
        let mut r = resolver(
            vec![desc("ui/logo", "texture", FileType::File, &[("pixmap", "tex/p1/logo.hmg")])],
            vec![archive("tex", &[("p1/logo.hmg", &hmg(3, 1, [1, 2, 3, 4]))])],
        );
        assert_eq!(
            r.resolve("ui/logo").and_then(Asset::as_texture),
            Some(&solid(3, 1, [1, 2, 3, 4]))
        );
    }

    #[test]
    fn test_corrupt_texture_is_logged_not_cached() {
        let mut r = resolver(
            vec![desc("ui/bad", "texture", FileType::File, &[("pixmap", "tex/p1/bad.hmg")])],
            vec![archive("tex", &[("p1/bad.hmg", b"BMP...")])],
        );
        assert!(r.resolve("ui/bad").is_none());
        assert!(!r.is_cached("ui/bad"));
        assert_eq!(r.failures().count(), 1);
    }

    #[test]
    fn test_implicit_atlas_texture() {
        let mut sheet = solid(8, 8, [0, 0, 0, 255]);
        for y in 2..6 {
            for x in 4..8 {
                sheet.set_pixel(x, y, [200, 100, 50, 255]);
            }
        }
        let layout = br#"{
            "atlases": [{"name": "s0.hmg"}],
            "items": [
                {"name": "ui/icons/sword", "atlas": 0, "rect": [4, 2, 4, 4]},
                {"name": "ui/icons/shield", "atlas": 0, "rect": [0, 0, 2, 2]}
            ]
        }"#;
        let mut r = resolver(
            vec![
                desc("ui/icons/sword", "texture", FileType::File, &[]),
                desc("ui/icons/shield", "texture", FileType::File, &[]),
            ],
            vec![archive(
                "cache",
                &[("c1/atlas.json", layout), ("c1/s0.hmg", &encode_texture(&sheet).unwrap())],
            )],
        );
        r.metadata.textures.insert("ui/icons/sword", "cache/c1");
        r.metadata.textures.insert("ui/icons/shield", "cache/c1");

        let sword = r.resolve("ui/icons/sword").unwrap().bytes().unwrap().to_vec();
        assert_eq!(Texture::from_png(&sword).unwrap(), solid(4, 4, [200, 100, 50, 255]));

        assert!(r.resolve("ui/icons/shield").is_some());
        // Both sprites came from one directory read
        assert_eq!(r.vfs().read_count(), 1);
    }

    #[test]
    fn test_late_bound_texture_attaches_to_parent() {
        let mut r = resolver(
            vec![
                desc("chars/hero.msprite", "msprite", FileType::File, &[("def", "sprite/h1/def.json")]),
                desc(
                    "chars/hero.msprite/hero_texture",
                    "texture",
                    FileType::Virtual,
                    &[("pixmap", "sprite/h1/tex.hmg")],
                ),
            ],
            vec![archive(
                "sprite",
                &[("h1/def.json", b"{}"), ("h1/tex.hmg", &hmg(2, 2, [5, 5, 5, 5]))],
            )],
        );

        assert!(r.resolve("chars/hero.msprite/hero_texture").is_none());
        assert!(r.is_cached("chars/hero.msprite/hero_texture"));

        let parent = r.resolve("chars/hero.msprite").unwrap().as_package().unwrap();
        assert_eq!(parent.len(), 2);
        assert_eq!(
            parent.get(ATLAS_CHILD).and_then(Asset::as_texture),
            Some(&solid(2, 2, [5, 5, 5, 5]))
        );

        // Known absent: the attach does not run twice
        assert!(r.resolve("chars/hero.msprite/hero_texture").is_none());
        assert_eq!(r.resolve("chars/hero.msprite").unwrap().as_package().unwrap().len(), 2);
        assert_eq!(r.failures().count(), 0);
    }

    #[test]
    fn test_unloaded_archive_is_retried() {
        let mut r = resolver(
            vec![desc("data/a.txt", "text", FileType::File, &[("data", "data/05/a.txt")])],
            vec![],
        );

        assert!(r.resolve("data/a.txt").is_none());
        assert!(!r.is_cached("data/a.txt"));
        assert_eq!(r.failures().count(), 0);

        r.load_archive(archive("data", &[("05/a.txt", b"a")]));
        assert!(r.resolve("data/a.txt").is_some());
    }

    #[test]
    fn test_unload_keeps_cache_until_cleared() {
        let mut r = resolver(
            vec![desc("data/a.txt", "text", FileType::File, &[("data", "data/05/a.txt")])],
            vec![archive("data", &[("05/a.txt", b"a")])],
        );
        assert!(r.resolve("data/a.txt").is_some());

        r.unload_archive("data");
        assert!(r.resolve("data/a.txt").is_some());

        r.clear_cache();
        assert!(r.resolve("data/a.txt").is_none());
        assert_eq!(r.resolved_count(), 0);
    }

    #[test]
    fn test_forget() {
        let mut r = resolver(
            vec![desc("data/a.txt", "text", FileType::File, &[("data", "data/05/a.txt")])],
            vec![archive("data", &[("05/a.txt", b"a")])],
        );
        r.resolve("data/a.txt");
        assert!(r.forget("data/a.txt"));
        assert!(!r.forget("data/a.txt"));
        r.resolve("data/a.txt");
        assert_eq!(r.vfs().read_count(), 2);
    }

    #[test]
    fn test_disk_fallback_resolution() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("locale/l9/fr")).unwrap();
        std::fs::write(root.path().join("locale/l9/fr/ui.csv"), "k,v").unwrap();

        let mut assets = AssetIndex::new();
        assets.insert(desc("locale/fr", "locale_pack", FileType::Directory, &[("data", "locale/l9")]));
        let metadata = Metadata {
            assets,
            ..Metadata::default()
        };
        let mut r = Resolver::new(metadata, Vfs::with_fallback_root(root.path()));

        let package = r.resolve("locale/fr").unwrap().as_package().unwrap();
        assert_eq!(package.get("fr/ui.csv").and_then(Asset::bytes), Some(&b"k,v"[..]));
    }

    #[test]
    fn test_resolve_all_and_export() {
        let mut r = resolver(
            vec![
                desc("data/a.txt", "text", FileType::File, &[("data", "data/05/a.txt")]),
                desc("ui/logo", "texture", FileType::File, &[("pixmap", "data/05/logo.hmg")]),
                desc("deck/q", "deck2d.quad", FileType::File, &[("def", "data/05/a.txt")]),
                desc("scene/s", "scene", FileType::File, &[("def", "data/05/a.txt")]),
            ],
            vec![archive(
                "data",
                &[("05/a.txt", b"a"), ("05/logo.hmg", &hmg(1, 1, [1, 1, 1, 1]))],
            )],
        );

        assert_eq!(r.resolve_all(), 3);
        let names: Vec<_> = r.resolved().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["data/a.txt", "scene/s", "ui/logo"]);

        let out = tempfile::tempdir().unwrap();
        let summary = r.export_all(out.path());
        assert_eq!(
            summary,
            ExportSummary {
                assets: 3,
                files: 3,
                failed: 0
            }
        );
        assert_eq!(std::fs::read(out.path().join("data/a.txt")).unwrap(), b"a");
        assert!(out.path().join("scene/s/default.scene_group").is_file());
        let png = std::fs::read(out.path().join("ui/logo")).unwrap();
        assert_eq!(Texture::from_png(&png).unwrap(), solid(1, 1, [1, 1, 1, 1]));
    }

    fn late_bound_pair(parent: AssetDescriptor) -> Vec<AssetDescriptor> {
        let child = format!("{}/hero_texture", parent.name);
        vec![
            parent,
            desc(&child, "texture", FileType::Virtual, &[("pixmap", "sprite/h1/tex.hmg")]),
        ]
    }

    #[test]
    fn test_late_bound_texture_with_absent_parent() {
        let parent = desc("chars/hero.msprite", "msprite", FileType::File, &[]);
        let mut r = resolver(late_bound_pair(parent), vec![]);

        assert!(r.resolve("chars/hero.msprite/hero_texture").is_none());
        assert!(r.is_cached("chars/hero.msprite"));
        assert!(r.is_cached("chars/hero.msprite/hero_texture"));
        assert_eq!(r.vfs().read_count(), 0);
        assert_eq!(r.failures().count(), 0);
    }

    #[test]
    fn test_late_bound_texture_waits_for_parent_archive() {
        let parent = desc("chars/hero.msprite", "msprite", FileType::File, &[("def", "sprite/h1/def.json")]);
        let mut r = resolver(late_bound_pair(parent), vec![]);

        assert!(r.resolve("chars/hero.msprite/hero_texture").is_none());
        assert!(!r.is_cached("chars/hero.msprite"));
        assert!(!r.is_cached("chars/hero.msprite/hero_texture"));
        assert_eq!(r.failures().count(), 0);

        r.load_archive(archive(
            "sprite",
            &[("h1/def.json", b"{}"), ("h1/tex.hmg", &hmg(1, 1, [3, 3, 3, 3]))],
        ));
        assert!(r.resolve("chars/hero.msprite/hero_texture").is_none());
        assert!(r.is_cached("chars/hero.msprite/hero_texture"));

        let parent = r.resolve("chars/hero.msprite").unwrap().as_package().unwrap();
        assert_eq!(
            parent.get(ATLAS_CHILD).and_then(Asset::as_texture),
            Some(&solid(1, 1, [3, 3, 3, 3]))
        );
    }

    #[test]
    fn test_late_bound_texture_on_leaf_parent() {
        let parent = desc("sprite/hero.txt", "text", FileType::File, &[("data", "sprite/h1/def.json")]);
        let mut r = resolver(
            late_bound_pair(parent),
            vec![archive(
                "sprite",
                &[("h1/def.json", b"{}"), ("h1/tex.hmg", &hmg(1, 1, [3, 3, 3, 3]))],
            )],
        );

        assert!(r.resolve("sprite/hero.txt/hero_texture").is_none());
        assert!(r.is_cached("sprite/hero.txt/hero_texture"));
        assert!(matches!(r.resolve("sprite/hero.txt"), Some(Asset::Text(_))));
        assert_eq!(r.failures().count(), 0);
    }

    #[test]
    fn test_export_keeps_child_names_under_root() {
        let mut r = resolver(
            vec![desc("ui/hud.deck", "deck_pack", FileType::Directory, &[("export", "deck/ab12")])],
            vec![archive("deck", &[("ab12/x/../../../../../escaped.txt", b"e")])],
        );
        assert!(r.resolve("ui/hud.deck").is_some());

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let summary = r.export_all(&out);

        assert_eq!(summary.files, 1);
        assert_eq!(std::fs::read(out.join("ui/hud.deck/x/escaped.txt")).unwrap(), b"e");
        assert!(!dir.path().join("escaped.txt").exists());
        assert!(!out.join("escaped.txt").exists());
    }

    #[test]
    fn test_export_continues_after_failed_write() {
        let mut r = resolver(
            vec![
                desc("a", "text", FileType::File, &[("data", "data/05/a.txt")]),
                desc("a/b", "scene", FileType::File, &[("def", "data/05/a.txt")]),
                desc("z", "text", FileType::File, &[("data", "data/05/a.txt")]),
            ],
            vec![archive("data", &[("05/a.txt", b"a")])],
        );
        assert_eq!(r.resolve_all(), 3);

        // "a" is written as a file, so the package "a/b" cannot become a directory
        let out = tempfile::tempdir().unwrap();
        let summary = r.export_all(out.path());
        assert_eq!(
            summary,
            ExportSummary {
                assets: 2,
                files: 2,
                failed: 1
            }
        );
        assert_eq!(std::fs::read(out.path().join("z")).unwrap(), b"a");
    }
}
