//! Display tree of materialisable asset names

use std::collections::BTreeMap;
use std::fmt;

use crate::metadata::{AssetDescriptor, Metadata};
use crate::resolver::{is_late_bound, strategy, Strategy};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    File,
    Directory(BTreeMap<String, Node>),
}

impl Node {
    fn marker(&self) -> &'static str {
        match self {
            Node::File => "📄",
            Node::Directory(children) if children.is_empty() => "📁",
            Node::Directory(_) => "📂",
        }
    }
}

/// Slash-separated names arranged as a directory tree
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    root: BTreeMap<String, Node>,
    files: usize,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree of every asset the resolver could produce on its own
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mut tree = Self::new();
        for descriptor in metadata.assets.iter() {
            if is_standalone(metadata, descriptor) {
                tree.insert(&descriptor.name);
            }
        }
        tree
    }

    /// Add a name; a file standing where a directory is needed becomes one
    pub fn insert(&mut self, name: &str) {
        let segments: Vec<_> = name.split('/').filter(|s| !s.is_empty()).collect();
        let Some((leaf, dirs)) = segments.split_last() else {
            return;
        };

        let mut level = &mut self.root;
        for dir in dirs {
            let node = level
                .entry((*dir).to_string())
                .or_insert_with(|| Node::Directory(BTreeMap::new()));
            if *node == Node::File {
                *node = Node::Directory(BTreeMap::new());
                self.files -= 1;
            }
            let Node::Directory(children) = node else {
                return;
            };
            level = children;
        }

        if !level.contains_key(*leaf) {
            level.insert((*leaf).to_string(), Node::File);
            self.files += 1;
        }
    }

    /// Number of file leaves
    pub fn len(&self) -> usize {
        self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files == 0
    }

    /// Draw the tree with `indent` spaces between connector columns
    pub fn render(&self, indent: usize) -> String {
        let mut out = String::new();
        out.push_str(if self.root.is_empty() { "📁" } else { "📂" });
        out.push_str("root\n");
        render_level(&mut out, &self.root, "", indent);
        out
    }
}

impl fmt::Display for FileTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(1))
    }
}

fn render_level(out: &mut String, level: &BTreeMap<String, Node>, prefix: &str, indent: usize) {
    let count = level.len();
    for (i, (name, node)) in level.iter().enumerate() {
        let last = i + 1 == count;
        out.push_str(prefix);
        out.push(if last { '└' } else { '├' });
        out.push_str(node.marker());
        out.push_str(name);
        out.push('\n');

        if let Node::Directory(children) = node {
            let mut next = prefix.to_string();
            if last {
                next.push_str(&" ".repeat(indent + 1));
            } else {
                next.push('│');
                next.push_str(&" ".repeat(indent));
            }
            render_level(out, children, &next, indent);
        }
    }
}

/// Mirrors the resolver's dispatch without touching any archive
fn is_standalone(metadata: &Metadata, descriptor: &AssetDescriptor) -> bool {
    match strategy(&descriptor.asset_type) {
        Strategy::Texture if !descriptor.has_object_files() => {
            metadata.textures.atlas_for(&descriptor.name).is_some()
        }
        Strategy::Texture => !is_late_bound(descriptor),
        Strategy::Script => true,
        other => other.is_materialised() && descriptor.has_object_files(),
    }
}
