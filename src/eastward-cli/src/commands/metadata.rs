//! Metadata inspection handlers (tree, types)

use anyhow::Result;
use eastward::{FileTree, Metadata};
use std::path::Path;

use super::load_metadata;

/// Print the tree of standalone asset names
pub fn tree(source: &Path, indent: usize) -> Result<()> {
    let metadata = load_metadata(source)?;
    let tree = FileTree::from_metadata(&metadata);

    print!("{}", tree.render(indent));
    eprintln!("{} assets", tree.len());
    Ok(())
}

/// Print descriptor counts per type tag and file type
pub fn types(source: &Path) -> Result<()> {
    let metadata = load_metadata(source)?;
    print!("{}", census_table(&metadata));
    eprintln!("{} descriptors", metadata.assets.len());
    Ok(())
}

fn census_table(metadata: &Metadata) -> String {
    let census = metadata.assets.type_census();
    let width = census
        .keys()
        .map(|(tag, _)| tag.len())
        .max()
        .unwrap_or(0);

    census
        .iter()
        .map(|((tag, file_type), count)| {
            format!("{:<width$}  {:<9}  {}\n", tag, file_type.to_string(), count)
        })
        .collect()
}
