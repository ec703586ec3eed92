//! Texture atlas compositor
//!
//! An atlas cache directory holds `atlas.json` plus the stitched HMG sheets it
//! names. Layout:
//!
//! ```json
//! {
//!   "atlases": [{"name": "sheet0.hmg"}],
//!   "items": [{"name": "ui/icons/sword", "atlas": 0, "rect": [x, y, w, h]}]
//! }
//! ```
//!
//! Sheets are decoded once when the atlas loads; sprites are cropped and
//! PNG-encoded on first request.

use std::collections::HashMap;

use eastward_archive::{decode_texture, Texture};
use serde::Deserialize;

use crate::vfs::{child_name, Vfs};
use crate::{Error, Result};

/// Layout document member name
pub const LAYOUT_NAME: &str = "atlas.json";

#[derive(Deserialize)]
struct Layout {
    #[serde(default)]
    atlases: Vec<SheetRef>,
    #[serde(default)]
    items: Vec<LayoutItem>,
}

#[derive(Deserialize)]
struct SheetRef {
    name: String,
}

#[derive(Deserialize)]
struct LayoutItem {
    name: String,
    atlas: usize,
    rect: [i64; 4],
}

/// Sprite placement within a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteRect {
    pub sheet: usize,
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// A loaded atlas cache directory
#[derive(Debug)]
pub struct Atlas {
    path: String,
    sheets: Vec<Texture>,
    items: HashMap<String, SpriteRect>,
    sprites: HashMap<String, Vec<u8>>,
}

impl Atlas {
    /// Load an atlas cache directory through the VFS
    pub fn load(vfs: &Vfs, path: &str) -> Result<Self> {
        let mut layout = None;
        let mut members = HashMap::new();
        for (member, data) in vfs.read_dir(path)? {
            let name = child_name(&member);
            if name == LAYOUT_NAME {
                layout = Some(data);
            } else {
                members.insert(name.to_string(), data);
            }
        }

        let layout = layout.ok_or_else(|| invalid(path, "missing atlas.json"))?;
        let atlas = Self::from_parts(path, &layout, &members)?;

        tracing::debug!(
            atlas = path,
            sheets = atlas.sheets.len(),
            sprites = atlas.items.len(),
            "loaded atlas"
        );
        Ok(atlas)
    }

    /// Build from a layout document and HMG sheets keyed by member name
    pub fn from_parts(path: &str, layout: &[u8], members: &HashMap<String, Vec<u8>>) -> Result<Self> {
        let layout: Layout =
            serde_json::from_slice(layout).map_err(|e| invalid(path, e.to_string()))?;

        let sheets = layout
            .atlases
            .iter()
            .map(|sheet| -> Result<Texture> {
                let data = members
                    .get(&sheet.name)
                    .ok_or_else(|| invalid(path, format!("missing sheet '{}'", sheet.name)))?;
                Ok(decode_texture(data)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut items = HashMap::with_capacity(layout.items.len());
        for item in layout.items {
            let [x, y, w, h] = item.rect;
            let (Ok(width), Ok(height)) = (u32::try_from(w), u32::try_from(h)) else {
                return Err(invalid(path, format!("bad rect for '{}'", item.name)));
            };
            if item.atlas >= sheets.len() {
                return Err(invalid(
                    path,
                    format!("'{}' references sheet {}", item.name, item.atlas),
                ));
            }
            items.insert(
                item.name.replace("\\/", "/"),
                SpriteRect {
                    sheet: item.atlas,
                    x,
                    y,
                    width,
                    height,
                },
            );
        }

        Ok(Self {
            path: path.to_string(),
            sheets,
            items,
            sprites: HashMap::new(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn contains(&self, sprite: &str) -> bool {
        self.items.contains_key(sprite)
    }

    pub fn sprite_names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn rect(&self, sprite: &str) -> Option<SpriteRect> {
        self.items.get(sprite).copied()
    }

    /// Cut a sprite out of its sheet
    pub fn crop(&self, sprite: &str) -> Result<Texture> {
        let rect = self.items.get(sprite).ok_or_else(|| Error::SpriteNotFound {
            atlas: self.path.clone(),
            sprite: sprite.to_string(),
        })?;
        let sheet = self
            .sheets
            .get(rect.sheet)
            .ok_or_else(|| invalid(&self.path, format!("no sheet {}", rect.sheet)))?;
        crop(sheet, rect)
    }

    /// PNG bytes of a sprite, cropped on first request
    pub fn sprite(&mut self, sprite: &str) -> Result<&[u8]> {
        if !self.sprites.contains_key(sprite) {
            let png = self.crop(sprite)?.to_png()?;
            self.sprites.insert(sprite.to_string(), png);
        }
        self.sprites
            .get(sprite)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::SpriteNotFound {
                atlas: self.path.clone(),
                sprite: sprite.to_string(),
            })
    }

    /// Sprites encoded so far
    pub fn cached_sprites(&self) -> usize {
        self.sprites.len()
    }
}

/// Nearest-neighbour copy of `rect` out of `sheet`; pixels past the sheet
/// edge stay transparent
pub fn crop(sheet: &Texture, rect: &SpriteRect) -> Result<Texture> {
    let mut out = Texture::blank(rect.width, rect.height)?;
    for dy in 0..rect.height {
        let Ok(sy) = u32::try_from(rect.y + i64::from(dy)) else {
            continue;
        };
        for dx in 0..rect.width {
            let Ok(sx) = u32::try_from(rect.x + i64::from(dx)) else {
                continue;
            };
            if let Some(px) = sheet.pixel(sx, sy) {
                out.set_pixel(dx, dy, px);
            }
        }
    }
    Ok(out)
}

fn invalid(atlas: &str, reason: impl Into<String>) -> Error {
    Error::InvalidLayout {
        atlas: atlas.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eastward_archive::{encode_texture, Archive};

    /// Every pixel distinct: (x, y, sheet, 255)
    fn sheet(width: u32, height: u32, tag: u8) -> Texture {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, tag, 255]);
            }
        }
        Texture::new(width, height, pixels).unwrap()
    }

    fn atlas_archive() -> Archive {
        let layout = br#"{
            "atlases": [{"name": "sheet0.hmg"}, {"name": "sheet1.hmg"}],
            "items": [
                {"name": "ui\\/icons\\/sword", "atlas": 0, "rect": [3, 2, 4, 4]},
                {"name": "ui/icons/shield", "atlas": 1, "rect": [0, 0, 2, 2]},
                {"name": "ui/edge", "atlas": 0, "rect": [6, 6, 4, 4]}
            ]
        }"#;
        Archive::from_entries(
            "cache",
            vec![
                ("a1/atlas.json", layout.to_vec()),
                ("a1/sheet0.hmg", encode_texture(&sheet(8, 8, 0)).unwrap()),
                ("a1/sheet1.hmg", encode_texture(&sheet(8, 8, 1)).unwrap()),
            ],
        )
        .unwrap()
    }

    fn load() -> Atlas {
        let mut vfs = Vfs::new();
        vfs.load_archive(atlas_archive());
        Atlas::load(&vfs, "cache/a1").unwrap()
    }

    #[test]
    fn test_crop_matches_source_block() {
        let atlas = load();
        assert_eq!(atlas.sheet_count(), 2);

        let source = sheet(8, 8, 0);
        let sprite = atlas.crop("ui/icons/sword").unwrap();
        assert_eq!((sprite.width(), sprite.height()), (4, 4));
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(sprite.pixel(x, y), source.pixel(x + 3, y + 2));
            }
        }
    }

    #[test]
    fn test_crop_uses_referenced_sheet() {
        let atlas = load();
        let sprite = atlas.crop("ui/icons/shield").unwrap();
        assert_eq!(sprite.pixel(1, 1), Some([1, 1, 1, 255]));
    }

    #[test]
    fn test_crop_past_edge_is_transparent() {
        let atlas = load();
        let sprite = atlas.crop("ui/edge").unwrap();
        assert_eq!(sprite.pixel(0, 0), Some([6, 6, 0, 255]));
        assert_eq!(sprite.pixel(3, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_sprite_png_is_memoised() {
        let mut atlas = load();
        let png = atlas.sprite("ui/icons/sword").unwrap().to_vec();
        assert_eq!(atlas.cached_sprites(), 1);

        let decoded = Texture::from_png(&png).unwrap();
        assert_eq!(decoded, atlas.crop("ui/icons/sword").unwrap());

        atlas.sprite("ui/icons/sword").unwrap();
        assert_eq!(atlas.cached_sprites(), 1);
    }

    #[test]
    fn test_unknown_sprite() {
        let mut atlas = load();
        assert!(matches!(
            atlas.sprite("ui/none"),
            Err(Error::SpriteNotFound { ref sprite, .. }) if sprite == "ui/none"
        ));
    }

    #[test]
    fn test_layout_errors() {
        let members = HashMap::new();
        assert!(matches!(
            Atlas::from_parts("cache/x", b"not json", &members),
            Err(Error::InvalidLayout { .. })
        ));
        assert!(matches!(
            Atlas::from_parts("cache/x", br#"{"atlases": [{"name": "gone.hmg"}]}"#, &members),
            Err(Error::InvalidLayout { .. })
        ));
        assert!(matches!(
            Atlas::from_parts(
                "cache/x",
                br#"{"items": [{"name": "a", "atlas": 0, "rect": [0, 0, 1, 1]}]}"#,
                &members
            ),
            Err(Error::InvalidLayout { .. })
        ));
    }

    #[test]
    fn test_missing_layout() {
        let mut vfs = Vfs::new();
        vfs.load_archive(Archive::from_entries("cache", vec![("a1/s.hmg", vec![0])]).unwrap());
        assert!(matches!(
            Atlas::load(&vfs, "cache/a1"),
            Err(Error::InvalidLayout { .. })
        ));
    }
}
