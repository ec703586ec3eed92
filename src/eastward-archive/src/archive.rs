//! Container (`.g`) reading and writing
//!
//! The entry table is parsed in full before any payload is touched; payload
//! offsets are absolute and need not follow table order.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use memchr::memchr;

use crate::compression::{Codec, ZstdFrame};
use crate::{Error, Result, ARCHIVE_MAGIC, FLAG_ZSTD};

/// Fixed-width fields following each entry name
const ENTRY_FIELDS_SIZE: usize = 4 * 4;

/// Magic plus entry count
const PREAMBLE_SIZE: usize = 8;

/// One decompressed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Virtual path, `"{archive}/{relative name}"`
    pub path: String,
    pub data: Vec<u8>,
}

/// Raw entry table record
#[derive(Debug, Clone)]
struct TableRecord {
    name: String,
    offset: i32,
    flag: i32,
    decompressed_size: i32,
    compressed_size: i32,
}

/// A fully decoded container
///
/// Immutable once read; entry order is table order.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    name: String,
    entries: Vec<Entry>,
    lookup: HashMap<String, usize>,
}

/// Check if data starts with the container magic
pub fn is_archive(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ARCHIVE_MAGIC.to_le_bytes()
}

impl Archive {
    /// Create an empty archive
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Build an archive from `(relative name, bytes)` pairs
    pub fn from_entries<I, S>(name: impl Into<String>, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let mut archive = Self::new(name);
        for (relative, data) in entries {
            archive.insert(relative.as_ref(), data)?;
        }
        Ok(archive)
    }

    /// Open a container file; the archive name is the file stem
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let data = std::fs::read(path)?;
        Self::read(name, &data)
    }

    /// Parse a container byte stream
    pub fn read(name: impl Into<String>, data: &[u8]) -> Result<Self> {
        let name = name.into();
        let table = read_table(&name, data)?;

        let codec = ZstdFrame::default();
        let mut archive = Self::new(name);
        archive.entries.reserve(table.len());

        for record in &table {
            let payload = read_payload(&archive.name, data, record, &codec)?;
            archive.insert(&record.name, payload)?;
        }

        tracing::debug!(
            archive = %archive.name,
            entries = archive.entries.len(),
            "read container"
        );

        Ok(archive)
    }

    /// Archive name (the first segment of every virtual path)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Virtual path for a relative entry name
    pub fn virtual_path(&self, relative: &str) -> String {
        format!("{}/{}", self.name, relative)
    }

    /// Strip the archive prefix from a virtual path
    pub fn relative_name<'a>(&self, virtual_path: &'a str) -> Option<&'a str> {
        virtual_path
            .strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }

    /// Add an entry under `"{archive}/{relative}"`
    pub fn insert(&mut self, relative: &str, data: Vec<u8>) -> Result<()> {
        let path = self.virtual_path(relative);
        if self.lookup.contains_key(&path) {
            return Err(Error::corrupt(
                &self.name,
                format!("duplicate entry '{}'", path),
            ));
        }
        self.lookup.insert(path.clone(), self.entries.len());
        self.entries.push(Entry { path, data });
        Ok(())
    }

    /// Look up an entry by virtual path
    pub fn get(&self, virtual_path: &str) -> Option<&[u8]> {
        self.lookup
            .get(virtual_path)
            .map(|&i| self.entries[i].data.as_slice())
    }

    pub fn contains(&self, virtual_path: &str) -> bool {
        self.lookup.contains_key(virtual_path)
    }

    /// Entries in table order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to container bytes, zstd-compressing every entry
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Write the container to a stream
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let codec = ZstdFrame::default();

        let mut relatives = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let relative = self.relative_name(&entry.path).ok_or_else(|| {
                Error::corrupt(&self.name, format!("entry '{}' outside archive", entry.path))
            })?;
            relatives.push(relative);
        }

        let table_size: usize = PREAMBLE_SIZE
            + relatives
                .iter()
                .map(|r| r.len() + 1 + ENTRY_FIELDS_SIZE)
                .sum::<usize>();

        let mut table = Vec::with_capacity(table_size);
        let mut payload = Vec::new();

        table.write_i32::<LE>(ARCHIVE_MAGIC)?;
        table.write_i32::<LE>(to_i32(&self.name, self.entries.len(), "entry count")?)?;

        for (entry, relative) in self.entries.iter().zip(&relatives) {
            let compressed = codec.compress(&entry.data)?;
            let offset = table_size + payload.len();

            table.write_all(relative.as_bytes())?;
            table.write_u8(0)?;
            table.write_i32::<LE>(to_i32(&self.name, offset, "offset")?)?;
            table.write_i32::<LE>(FLAG_ZSTD)?;
            table.write_i32::<LE>(to_i32(&self.name, entry.data.len(), "size")?)?;
            table.write_i32::<LE>(to_i32(&self.name, compressed.len(), "size")?)?;

            payload.extend_from_slice(&compressed);
        }

        debug_assert_eq!(table.len(), table_size);

        writer.write_all(&table)?;
        writer.write_all(&payload)?;
        Ok(())
    }

    /// Write the container to a file, creating parent directories
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Dump every entry to `dir/{virtual path}`
    ///
    /// Parent and root segments in entry names are dropped, so nothing is
    /// written outside `dir`.
    pub fn extract_to<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        for entry in &self.entries {
            let out_path = join_under(dir, &entry.path);
            if out_path == dir {
                return Err(Error::corrupt(
                    &self.name,
                    format!("entry '{}' has no usable file name", entry.path),
                ));
            }
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out_path, &entry.data)?;
        }
        Ok(self.entries.len())
    }
}

/// Join a slash-separated name under `root`, keeping only normal segments
///
/// `..`, `.`, root and prefix components are dropped, so the result never
/// leaves `root`.
pub fn join_under(root: &Path, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in Path::new(name).components() {
        if let Component::Normal(segment) = component {
            path.push(segment);
        }
    }
    path
}

fn to_i32(archive: &str, value: usize, what: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::corrupt(archive, format!("{} {} exceeds i32 range", what, value)))
}

fn to_usize(archive: &str, value: i32, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::corrupt(archive, format!("negative {} {}", what, value)))
}

/// Parse the magic, count and entry table
fn read_table(archive: &str, data: &[u8]) -> Result<Vec<TableRecord>> {
    let truncated = |_: std::io::Error| Error::corrupt(archive, "truncated entry table");
    let mut cursor = Cursor::new(data);

    let magic = cursor.read_i32::<LE>().map_err(truncated)?;
    if magic != ARCHIVE_MAGIC {
        return Err(Error::corrupt(
            archive,
            format!("bad magic {} (expected {})", magic, ARCHIVE_MAGIC),
        ));
    }

    let count = cursor.read_i32::<LE>().map_err(truncated)?;
    let count = to_usize(archive, count, "entry count")?;

    // Every record takes at least a NUL plus the fixed fields
    if count > data.len() / (1 + ENTRY_FIELDS_SIZE) {
        return Err(Error::corrupt(
            archive,
            format!("entry count {} exceeds stream size", count),
        ));
    }

    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
        let start = cursor.position() as usize;
        let len = memchr(0, &data[start..])
            .ok_or_else(|| Error::corrupt(archive, "unterminated entry name"))?;
        let name = std::str::from_utf8(&data[start..start + len])
            .map_err(|_| Error::corrupt(archive, "entry name is not UTF-8"))?
            .to_string();
        cursor.set_position((start + len + 1) as u64);

        table.push(TableRecord {
            name,
            offset: cursor.read_i32::<LE>().map_err(truncated)?,
            flag: cursor.read_i32::<LE>().map_err(truncated)?,
            decompressed_size: cursor.read_i32::<LE>().map_err(truncated)?,
            compressed_size: cursor.read_i32::<LE>().map_err(truncated)?,
        });
    }

    Ok(table)
}

/// Slice out and, if flagged, decompress one entry payload
fn read_payload(
    archive: &str,
    data: &[u8],
    record: &TableRecord,
    codec: &dyn Codec,
) -> Result<Vec<u8>> {
    let offset = to_usize(archive, record.offset, "offset")?;
    let compressed_size = to_usize(archive, record.compressed_size, "compressed size")?;
    let decompressed_size = to_usize(archive, record.decompressed_size, "decompressed size")?;

    let end = offset
        .checked_add(compressed_size)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            Error::corrupt(
                archive,
                format!(
                    "entry '{}' payload {}+{} past end of stream ({})",
                    record.name,
                    offset,
                    compressed_size,
                    data.len()
                ),
            )
        })?;

    // Stored and compressed entries alike never yield more than the bound
    let bound = codec.compress_bound(decompressed_size);
    let payload = &data[offset..end.min(offset.saturating_add(bound))];

    if record.flag != FLAG_ZSTD {
        return Ok(payload.to_vec());
    }

    codec
        .decompress(payload, decompressed_size)
        .map_err(|e| Error::corrupt(archive, format!("entry '{}': {}", record.name, e)))
}
