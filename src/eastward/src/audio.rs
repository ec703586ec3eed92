//! Sound bank string enumeration
//!
//! Banks are opened by a native audio runtime that is not part of this crate.
//! Anything able to answer the two queries below can be listed; the raw
//! helpers cover the buffer conventions such runtimes use.

use memchr::memchr;
use uuid::Uuid;

use crate::Result;

/// Path buffer size handed to the runtime per string query
pub const PATH_BUFFER_SIZE: usize = 256;

/// One string table row of a bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankString {
    pub id: Uuid,
    pub path: String,
}

impl BankString {
    /// Build from a raw little-endian GUID and a NUL-padded path buffer
    pub fn from_raw(guid: [u8; 16], path: &[u8]) -> Self {
        Self {
            id: Uuid::from_bytes_le(guid),
            path: read_nul_terminated(path),
        }
    }
}

/// String table queries a loaded bank answers
pub trait SoundBank {
    fn string_count(&self) -> Result<usize>;

    fn string_info(&self, index: usize) -> Result<BankString>;
}

/// Decode UTF-8 up to the first NUL (or the whole buffer), lossily
pub fn read_nul_terminated(buffer: &[u8]) -> String {
    let end = memchr(0, buffer).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

/// Every string in a bank, in index order
pub fn list_strings(bank: &dyn SoundBank) -> Result<Vec<BankString>> {
    let count = bank.string_count()?;
    (0..count).map(|index| bank.string_info(index)).collect()
}
