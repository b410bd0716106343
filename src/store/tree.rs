//! Tree entry parsing.
//!
//! Parses raw tree payloads (decompressed, no entry framing beyond the
//! format below) into entries, streaming without per-entry allocation.
//!
//! # Tree Payload Format
//!
//! Zero or more entries, each:
//! ```text
//! <mode> SP <name> NUL <id>
//! ```
//!
//! - `<mode>`: ASCII octal digits (e.g. "100644", "40000")
//! - `<name>`: entry name bytes (non-empty, no slashes, no NUL)
//! - `<id>`: raw id bytes (20 or 32 depending on store format)
//!
//! # Chunked Files
//!
//! Large files are stored as a subtree of fixed-size chunk blobs; the
//! entry pointing at such a subtree carries a mangled name (a chunk
//! suffix). For reachability the entry is an ordinary tree edge - the
//! suffix only matters when displaying paths, via [`demangle_name`].
//!
//! # Iterator Behavior
//!
//! The iterator is fused: after returning an error, subsequent calls to
//! `next_entry` return `Ok(None)`. A truncated trailing entry is treated
//! as corruption.

use super::api::StoreError;
use super::object_id::ObjectId;

/// Mode mask selecting the entry type bits.
const MODE_TYPE_MASK: u32 = 0o170000;
/// Type bits for a subtree entry.
const MODE_TREE: u32 = 0o040000;

/// Suffix marking a subtree that encodes chunks of one logical file.
const CHUNKED_SUFFIX: &[u8] = b".vchunk";
/// Suffix escaping a real name that collides with the chunk suffix.
const LITERAL_SUFFIX: &[u8] = b".vlit";

/// Display classification of an entry name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameStyle {
    /// Ordinary entry.
    Plain,
    /// Subtree holding the chunks of a single logical file.
    Chunked,
}

/// Strips chunk mangling from an entry name for display.
///
/// Reachability never consults this; chunked subtrees are walked exactly
/// like ordinary trees.
#[must_use]
pub fn demangle_name(name: &[u8]) -> (&[u8], NameStyle) {
    if let Some(stripped) = name.strip_suffix(CHUNKED_SUFFIX) {
        (stripped, NameStyle::Chunked)
    } else if let Some(stripped) = name.strip_suffix(LITERAL_SUFFIX) {
        (stripped, NameStyle::Plain)
    } else {
        (name, NameStyle::Plain)
    }
}

/// A parsed tree entry (zero-copy reference into the tree payload).
#[derive(Clone, Copy, Debug)]
pub struct TreeEntry<'a> {
    /// Raw mode value.
    pub mode: u32,
    /// Entry name, non-empty and slash-free, still mangled.
    pub name: &'a [u8],
    /// Child object id.
    pub id: ObjectId,
}

impl TreeEntry<'_> {
    /// Returns true if this entry points at a subtree.
    #[inline]
    #[must_use]
    pub const fn is_tree(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_TREE
    }
}

/// Streaming iterator over tree entries.
#[derive(Debug)]
pub struct TreeEntryIter<'a> {
    data: &'a [u8],
    id_len: usize,
    failed: bool,
}

impl<'a> TreeEntryIter<'a> {
    /// Creates an iterator over a complete tree payload.
    #[must_use]
    pub fn new(data: &'a [u8], id_len: u8) -> Self {
        Self {
            data,
            id_len: id_len as usize,
            failed: false,
        }
    }

    /// Parses the next entry.
    ///
    /// Returns `Ok(None)` at end of payload, and after any error.
    ///
    /// # Errors
    /// `StoreError::Corrupt` on malformed mode, name, or truncated id.
    pub fn next_entry(&mut self) -> Result<Option<TreeEntry<'a>>, StoreError> {
        if self.failed || self.data.is_empty() {
            return Ok(None);
        }
        match self.parse_one() {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    fn parse_one(&mut self) -> Result<TreeEntry<'a>, StoreError> {
        let sp = self
            .data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| StoreError::corrupt("tree entry missing mode terminator"))?;
        let mode = parse_octal(&self.data[..sp])?;

        let rest = &self.data[sp + 1..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| StoreError::corrupt("tree entry missing name terminator"))?;
        let name = &rest[..nul];
        if name.is_empty() {
            return Err(StoreError::corrupt("tree entry has empty name"));
        }
        if name.contains(&b'/') {
            return Err(StoreError::corrupt("tree entry name contains slash"));
        }

        let id_start = nul + 1;
        let id_end = id_start + self.id_len;
        if rest.len() < id_end {
            return Err(StoreError::corrupt("tree entry id truncated"));
        }
        let id = ObjectId::from_slice(&rest[id_start..id_end]);

        self.data = &rest[id_end..];
        Ok(TreeEntry { mode, name, id })
    }
}

fn parse_octal(digits: &[u8]) -> Result<u32, StoreError> {
    if digits.is_empty() {
        return Err(StoreError::corrupt("tree entry has empty mode"));
    }
    let mut mode = 0u32;
    for &b in digits {
        if !(b'0'..=b'7').contains(&b) {
            return Err(StoreError::corrupt("tree entry mode is not octal"));
        }
        mode = mode
            .checked_mul(8)
            .and_then(|m| m.checked_add(u32::from(b - b'0')))
            .ok_or_else(|| StoreError::corrupt("tree entry mode overflows"))?;
    }
    Ok(mode)
}

/// Encodes one tree entry; test fixtures and the save path share this.
pub fn encode_entry(out: &mut Vec<u8>, mode: u32, name: &[u8], id: &ObjectId) {
    out.extend_from_slice(format!("{mode:o}").as_bytes());
    out.push(b' ');
    out.extend_from_slice(name);
    out.push(0);
    out.extend_from_slice(id.as_slice());
}
