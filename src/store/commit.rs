//! Parser for commit objects.
//!
//! Extracts the structural references reachability needs: the root tree id
//! and the parent commit ids. Author, committer, and message bytes are
//! skipped without validation.
//!
//! # Commit Payload Format
//! ```text
//! tree <hex-id>\n
//! parent <hex-id>\n   (zero or more)
//! <remaining headers and message, ignored>
//! ```
//!
//! # Parsing Assumptions
//! - The `tree` header is first; `parent` headers immediately follow it.
//! - Header parsing stops at the first line that is neither, so message
//!   bodies are never scanned.
//!
//! # Complexity
//! - O(header size), not O(commit size).
//! - Allocation is bounded by parent count.

use memchr::memchr;

use super::api::StoreError;
use super::object_id::{IdFormat, ObjectId};

/// Structural references parsed out of a commit payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRefs {
    /// Root tree of the snapshot.
    pub tree: ObjectId,
    /// Parent commits, oldest-first as stored (empty for root commits).
    pub parents: Vec<ObjectId>,
}

/// Parses the tree and parent headers from a commit payload.
///
/// # Errors
/// Returns `StoreError::Corrupt` when the tree header is missing or any
/// header id fails hex validation for the given format.
pub fn parse_commit(payload: &[u8], format: IdFormat) -> Result<CommitRefs, StoreError> {
    let mut rest = payload;

    let tree_line = take_line(&mut rest).ok_or_else(|| StoreError::corrupt("empty commit"))?;
    let tree_hex = tree_line
        .strip_prefix(b"tree ")
        .ok_or_else(|| StoreError::corrupt("commit missing tree header"))?;
    let tree = parse_header_id(tree_hex, format)?;

    let mut parents = Vec::new();
    while let Some(line) = peek_line(rest) {
        let Some(parent_hex) = line.strip_prefix(b"parent ") else {
            break;
        };
        parents.push(parse_header_id(parent_hex, format)?);
        take_line(&mut rest);
    }

    Ok(CommitRefs { tree, parents })
}

fn parse_header_id(hex: &[u8], format: IdFormat) -> Result<ObjectId, StoreError> {
    if hex.len() != format.hex_len() as usize {
        return Err(StoreError::corrupt("commit header id has wrong length"));
    }
    ObjectId::from_hex(hex).ok_or_else(|| StoreError::corrupt("commit header id is not hex"))
}

/// Returns the next line without consuming it, or `None` at end of input.
fn peek_line(data: &[u8]) -> Option<&[u8]> {
    if data.is_empty() {
        return None;
    }
    match memchr(b'\n', data) {
        Some(nl) => Some(&data[..nl]),
        None => Some(data),
    }
}

/// Consumes and returns the next line, excluding its terminator.
fn take_line<'a>(data: &mut &'a [u8]) -> Option<&'a [u8]> {
    if data.is_empty() {
        return None;
    }
    match memchr(b'\n', data) {
        Some(nl) => {
            let line = &data[..nl];
            *data = &data[nl + 1..];
            Some(line)
        }
        None => {
            let line = *data;
            *data = &data[data.len()..];
            Some(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_payload(tree: &ObjectId, parents: &[ObjectId]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"tree ");
        out.extend_from_slice(tree.to_hex().as_bytes());
        out.push(b'\n');
        for p in parents {
            out.extend_from_slice(b"parent ");
            out.extend_from_slice(p.to_hex().as_bytes());
            out.push(b'\n');
        }
        out.extend_from_slice(b"author a <a@example> 0 +0000\n");
        out.extend_from_slice(b"committer a <a@example> 0 +0000\n\nsnapshot\n");
        out
    }

    #[test]
    fn parses_root_commit() {
        let tree = ObjectId::sha1([0x42; 20]);
        let parsed = parse_commit(&commit_payload(&tree, &[]), IdFormat::Sha1).unwrap();
        assert_eq!(parsed.tree, tree);
        assert!(parsed.parents.is_empty());
    }

    #[test]
    fn parses_merge_commit_parents_in_order() {
        let tree = ObjectId::sha1([0x42; 20]);
        let p1 = ObjectId::sha1([0x01; 20]);
        let p2 = ObjectId::sha1([0x02; 20]);
        let parsed = parse_commit(&commit_payload(&tree, &[p1, p2]), IdFormat::Sha1).unwrap();
        assert_eq!(parsed.parents, vec![p1, p2]);
    }

    #[test]
    fn rejects_missing_tree_header() {
        let err = parse_commit(b"parent 00\n", IdFormat::Sha1).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn rejects_truncated_tree_id() {
        let err = parse_commit(b"tree abcd\n", IdFormat::Sha1).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn rejects_non_hex_parent() {
        let tree = ObjectId::sha1([0x42; 20]);
        let mut payload = Vec::new();
        payload.extend_from_slice(b"tree ");
        payload.extend_from_slice(tree.to_hex().as_bytes());
        payload.push(b'\n');
        payload.extend_from_slice(b"parent ");
        payload.extend_from_slice(&[b'z'; 40]);
        payload.push(b'\n');
        let err = parse_commit(&payload, IdFormat::Sha1).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn header_scan_stops_before_message() {
        let tree = ObjectId::sha1([0x42; 20]);
        let mut payload = commit_payload(&tree, &[]);
        payload.extend_from_slice(b"parent not-really-a-header\n");
        // Trailing garbage after the header block is never inspected.
        let parsed = parse_commit(&payload, IdFormat::Sha1).unwrap();
        assert!(parsed.parents.is_empty());
    }
}
