//! Object kinds stored in the snapshot object database.
//!
//! The store holds exactly three kinds of object. The enum is closed and
//! matched exhaustively everywhere; a kind tag outside this set is treated
//! as store corruption at the decode boundary, so no downstream code needs
//! a fallback arm.

use std::fmt;

/// Kind of a stored object.
///
/// The discriminants are the on-disk kind tags in pack entries and are
/// stable.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Opaque content leaf (file data or a chunk of one).
    Blob = 1,
    /// Ordered directory of named children (blobs and trees).
    Tree = 2,
    /// Snapshot root: a tree id plus zero or more parent commit ids.
    Commit = 3,
}

impl ObjectKind {
    /// Decodes an on-disk kind tag.
    ///
    /// Returns `None` for tags outside the known set; callers surface that
    /// as corruption.
    #[inline]
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Blob),
            2 => Some(Self::Tree),
            3 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Returns the stable on-disk tag.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Returns the lowercase name used in logs and ref display.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
