//! Error types for garbage collection.
//!
//! Every error here is fatal to the run: GC chooses abort-without-deleting
//! over partial progress whenever the mark phase cannot be proven complete
//! or sweep I/O is at risk. There is no partial-commit state - a pack's
//! replacement is fully finalized before its source is removed, or the
//! source is left untouched.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::store::{ObjectId, StoreError};

/// Fatal failures of a garbage collection run.
#[derive(Debug)]
#[non_exhaustive]
pub enum GcError {
    /// Threshold or compression configuration is out of range.
    InvalidConfig { detail: &'static str },
    /// The store reported corruption or an unknown object kind.
    Repository(StoreError),
    /// An object referenced by the graph is missing from every pack.
    ///
    /// Liveness cannot be proven if the graph cannot be fully walked.
    MissingObject { id: ObjectId },
    /// File I/O failed while rewriting or deleting packs.
    Io { path: PathBuf, source: io::Error },
    /// Creating or mapping the live-set backing file failed.
    LiveSet(io::Error),
}

impl GcError {
    /// Wraps an I/O error with the path being operated on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for GcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { detail } => write!(f, "invalid gc configuration: {detail}"),
            Self::Repository(err) => write!(f, "repository error: {err}"),
            Self::MissingObject { id } => {
                write!(f, "object {id} is reachable but missing from the store")
            }
            Self::Io { path, source } => {
                write!(f, "gc I/O error on {}: {source}", path.display())
            }
            Self::LiveSet(err) => write!(f, "live-set backing file error: {err}"),
        }
    }
}

impl std::error::Error for GcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Repository(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::LiveSet(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for GcError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => Self::MissingObject { id },
            other => Self::Repository(other),
        }
    }
}
