//! Error types for the editing engine

use std::io;
use thiserror::Error;

/// Storage operation that failed, reported alongside the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Open,
    Read,
    Write,
    Close,
}

impl std::fmt::Display for IoOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the engine.
///
/// Capacity refusals on single-character edits and navigation at a boundary are
/// not errors: those operations return `false` and the session raises an alert.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("{name}: not found")]
    NotFound { name: String },

    #[error("{name}: {op} failed: {source}")]
    Io {
        name: String,
        op: IoOp,
        #[source]
        source: io::Error,
    },

    #[error("{name}: short write ({written} of {expected} bytes)")]
    ShortWrite {
        name: String,
        written: usize,
        expected: usize,
    },

    #[error("{name} already exists; save again to overwrite")]
    OverwriteConfirmationRequired { name: String },

    #[error("no free segment left for overflow")]
    OutOfSegments,

    #[error("no segment with id {0}")]
    InvalidSegment(usize),

    #[error("at most {max} segment slots are supported, {requested} requested")]
    TooManySegments { requested: usize, max: usize },

    #[error("no segment slots are available")]
    NoSegments,

    #[error("no document name")]
    Unnamed,

    #[error("nothing is selected")]
    NoSelection,
}

impl EditorError {
    /// Wrap an I/O error from the storage stream, mapping `NotFound` on open to
    /// its own variant.
    pub fn io(name: &str, op: IoOp, source: io::Error) -> Self {
        if op == IoOp::Open && source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound {
                name: name.to_string(),
            };
        }
        Self::Io {
            name: name.to_string(),
            op,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_not_found_is_named() {
        let err = EditorError::io(
            "notes.txt",
            IoOp::Open,
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, EditorError::NotFound { ref name } if name == "notes.txt"));
        assert_eq!(err.to_string(), "notes.txt: not found");
    }

    #[test]
    fn test_write_failure_keeps_operation() {
        let err = EditorError::io(
            "out.txt",
            IoOp::Write,
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(err.to_string(), "out.txt: write failed: disk full");
    }
}
