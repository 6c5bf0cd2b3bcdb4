//! Typed errors for graph files and configuration
//!
//! Only input-data problems are errors. Structural invariant violations inside
//! the in-memory graphs are programming defects and panic instead.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} is empty")]
    EmptyFile(PathBuf),

    #[error("{path} is truncated while reading {what}")]
    Truncated { path: PathBuf, what: &'static str },

    #[error("{path}: invalid fingerprint magic 0x{found:08x}")]
    BadMagic { path: PathBuf, found: u32 },

    #[error("{path}: checksum mismatch (stored 0x{stored:08x}, computed 0x{computed:08x})")]
    ChecksumMismatch {
        path: PathBuf,
        stored: u32,
        computed: u32,
    },

    #[error("{path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("{0}: graph has no nodes")]
    NoNodes(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Build a mapper for `io::Error` that tags it with the file path.
    ///
    /// End-of-file while reading a fixed-size block becomes `Truncated`.
    pub(crate) fn io<'a>(path: &'a Path, what: &'static str) -> impl FnOnce(io::Error) -> Error + 'a {
        move |source| {
            if source.kind() == io::ErrorKind::UnexpectedEof {
                Error::Truncated {
                    path: path.to_path_buf(),
                    what,
                }
            } else {
                Error::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl Into<String>) -> Error {
        Error::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
