//! # error
//!
//! Failures that stop a single file or path from being processed.
//!
//! Quote lookups are not in here; a failed lookup only skips one price record and is
//! reported where it happens (see `quote`).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The accounting application holds a lock file next to the data file.
    #[error("{} is in use", .0.display())]
    Locked(PathBuf),

    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    /// A directory was given but nothing in it looks like a GnuCash file.
    #[error("no gnucash files found in {}", .0.display())]
    NoFiles(PathBuf),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wraps an I/O error with the file it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
