//! # walk
//!
//! Turns a path from the command line into books to update.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::file::{Outcome, PROGNAME, Run, process_file};
use crate::quote::QuoteSource;

/// Extension of a GnuCash book.
const BOOK_EXT: &str = ".gnucash";

/// Updates the book at `path`, or every book directly inside it if it is a directory.
/// Errors are logged here. Returns false if anything failed.
pub fn process_path<Q: QuoteSource>(path: &Path, run: &mut Run<Q>) -> bool {
    match books(path) {
        Ok(books) => books
            .iter()
            .fold(true, |ok, book| process_book(book, run) && ok),
        Err(e) => {
            error!("{e}");
            false
        }
    }
}

/// The books named by `path`.
fn books(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(path).map_err(|e| Error::io(path, e))? {
        let entry = entry.map_err(|e| Error::io(path, e))?;
        let child = entry.path();
        if is_book_name(&entry.file_name().to_string_lossy()) && child.is_file() {
            found.push(child);
        }
    }

    if found.is_empty() {
        return Err(Error::NoFiles(path.to_path_buf()));
    }
    found.sort();
    Ok(found)
}

/// `*.gnucash`, but not our own temp files or GnuCash's timestamped backups
/// (`name.gnucash.20200115103000.gnucash`).
fn is_book_name(name: &str) -> bool {
    name.ends_with(BOOK_EXT)
        && !name.starts_with(&format!(".{PROGNAME}"))
        && !name.contains(".gnucash.")
}

fn process_book<Q: QuoteSource>(book: &Path, run: &mut Run<Q>) -> bool {
    match process_file(book, run) {
        Ok(outcome) => {
            match outcome {
                Outcome::Updated => info!("Updated {}", book.display()),
                Outcome::DryRun => info!("Would update {} (dry run)", book.display()),
                Outcome::Unchanged => debug!("No prices added to {}", book.display()),
                Outcome::SkippedOpen => debug!("Skipped {}, it is open", book.display()),
            }
            true
        }
        Err(e) => {
            error!("Error: {e}");
            false
        }
    }
}
