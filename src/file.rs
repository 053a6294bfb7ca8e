//! # file
//!
//! Updates a single GnuCash book on disk.
//!
//! The book is never written in place. Output goes to a hidden file next to it,
//! which is renamed over the book only if a price was actually added, and removed
//! otherwise. Compressed books stay compressed, plain ones stay plain.
//!
//! GnuCash leaves a `<book>.LCK` file beside a book it has open; such books are
//! skipped.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::patch::patch;
use crate::quote::{PriceFetcher, QuoteSource};

/// Used for the temporary file name.
pub const PROGNAME: &str = env!("CARGO_PKG_NAME");

/// Appended to a book's name by GnuCash while the book is open.
pub const LOCK_SUFFIX: &str = ".LCK";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// User choices that apply to every book.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Treat an open book as done instead of as an error.
    pub ignore_open: bool,
    /// Go through the motions without writing anything.
    pub dry_run: bool,
}

/// State shared by every book in one run.
pub struct Run<Q> {
    pub options: Options,
    pub fetcher: PriceFetcher<Q>,
    /// Time written into every record added during the run.
    pub stamp: String,
}

impl<Q: QuoteSource> Run<Q> {
    pub fn new(options: Options, source: Q, stamp: String) -> Self {
        Self { options, fetcher: PriceFetcher::new(source), stamp }
    }
}

/// How a book was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Updated,
    Unchanged,
    /// Open in GnuCash and `ignore_open` was set.
    SkippedOpen,
    /// Prices would have been added but this is a dry run.
    DryRun,
}

/// `<dir>/<name>.LCK`
pub fn lock_path(path: &Path) -> PathBuf {
    sibling(path, "", LOCK_SUFFIX)
}

/// `<dir>/.<progname>-<name>`
pub fn temp_path(path: &Path) -> PathBuf {
    sibling(path, &format!(".{PROGNAME}-"), "")
}

fn sibling(path: &Path, prefix: &str, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix);
    name.push(path.file_name().unwrap_or(path.as_os_str()));
    name.push(suffix);
    path.with_file_name(name)
}

/// Looks at the first bytes without consuming them.
fn is_gzip(reader: &mut impl BufRead) -> io::Result<bool> {
    Ok(reader.fill_buf()?.starts_with(&GZIP_MAGIC))
}

/// Adds current prices to the book at `path`.
pub fn process_file<Q: QuoteSource>(path: &Path, run: &mut Run<Q>) -> Result<Outcome> {
    if lock_path(path).exists() {
        if run.options.ignore_open {
            debug!("{} is open, skipping", path.display());
            return Ok(Outcome::SkippedOpen);
        }
        return Err(Error::Locked(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);
    let compressed = is_gzip(&mut reader).map_err(|e| Error::io(path, e))?;
    debug!(compressed, "reading {}", path.display());

    let input: Box<dyn BufRead> = if compressed {
        Box::new(BufReader::new(MultiGzDecoder::new(reader)))
    } else {
        Box::new(reader)
    };

    let label = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy().into_owned();

    if run.options.dry_run {
        let changed = patch(input, &mut io::sink(), &mut run.fetcher, &run.stamp, &label)
            .map_err(|e| Error::io(path, e))?;
        return Ok(if changed { Outcome::DryRun } else { Outcome::Unchanged });
    }

    let temp = temp_path(path);
    let written = write_temp(input, &temp, compressed, run, &label)
        .and_then(|changed| {
            if changed {
                fs::set_permissions(&temp, fs::metadata(path)?.permissions())?;
            }
            Ok(changed)
        });

    match written {
        Ok(true) => {
            fs::rename(&temp, path).map_err(|e| {
                let _ = fs::remove_file(&temp);
                Error::io(path, e)
            })?;
            Ok(Outcome::Updated)
        }
        Ok(false) => {
            fs::remove_file(&temp).map_err(|e| Error::io(&temp, e))?;
            Ok(Outcome::Unchanged)
        }
        Err(e) => {
            let _ = fs::remove_file(&temp);
            Err(Error::io(path, e))
        }
    }
}

/// Patches `input` into a new file at `temp`, gzipped if `compressed`.
/// The file is synced before returning.
fn write_temp<Q: QuoteSource>(
    input: impl BufRead,
    temp: &Path,
    compressed: bool,
    run: &mut Run<Q>,
    label: &str,
) -> io::Result<bool> {
    let out = BufWriter::new(File::create(temp)?);

    let (changed, out) = if compressed {
        let mut gz = GzEncoder::new(out, Compression::default());
        let changed = patch(input, &mut gz, &mut run.fetcher, &run.stamp, label)?;
        (changed, gz.finish()?)
    } else {
        let mut out = out;
        let changed = patch(input, &mut out, &mut run.fetcher, &run.stamp, label)?;
        (changed, out)
    };

    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(changed)
}

/// Writes `data` to `path`, gzipped if asked. Used by tests to build books.
#[cfg(test)]
pub fn write_book(path: &Path, data: &str, compressed: bool) {
    use std::io::Write;

    let file = File::create(path).unwrap();
    if compressed {
        let mut gz = GzEncoder::new(file, Compression::default());
        gz.write_all(data.as_bytes()).unwrap();
        gz.finish().unwrap();
    } else {
        let mut file = file;
        file.write_all(data.as_bytes()).unwrap();
    }
}
