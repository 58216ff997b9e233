//! Flat-file storage: one comma-delimited line per record.
//!
//! Reading is best-effort: a line that does not decode is reported as
//! [`ParsedLine::Malformed`] and the caller moves on. Writing always rewrites
//! the whole file through a temporary sibling and a rename.

use crate::record::{Record, RecordParseError};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of reading one physical line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Record(Record),
    Blank,
    Malformed {
        line_no: usize,
        error: RecordParseError,
    },
}

/// Line-by-line decoder over any buffered reader.
#[derive(Debug)]
pub struct RecordLines<R> {
    reader: R,
    line_no: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> RecordLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for RecordLines<R> {
    type Item = Result<ParsedLine, FlatFileError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_no += 1;
                Some(Ok(parse_line(self.line_no, &self.buf)))
            }
            Err(e) => Some(Err(FlatFileError::Io(format!(
                "line {}: {e}",
                self.line_no + 1
            )))),
        }
    }
}

fn parse_line(line_no: usize, raw: &[u8]) -> ParsedLine {
    let Ok(text) = std::str::from_utf8(raw) else {
        return ParsedLine::Malformed {
            line_no,
            error: RecordParseError::NotUtf8,
        };
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParsedLine::Blank;
    }
    match Record::decode(trimmed) {
        Ok(record) => ParsedLine::Record(record),
        Err(error) => ParsedLine::Malformed { line_no, error },
    }
}

/// Open a backing file for line-by-line decoding.
pub fn open_records(path: impl AsRef<Path>) -> Result<RecordLines<BufReader<File>>, FlatFileError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| FlatFileError::io(path, e))?;
    Ok(RecordLines::new(BufReader::new(file)))
}

/// Create an empty backing file (and its parent directory) if none exists.
///
/// Returns `true` when a file was created.
pub fn create_empty(path: impl AsRef<Path>) -> Result<bool, FlatFileError> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(FlatFileError::io(path, e)),
    }
}

/// Write records to a writer, one encoded line each.
pub fn write_records(writer: &mut impl Write, records: &[Record]) -> io::Result<()> {
    for record in records {
        writeln!(writer, "{}", record.encode())?;
    }
    Ok(())
}

/// How the target file received its new contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Temporary file renamed over the target. Crash-atomic.
    Renamed,
    /// Rename failed; bytes copied into the target and the temporary removed.
    /// Not crash-atomic: an interrupted copy can leave a truncated target.
    Copied,
}

/// Replace the file at `path` with the given records.
///
/// The records are written and synced to a temporary sibling first, which is
/// then renamed over `path`. If the rename fails, the temporary file is copied
/// into `path` instead (see [`SaveMode::Copied`] for the weaker guarantee).
pub fn write_records_to_path(
    path: impl AsRef<Path>,
    records: &[Record],
) -> Result<SaveMode, FlatFileError> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let tmp_path = tmp_write_path(path);
    if let Err(error) = write_tmp(&tmp_path, records) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    install(&tmp_path, path, |from, to| fs::rename(from, to))
}

fn write_tmp(tmp_path: &Path, records: &[Record]) -> Result<(), FlatFileError> {
    let file = File::create(tmp_path).map_err(|e| FlatFileError::io(tmp_path, e))?;
    let mut writer = BufWriter::new(file);
    write_records(&mut writer, records).map_err(|e| FlatFileError::io(tmp_path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| FlatFileError::io(tmp_path, e.into_error()))?;
    file.sync_all().map_err(|e| FlatFileError::io(tmp_path, e))
}

/// Move a fully-written temporary file onto `target`.
fn install<F>(tmp_path: &Path, target: &Path, rename: F) -> Result<SaveMode, FlatFileError>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    match rename(tmp_path, target) {
        Ok(()) => {
            sync_parent_dir(target)?;
            Ok(SaveMode::Renamed)
        }
        Err(rename_error) => {
            log::warn!(
                "rename {} -> {} failed ({rename_error}); falling back to non-atomic copy",
                tmp_path.display(),
                target.display()
            );
            let copied = copy_into(tmp_path, target);
            let _ = fs::remove_file(tmp_path);
            copied.map(|()| SaveMode::Copied)
        }
    }
}

fn copy_into(from: &Path, to: &Path) -> Result<(), FlatFileError> {
    let mut source = File::open(from).map_err(|e| FlatFileError::io(from, e))?;
    let mut dest = File::create(to).map_err(|e| FlatFileError::io(to, e))?;
    io::copy(&mut source, &mut dest).map_err(|e| {
        FlatFileError::Io(format!("{} -> {}: {e}", from.display(), to.display()))
    })?;
    dest.sync_all().map_err(|e| FlatFileError::io(to, e))
}

fn ensure_parent_dir(path: &Path) -> Result<(), FlatFileError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| FlatFileError::io(parent, e))?;
    }
    Ok(())
}

fn sync_parent_dir(path: &Path) -> Result<(), FlatFileError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent).map_err(|e| FlatFileError::io(parent, e))?;
        dir.sync_all().map_err(|e| FlatFileError::io(parent, e))?;
    }
    Ok(())
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

/// Errors from backing-file operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlatFileError {
    #[error("I/O error: {0}")]
    Io(String),
}

impl FlatFileError {
    fn io(path: &Path, error: io::Error) -> Self {
        Self::Io(format!("{}: {error}", path.display()))
    }
}
