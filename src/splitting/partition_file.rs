//! Partition-file lifecycle management.
//!
//! A destination file is created with an opening `[`, appended to one record
//! per line, and finalized with a closing `]`. A file finalized earlier in
//! the same run is reopened by patching its trailing `]` into `,`; the patch
//! is written to a temporary file in the same directory and atomically
//! swapped over the original, so the file is never left half-rewritten.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::AppError;
use crate::splitting::bucket::{input_extension, input_stem};

/// The single writable destination-file handle of a split run.
///
/// Tracks how many records were appended during the current open session;
/// every record after the first is preceded by a separating comma. The count
/// restarts at zero on reopen because the patched trailing comma already
/// separates the earlier content from the next record.
#[derive(Debug)]
pub struct PartitionHandle {
    writer: BufWriter<File>,
    path: PathBuf,
    records_in_session: u64,
}

impl PartitionHandle {
    /// Creates a brand-new destination file and writes the opening bracket.
    pub fn create(path: &Path) -> Result<Self, AppError> {
        let file = File::create(path).map_err(|e| {
            AppError::PartitionWriteError(format!("failed to create {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        writer.write_all(b"[\n").map_err(|e| {
            AppError::PartitionWriteError(format!("failed to write to {}: {}", path.display(), e))
        })?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            records_in_session: 0,
        })
    }

    /// Reopens a destination file that was finalized earlier in the same run.
    ///
    /// Patches the file's trailing `]` into `,` and opens it for appending.
    /// The opening bracket is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BracketRewriteError`] if the file cannot be read,
    /// does not end with `]`, or the patched copy cannot replace it.
    pub fn reopen(path: &Path) -> Result<Self, AppError> {
        patch_trailing_bracket(path)?;

        let file = OpenOptions::new().append(true).open(path).map_err(|e| {
            AppError::PartitionWriteError(format!("failed to reopen {}: {}", path.display(), e))
        })?;

        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            records_in_session: 0,
        })
    }

    /// Appends one buffered record (which ends with a newline), preceded by a
    /// comma for every record after the first of the session.
    pub fn append_record(&mut self, record: &[u8]) -> Result<(), AppError> {
        if self.records_in_session > 0 {
            self.write(b",")?;
        }
        self.write(record)?;
        self.records_in_session += 1;
        Ok(())
    }

    /// Writes the closing bracket, flushes, and releases the handle.
    ///
    /// After this the file on disk is a complete, independently parseable
    /// JSON array.
    pub fn finalize(mut self) -> Result<PathBuf, AppError> {
        self.write(b"]")?;
        self.writer.flush().map_err(|e| {
            AppError::PartitionWriteError(format!(
                "failed to flush {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(self.path)
    }

    /// Path of the destination file this handle writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), AppError> {
        self.writer.write_all(bytes).map_err(|e| {
            AppError::PartitionWriteError(format!(
                "failed to write to {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Replaces the file's final `]` with `,`.
///
/// The whole file is read, patched in memory, written to a temporary file in
/// the same directory, and atomically persisted over the original. A failure
/// at any step leaves the original file exactly as it was.
fn patch_trailing_bracket(path: &Path) -> Result<(), AppError> {
    let mut content = fs::read(path).map_err(|e| {
        AppError::BracketRewriteError(format!("failed to read {}: {}", path.display(), e))
    })?;

    match content.last() {
        Some(b']') => {
            let last = content.len() - 1;
            content[last] = b',';
        }
        _ => {
            return Err(AppError::BracketRewriteError(format!(
                "{} does not end with a closing bracket",
                path.display()
            )))
        }
    }

    let parent = path.parent().ok_or_else(|| {
        AppError::BracketRewriteError(format!(
            "cannot determine parent directory for {}",
            path.display()
        ))
    })?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| {
        AppError::BracketRewriteError(format!("failed to create temporary file: {}", e))
    })?;
    temp.write_all(&content).map_err(|e| {
        AppError::BracketRewriteError(format!("failed to write temporary file: {}", e))
    })?;
    temp.persist(path).map_err(|e| {
        AppError::BracketRewriteError(format!(
            "failed to replace {}: {}",
            path.display(),
            e.error
        ))
    })?;

    Ok(())
}

/// Deletes previously generated partition files for `input` and `field` from
/// `out_dir`, returning how many were removed.
///
/// Callers run this before a split so a rerun does not inherit stale output.
/// Only files matching `<input-base-name>__<field>_*.<extension>` are
/// touched.
pub fn remove_stale_partitions(
    input: &Path,
    out_dir: &Path,
    field: &str,
) -> Result<u64, AppError> {
    let prefix = format!("{}__{}_", input_stem(input), field);
    let suffix = format!(".{}", input_extension(input));

    let entries = fs::read_dir(out_dir).map_err(|e| {
        AppError::PartitionWriteError(format!("failed to read {}: {}", out_dir.display(), e))
    })?;

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| {
            AppError::PartitionWriteError(format!("failed to read directory entry: {}", e))
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        if name.starts_with(&prefix) && name.ends_with(&suffix) && entry.path().is_file() {
            fs::remove_file(entry.path()).map_err(|e| {
                AppError::PartitionWriteError(format!(
                    "failed to remove {}: {}",
                    entry.path().display(),
                    e
                ))
            })?;
            removed += 1;
        }
    }

    Ok(removed)
}
