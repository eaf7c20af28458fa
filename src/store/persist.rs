//! Snapshot files: write-to-temp-then-rename with a `.backup` sibling.
//!
//! Save sequence:
//! 1. write the snapshot to `<file>.tmp.<uuid>` in the same directory, fsync
//! 2. rename the current `<file>` (if any) to `<file>.backup`
//! 3. rename the temp file to `<file>`
//!
//! A crash between 2 and 3 leaves only the backup, which `load` falls back to.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::codec;
use super::record::MetadataRecord;
use crate::error::StorageError;

/// Version of the snapshot payload layout.
pub(crate) const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Full record set as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub(crate) format_version: u32,
    pub(crate) saved_at: DateTime<Utc>,
    pub(crate) records: Vec<MetadataRecord>,
}

impl Snapshot {
    pub(crate) fn new(records: Vec<MetadataRecord>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            records,
        }
    }
}

/// Where [`load`](super::MetadataStore::load) found its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// The store file.
    Primary,
    /// The `.backup` sibling, after the store file failed to read.
    Backup,
    /// Neither file was readable; the store starts empty.
    Empty,
}

/// `<file>.backup` next to `path`.
pub(crate) fn backup_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".backup");
    path.with_file_name(name)
}

/// Writes one snapshot to a temp file and commits it into place.
struct SnapshotWriter {
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl SnapshotWriter {
    fn create(final_path: &Path) -> Result<Self, StorageError> {
        let mut name: OsString = final_path.file_name().map(OsString::from).unwrap_or_default();
        name.push(format!(".tmp.{}", Uuid::new_v4()));
        let temp_path = final_path.with_file_name(name);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| StorageError::io(&temp_path, e))?;

        Ok(Self {
            temp_path: Some(temp_path),
            final_path: final_path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    fn temp_path(&self) -> PathBuf {
        self.temp_path.clone().unwrap_or_default()
    }

    fn write(&mut self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let temp_path = self.temp_path();
        let Some(writer) = self.writer.as_mut() else {
            return Err(StorageError::Serialization("snapshot writer already committed".to_string()));
        };
        let frame = codec::encode(snapshot).map_err(|e| StorageError::Serialization(e.to_string()))?;
        codec::write_header(writer).map_err(|e| StorageError::io(&temp_path, e))?;
        writer
            .write_all(&frame)
            .map_err(|e| StorageError::io(&temp_path, e))
    }

    /// Flush, fsync, move the current file to `.backup`, rename into place.
    fn commit(mut self) -> Result<(), StorageError> {
        let temp_path = self.temp_path();
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| StorageError::io(&temp_path, e))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| StorageError::io(&temp_path, e))?;
        }

        if self.final_path.exists() {
            let backup = backup_path(&self.final_path);
            fs::rename(&self.final_path, &backup).map_err(|e| StorageError::io(&backup, e))?;
        }
        fs::rename(&temp_path, &self.final_path)
            .map_err(|e| StorageError::io(&self.final_path, e))?;
        self.temp_path = None;
        Ok(())
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        // Uncommitted: remove the temp file.
        self.writer.take();
        if let Some(temp_path) = self.temp_path.take() {
            if temp_path.exists() {
                let _ = fs::remove_file(&temp_path);
            }
        }
    }
}

/// Persist `snapshot` at `path`, keeping the previous file as `.backup`.
pub(crate) fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StorageError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    }
    let mut writer = SnapshotWriter::create(path)?;
    writer.write(snapshot)?;
    writer.commit()
}

/// Read and verify one snapshot file.
pub(crate) fn read_snapshot(path: &Path) -> Result<Snapshot, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let corrupt_or_io = |e: std::io::Error| match e.kind() {
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => StorageError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
        _ => StorageError::io(path, e),
    };

    codec::read_header(&mut reader).map_err(corrupt_or_io)?;
    let snapshot: Snapshot = codec::decode(&mut reader).map_err(corrupt_or_io)?;
    if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(StorageError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("unsupported snapshot format {}", snapshot.format_version),
        });
    }
    Ok(snapshot)
}

/// Read `path`, falling back to its `.backup`, then to nothing.
pub(crate) fn read_with_fallback(path: &Path) -> (Option<Snapshot>, LoadSource) {
    match read_snapshot(path) {
        Ok(snapshot) => return (Some(snapshot), LoadSource::Primary),
        Err(StorageError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no store file");
        }
        Err(err) => warn!(path = %path.display(), error = %err, "store file unreadable, trying backup"),
    }

    let backup = backup_path(path);
    match read_snapshot(&backup) {
        Ok(snapshot) => (Some(snapshot), LoadSource::Backup),
        Err(err) => {
            if backup.exists() || path.exists() {
                warn!(path = %backup.display(), error = %err, "backup unreadable, starting empty");
            }
            (None, LoadSource::Empty)
        }
    }
}
