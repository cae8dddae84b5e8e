use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::models::error::SyncError;

/// Set of entry names present in a directory at one point in time.
///
/// A directory that does not exist is an empty snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    directory: PathBuf,
    entries: HashSet<OsString>,
}

impl DirectorySnapshot {
    pub fn capture(directory: &Path) -> Result<Self, SyncError> {
        Ok(Self {
            directory: directory.to_path_buf(),
            entries: list_entries(directory)?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Regular files in the directory now that were not in this snapshot,
    /// sorted by path.
    pub fn new_files(&self) -> Result<Vec<PathBuf>, SyncError> {
        let current = list_entries(&self.directory)?;
        let mut files: Vec<PathBuf> = current
            .difference(&self.entries)
            .map(|name| self.directory.join(name))
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }
}

fn list_entries(directory: &Path) -> Result<HashSet<OsString>, SyncError> {
    let read_dir = match fs::read_dir(directory) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => {
            return Err(SyncError::Storage(format!(
                "failed to list {}: {}",
                directory.display(),
                e
            )))
        }
    };

    read_dir
        .map(|entry| {
            entry.map(|e| e.file_name()).map_err(|e| {
                SyncError::Storage(format!("failed to read entry in {}: {}", directory.display(), e))
            })
        })
        .collect()
}
