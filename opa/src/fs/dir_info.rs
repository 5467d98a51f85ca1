//! Disk usage and free space of a directory.
//!
//! Used bytes are the apparent sizes of all regular files below the path.
//! Symbolic links are never followed and never counted, which keeps hard
//! linked or symlinked artifacts of a previous generation from being counted
//! twice through the link.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use walkdir::WalkDir;

/// Size information about a directory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirInfo {
    pub path: PathBuf,

    /// Sum of regular file sizes below `path`
    pub bytes_used: u64,

    /// Free bytes on the filesystem holding `path`
    pub bytes_free: u64,
}

impl DirInfo {
    /// Placeholder used when there is no previous generation.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

/// Collect used and free bytes of a directory
pub fn dir_info(path: &Path) -> io::Result<DirInfo> {
    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Directory does not exist: {}", path.display()),
        ));
    }

    Ok(DirInfo {
        path: path.to_path_buf(),
        bytes_used: dir_size(path)?,
        bytes_free: free_bytes(path)?,
    })
}

/// Sum the apparent sizes of all regular files in a directory tree
pub fn dir_size(path: &Path) -> io::Result<u64> {
    let mut total = 0u64;

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }

    Ok(total)
}

/// Bytes available to unprivileged users on the filesystem containing `path`
pub fn free_bytes(path: &Path) -> io::Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(io::Error::from)?;
    Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
}

/// Modification time of the most recently changed regular file in a tree
pub fn last_change(path: &Path) -> io::Result<DateTime<Local>> {
    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Directory does not exist: {}", path.display()),
        ));
    }

    let latest = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok()?.modified().ok())
        .max();

    latest.map(DateTime::<Local>::from).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("No accessible files found in directory: {}", path.display()),
        )
    })
}
