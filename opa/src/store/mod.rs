//! Backup generation store.
//!
//! Every run gets its own directory `<root>/opa_<YYYYMMDD-HHMMSS>`. The store
//! remembers the newest generation that existed before the run (the
//! "previous" one), creates the "current" one, prunes old generations and
//! maintains the `last` and `last.log` pointers at the root.

pub mod info;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::LinkType;
use crate::fs::links::{replace_symlink, swap_file_for_link};
use crate::fs::{dir_info, DirInfo};
use crate::{ArchiverError, Result};
pub use info::BackupInfo;

pub const DIR_PREFIX: &str = "opa";
pub const LOG_FILE: &str = "opa.log";
pub const INFO_FILE: &str = "info.json";
pub const LAST_LINK: &str = "last";
pub const LAST_LOG_LINK: &str = "last.log";

/// Artifacts of a per-database backup that can be carried over unchanged.
pub const REUSABLE_SUFFIXES: &[&str] = &[".sql.gz", ".timestamp"];

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

static GENERATION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{}_\d{{8}}-\d{{6}}$", DIR_PREFIX)).expect("valid generation pattern")
});

/// Directory name of the generation created at `time`.
pub fn generation_name(time: &DateTime<Local>) -> String {
    format!("{}_{}", DIR_PREFIX, time.format(TIMESTAMP_FORMAT))
}

pub fn is_generation_name(name: &str) -> bool {
    GENERATION_NAME.is_match(name)
}

/// All generation directories below `root`, oldest first.
pub fn list_generations(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut generations = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if entry.file_name().to_str().is_some_and(is_generation_name) {
            generations.push(entry.path());
        }
    }

    // Fixed-width timestamps make lexicographic order chronological
    generations.sort();
    Ok(generations)
}

/// Delete the oldest entries of `generations` until `keep` remain.
/// Returns the deleted paths, oldest first.
fn prune(generations: Vec<PathBuf>, keep: usize) -> Result<Vec<PathBuf>> {
    let surplus = generations.len().saturating_sub(keep);
    let mut removed = Vec::with_capacity(surplus);

    for old in generations.into_iter().take(surplus) {
        fs::remove_dir_all(&old)?;
        info!("Removed old backup directory: {}", old.display());
        removed.push(old);
    }

    Ok(removed)
}

/// Owner of the on-disk generation layout for one run.
#[derive(Debug)]
pub struct GenerationStore {
    root: PathBuf,
    link_type: LinkType,
    previous: DirInfo,
    current: DirInfo,
}

impl GenerationStore {
    /// Open the store and create the generation for this run.
    pub fn open(root: &Path, link_type: LinkType) -> Result<Self> {
        Self::open_at(root, link_type, Local::now())
    }

    /// Same as [`GenerationStore::open`] with an explicit creation time.
    ///
    /// A generation that already carries the same name (a second run within
    /// the same second) is reused as the current one.
    pub fn open_at(root: &Path, link_type: LinkType, now: DateTime<Local>) -> Result<Self> {
        if !root.is_dir() {
            return Err(ArchiverError::NotFound(format!(
                "Base directory '{}' does not exist",
                root.display()
            )));
        }

        let current_path = root.join(generation_name(&now));

        let previous = match list_generations(root)?
            .into_iter()
            .rev()
            .find(|path| *path != current_path)
        {
            Some(path) => dir_info(&path)?,
            None => DirInfo::empty(),
        };

        fs::create_dir_all(&current_path)?;
        let current = dir_info(&current_path)?;

        debug!(
            "Generation store at {}: previous={:?}, current={}",
            root.display(),
            previous.path,
            current.path.display()
        );

        Ok(Self {
            root: root.to_path_buf(),
            link_type,
            previous,
            current,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current(&self) -> &DirInfo {
        &self.current
    }

    /// Newest generation that existed before this run, or an empty placeholder.
    pub fn previous(&self) -> &DirInfo {
        &self.previous
    }

    /// Log file of the current generation
    pub fn log_file(&self) -> PathBuf {
        self.current.path.join(LOG_FILE)
    }

    pub fn generations(&self) -> Result<Vec<PathBuf>> {
        Ok(list_generations(&self.root)?)
    }

    /// Refresh the current generation's usage and write `info.json`.
    pub fn store_backup_info(&mut self, mysql_data_dir_bytes_used: u64) -> Result<BackupInfo> {
        self.current = dir_info(&self.current.path)?;

        let backup_info = BackupInfo::new(mysql_data_dir_bytes_used, self.current.bytes_used);
        let info_file = self.current.path.join(INFO_FILE);
        fs::write(&info_file, serde_json::to_string_pretty(&backup_info)?)?;

        debug!("Stored backup info {:?} in {}", backup_info, info_file.display());
        Ok(backup_info)
    }

    /// Metadata of the previous generation, or the defaults when it left none.
    pub fn backup_info(&self) -> Result<BackupInfo> {
        if self.previous.is_empty() {
            return Ok(BackupInfo::default());
        }

        match fs::read_to_string(self.previous.path.join(INFO_FILE)) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BackupInfo::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Point `last` at the current generation and `last.log` at its log.
    pub fn link_to_last(&self) -> Result<()> {
        let last = self.root.join(LAST_LINK);
        let last_log = self.root.join(LAST_LOG_LINK);

        replace_symlink(&self.current.path, &last)?;
        replace_symlink(&self.log_file(), &last_log)?;

        info!("Linked {} -> {}", last.display(), self.current.path.display());
        Ok(())
    }

    /// Discard the current generation of a run that never started.
    ///
    /// The log survives as `<root>/last.log`; the `last` pointer is left alone.
    /// Returns the new location of the log file.
    ///
    /// A generation that already holds `info.json` was finalized by an earlier
    /// run within the same second; it is kept and its log stays in place.
    pub fn remove_skipped(&self) -> Result<PathBuf> {
        if self.current.path.join(INFO_FILE).exists() {
            warn!(
                "Keeping finalized generation {} of an earlier run",
                self.current.path.display()
            );
            return Ok(self.log_file());
        }

        let last_log = self.root.join(LAST_LOG_LINK);

        fs::rename(self.log_file(), &last_log)?;
        fs::remove_dir_all(&self.current.path)?;

        Ok(last_log)
    }

    /// Prune before the backup so that `versions - 1` older generations remain
    /// next to the current one.
    pub fn cleanup_before(&self, versions: usize) -> Result<Vec<PathBuf>> {
        let older: Vec<PathBuf> = list_generations(&self.root)?
            .into_iter()
            .filter(|path| *path != self.current.path)
            .collect();
        prune(older, versions.saturating_sub(1))
    }

    /// Prune after the backup so that `versions` generations remain, the
    /// current one included.
    pub fn cleanup_after(&self, versions: usize) -> Result<Vec<PathBuf>> {
        prune(list_generations(&self.root)?, versions)
    }

    fn timestamp_file(dir: &Path, item: &str) -> PathBuf {
        dir.join(format!("{}.timestamp", item))
    }

    /// When `item` was backed up in the previous generation.
    pub fn previous_item_time(&self, item: &str) -> Result<NaiveDateTime> {
        if self.previous.is_empty() {
            return Ok(info::never_backed_up());
        }

        let path = Self::timestamp_file(&self.previous.path, item);
        match fs::read_to_string(&path) {
            Ok(content) => info::parse_item_time(&content).ok_or_else(|| {
                ArchiverError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid timestamp in {}: {}", path.display(), content.trim()),
                ))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(info::never_backed_up()),
            Err(e) => Err(e.into()),
        }
    }

    /// Record that `item` was backed up now.
    pub fn store_item_time(&self, item: &str) -> Result<NaiveDateTime> {
        // Truncated to what the file format keeps
        let now = Local::now().naive_local().trunc_subsecs(6);
        self.store_item_time_at(item, &now)?;
        Ok(now)
    }

    pub fn store_item_time_at(&self, item: &str, time: &NaiveDateTime) -> Result<()> {
        let path = Self::timestamp_file(&self.current.path, item);
        fs::write(path, info::format_item_time(time))?;
        Ok(())
    }

    /// Carry the previous generation's artifacts of `item` over to the
    /// current one, leaving links at their old location.
    pub fn reuse_previous_artifact(&self, item: &str, suffixes: &[&str]) -> Result<()> {
        if self.previous.is_empty() {
            return Err(ArchiverError::NotFound(format!(
                "No previous backup to reuse for '{}'",
                item
            )));
        }

        for suffix in suffixes {
            let name = format!("{}{}", item, suffix);
            let previous_file = self.previous.path.join(&name);
            let current_file = self.current.path.join(&name);
            swap_file_for_link(&previous_file, &current_file, self.link_type)?;
            debug!("Reused {} from {}", name, self.previous.path.display());
        }

        Ok(())
    }
}
