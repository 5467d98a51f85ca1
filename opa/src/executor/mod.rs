//! Backup engine - runs one xtrabackup backup into the current generation.
//!
//! The engine checks free space, runs the configured strategy and, when the
//! backup finished, records its metadata and moves the `last` pointers:
//! - preflight (fails the whole run with `InsufficientSpace`)
//! - regular backup, optional prepare, optional tgz archive
//! - or a stream-compressed backup
//! - `info.json` and the `last` / `last.log` pointers

pub mod result;
pub mod strategy;
pub mod xtrabackup;

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::MainConfig;
use crate::fs::DirInfo;
use crate::store::GenerationStore;
use crate::utils::calc_parallelism;
use crate::utils::format::{format_bytes, format_duration};
use crate::Result;
pub use result::RunResult;
pub use strategy::Strategy;
use xtrabackup::XtraBackup;

/// Runs the backup of one MySQL data directory.
pub struct BackupEngine<'a> {
    config: &'a MainConfig,
    store: &'a mut GenerationStore,
    source: DirInfo,
}

impl<'a> BackupEngine<'a> {
    /// `source` is the MySQL data directory being backed up.
    pub fn new(config: &'a MainConfig, store: &'a mut GenerationStore, source: DirInfo) -> Self {
        Self {
            config,
            store,
            source,
        }
    }

    pub fn strategy(&self) -> Strategy {
        Strategy::from_config(self.config)
    }

    /// Execute the backup.
    ///
    /// Insufficient space and failures while finalizing the generation are
    /// returned as errors. A backup that did not finish is reported as a
    /// failed [`RunResult`].
    pub async fn execute(&mut self) -> Result<RunResult> {
        let strategy = self.strategy();

        debug!("MySQL data directory: {:?}", self.source);
        info!(
            "Starting XtraBackup with strategy: streamcompress={}, prepare={}, tgz={}",
            self.config.streamcompress, self.config.prepare, self.config.tgz
        );

        self.check_free_space(strategy)?;
        self.log_size_estimate();

        let started = Instant::now();
        let xtrabackup = XtraBackup::new(
            &self.config.xtrabackup_bin,
            &self.config.xtrabackup_options,
            calc_parallelism(self.config.parallelism),
            &self.store.current().path,
        );

        let success = match run_strategy(&xtrabackup, strategy).await {
            Ok(success) => success,
            Err(e) => {
                error!("XtraBackup failed with error: {}", e);
                false
            }
        };

        if !success {
            error!("XtraBackup failed");
            return Ok(RunResult::failed());
        }

        info!(
            "XtraBackup completed successfully in {}",
            format_duration(started.elapsed().as_secs())
        );

        let backup_info = self.store.store_backup_info(self.source.bytes_used)?;
        info!(
            "Backup uses {} for {} of data (ratio {:.2})",
            format_bytes(backup_info.backup_bytes_used),
            format_bytes(backup_info.mysql_data_dir_bytes_used),
            backup_info.compression_ratio
        );

        self.store.link_to_last()?;
        Ok(RunResult::succeeded())
    }

    fn check_free_space(&self, strategy: Strategy) -> Result<()> {
        let free = self.store.current().bytes_free;
        let required = strategy.required_bytes(self.source.bytes_used);

        info!(
            "Backup will require approximately {}. Having {} free.",
            format_bytes(required),
            format_bytes(free)
        );

        strategy.preflight(self.source.bytes_used, free).map(|_| ())
    }

    fn log_size_estimate(&self) {
        match self.store.backup_info() {
            Ok(previous) => info!(
                "Previous compression ratio {:.2}, estimated backup size {}",
                previous.compression_ratio,
                format_bytes(previous.estimated_backup_bytes(self.source.bytes_used))
            ),
            Err(e) => warn!("Could not read previous backup info: {}", e),
        }
    }
}

async fn run_strategy(xtrabackup: &XtraBackup, strategy: Strategy) -> std::io::Result<bool> {
    match strategy {
        Strategy::StreamCompressed => xtrabackup.stream_compressed().await,
        Strategy::Regular { prepare, archive } => {
            if !xtrabackup.backup().await? {
                return Ok(false);
            }
            if prepare && !xtrabackup.prepare().await? {
                return Ok(false);
            }
            if archive && !xtrabackup.archive().await? {
                return Ok(false);
            }
            Ok(true)
        }
    }
}
