//! One complete invocation of the archiver.
//!
//! Ties the generation store, conditions, compatibility check, backup engine
//! and reporting together in the order an operator expects.

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::compat::{self, Compatibility};
use crate::conditions::ConditionRunner;
use crate::executor::{BackupEngine, RunResult};
use crate::monitor::ZabbixSender;
use crate::mysql::MysqlInfo;
use crate::store::GenerationStore;
use crate::utils::logger::RunLog;
use crate::{Config, Result};

/// Run a backup with the given configuration. `debug` forces debug logging
/// over both the configured level and `RUST_LOG`.
///
/// Errors are returned for environment faults around the generation layout;
/// every other outcome, including a failed backup, is a [`RunResult`].
pub async fn run_backup(config: &Config, debug: bool) -> Result<RunResult> {
    let main = &config.main;

    let mut store = GenerationStore::open(&main.backup_dir, main.link_type)?;
    let mut log = RunLog::init(log_level(config, debug), debug, Some(&store.log_file()))?;

    info!("Starting opa v{}", env!("CARGO_PKG_VERSION"));
    debug!("Current backup directory: {}", store.current().path.display());

    let sender = ZabbixSender::new(config.zabbix.clone());
    let conditions = ConditionRunner::new(config.conditions.clone());

    if conditions.check_skip_conditions().await {
        info!("Backup skipped due to skip conditions (but considered successful)");
        return finish_skipped(&store, &mut log, &sender, RunResult::skipped_successfully()).await;
    }

    if !conditions.check_run_conditions().await {
        error!("Backup aborted due to failed run conditions");
        return finish_skipped(&store, &mut log, &sender, RunResult::skipped_faulty()).await;
    }

    if main.check_xtrabackup_version && !version_check_passed(config).await {
        if main.strict_version_check {
            error!("Backup aborted due to failed XtraBackup version check");
            return finish_skipped(&store, &mut log, &sender, RunResult::skipped_faulty()).await;
        }
        warn!("Continuing despite failed XtraBackup version check");
    }

    if main.delete_before {
        let removed = store.cleanup_before(main.versions)?;
        info!("Removed old backup directories: {:?}", removed);
    }

    let result = match MysqlInfo::new(&main.mysql_bin).await {
        Ok(mysql) => {
            debug!("Databases in {}: {:?}", mysql.data_dir().display(), mysql.databases());
            let source = mysql.data_dir_info().clone();
            let outcome = BackupEngine::new(main, &mut store, source).execute().await;
            match outcome {
                Ok(result) => result,
                Err(e) if e.is_insufficient_space() => {
                    error!("{}", e);
                    return finish_skipped(&store, &mut log, &sender, RunResult::skipped_faulty())
                        .await;
                }
                Err(e) => {
                    error!("Finalizing backup failed: {}", e);
                    sender.send_log_file(&RunResult::failed(), &log).await;
                    return Err(e);
                }
            }
        }
        Err(e) => {
            error!("Could not query MySQL: {}", e);
            RunResult::failed()
        }
    };

    if !main.delete_before {
        let removed = store.cleanup_after(main.versions)?;
        info!("Removed old backup directories: {:?}", removed);
    }

    // Hooks never change the outcome of the backup itself
    conditions
        .execute_terminate_conditions(&store.current().path)
        .await;

    info!("{}", result.summary());
    sender.send_log_file(&result, &log).await;
    Ok(result)
}

/// Drop the generation of a run that never started and report it.
async fn finish_skipped(
    store: &GenerationStore,
    log: &mut RunLog,
    sender: &ZabbixSender,
    result: RunResult,
) -> Result<RunResult> {
    let moved_log = store.remove_skipped()?;
    log.relocate(moved_log);

    info!("{}", result.summary());
    sender.send_log_file(&result, log).await;
    Ok(result)
}

/// Effective log level name of a run.
pub fn log_level(config: &Config, debug: bool) -> &str {
    if debug {
        "debug"
    } else {
        config.main.log_level.as_str()
    }
}

async fn version_check_passed(config: &Config) -> bool {
    match compat::check(&config.main.mysql_bin, &config.main.xtrabackup_bin).await {
        Ok(verdict) if verdict.compatible => {
            info!("{}", verdict.message);
            true
        }
        Ok(_) => false,
        Err(e) => {
            error!("XtraBackup version check failed: {}", e);
            false
        }
    }
}

/// Check the installed xtrabackup against the server without backing up.
///
/// With `installer`, an installer script is written whenever the check found
/// a package to download.
pub async fn validate_setup(config: &Config, installer: Option<&Path>) -> Result<Compatibility> {
    let verdict = compat::check(&config.main.mysql_bin, &config.main.xtrabackup_bin).await?;

    if let (Some(path), Some(url), Some(version)) = (
        installer,
        verdict.download_url.as_deref(),
        verdict.required_version.as_deref(),
    ) {
        compat::write_installer(path, url, version)?;
    }

    Ok(verdict)
}
