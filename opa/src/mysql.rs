//! Facts about the running MySQL server, queried through the mysql client.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::process::Command;
use tracing::debug;

use crate::fs::{dir_info, last_change, DirInfo};
use crate::utils::process::run_captured;
use crate::{ArchiverError, Result};

/// Schemas that are never backed up on their own.
pub const SYSTEM_DATABASES: &[&str] = &["information_schema", "sys", "performance_schema"];

pub(crate) const VERSION_QUERY: &[&str] = &["-N", "-e", "SELECT VERSION()"];

#[derive(Debug, Clone)]
pub struct MysqlInfo {
    mysql_bin: String,
    data_dir: DirInfo,
    databases: Vec<String>,
}

impl MysqlInfo {
    /// Query the data directory and the user databases.
    pub async fn new(mysql_bin: &str) -> Result<Self> {
        let data_dir = PathBuf::from(query(mysql_bin, &["-N", "-e", "SELECT @@datadir"]).await?.trim());
        let data_dir = dir_info(&data_dir)?;
        debug!("MySQL data directory: {:?}", data_dir);

        let listing = query(mysql_bin, &["-e", "show databases", "-N"]).await?;

        Ok(Self {
            mysql_bin: mysql_bin.to_string(),
            data_dir,
            databases: parse_databases(&listing),
        })
    }

    pub fn data_dir_info(&self) -> &DirInfo {
        &self.data_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir.path
    }

    /// User databases, system schemas excluded.
    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    /// Raw `SELECT VERSION()` output.
    pub async fn version(&self) -> Result<String> {
        let version = query(&self.mysql_bin, VERSION_QUERY).await?;
        Ok(version.trim().to_string())
    }

    /// Newest modification of any file belonging to `database`.
    pub fn database_last_change(&self, database: &str) -> Result<DateTime<Local>> {
        Ok(last_change(&self.data_dir.path.join(database))?)
    }
}

/// Non-empty lines of a `show databases` listing without the system schemas.
pub fn parse_databases(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|db| !db.is_empty() && !SYSTEM_DATABASES.contains(db))
        .map(str::to_string)
        .collect()
}

/// Run the mysql client and return its stdout.
pub(crate) async fn query(mysql_bin: &str, args: &[&str]) -> Result<String> {
    let output = run_captured(Command::new(mysql_bin).args(args)).await?;
    if !output.success() {
        return Err(ArchiverError::Command(format!(
            "{} {} exited with code {}: {}",
            mysql_bin,
            args.join(" "),
            output.exit_code(),
            output.stderr.trim()
        )));
    }
    Ok(output.stdout)
}
