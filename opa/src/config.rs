//! Configuration management for the archiver.
//!
//! Loads the TOML configuration file and rejects combinations that would make
//! a run pointless or ambiguous.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{ArchiverError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/opa/opa.conf";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub main: MainConfig,
    pub zabbix: ZabbixConfig,
    pub conditions: ConditionsConfig,
}

/// Shape of the file on disk; sections are checked before building [`Config`].
#[derive(Debug, Deserialize)]
struct RawConfig {
    main: Option<MainConfig>,
    #[serde(default)]
    zabbix: ZabbixConfig,
    #[serde(default)]
    conditions: ConditionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    /// Root directory holding all backup generations
    #[serde(default)]
    pub backup_dir: PathBuf,

    /// xtrabackup worker threads (0 = all cores, negative = cores minus N)
    #[serde(default = "default_parallelism")]
    pub parallelism: i32,

    /// Number of generations to keep
    #[serde(default = "default_versions")]
    pub versions: usize,

    /// Prune old generations before the backup instead of after it
    #[serde(default)]
    pub delete_before: bool,

    /// Link kind used when reusing artifacts of the previous generation
    #[serde(default)]
    pub link_type: LinkType,

    #[serde(default = "default_xtrabackup_bin")]
    pub xtrabackup_bin: String,

    #[serde(default = "default_mysql_bin")]
    pub mysql_bin: String,

    /// Extra arguments appended to every backup invocation
    #[serde(default)]
    pub xtrabackup_options: Vec<String>,

    #[serde(default)]
    pub streamcompress: bool,

    #[serde(default)]
    pub prepare: bool,

    #[serde(default)]
    pub tgz: bool,

    /// Log level (debug, info, warning, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub check_xtrabackup_version: bool,

    /// Abort the run when the version check fails instead of only warning
    #[serde(default = "default_true")]
    pub strict_version_check: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    #[default]
    Hard,
    Symbolic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZabbixConfig {
    /// Item key; reporting is disabled while empty
    #[serde(default)]
    pub item_key: String,

    #[serde(default = "default_sender_bin")]
    pub sender_bin: String,

    #[serde(default = "default_agent_conf")]
    pub agent_conf: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionsConfig {
    #[serde(default)]
    pub skip_conditions: Vec<String>,

    /// Seconds, 0 = no timeout
    #[serde(default)]
    pub skip_conditions_timeout: u64,

    #[serde(default)]
    pub run_conditions: Vec<String>,

    #[serde(default)]
    pub run_conditions_timeout: u64,

    #[serde(default)]
    pub terminate_conditions: Vec<String>,

    #[serde(default)]
    pub terminate_conditions_timeout: u64,
}

// Default values
fn default_parallelism() -> i32 {
    num_cpus::get() as i32
}

fn default_versions() -> usize {
    1
}

fn default_xtrabackup_bin() -> String {
    "xtrabackup".to_string()
}

fn default_mysql_bin() -> String {
    "mysql".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sender_bin() -> String {
    "zabbix_sender".to_string()
}

fn default_agent_conf() -> String {
    "/etc/zabbix/zabbix_agentd.conf".to_string()
}

impl Default for ZabbixConfig {
    fn default() -> Self {
        Self {
            item_key: String::new(),
            sender_bin: default_sender_bin(),
            agent_conf: default_agent_conf(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ArchiverError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| ArchiverError::Config(format!("Error parsing TOML file: {}", e)))?;

        let main = raw.main.ok_or_else(|| {
            ArchiverError::Config("Missing 'main' section in configuration file".to_string())
        })?;

        let config = Config {
            main,
            zabbix: raw.zabbix,
            conditions: raw.conditions,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let main = &self.main;

        if main.backup_dir.as_os_str().is_empty() {
            return Err(ArchiverError::Config(
                "Required setting 'backup_dir' is missing".to_string(),
            ));
        }
        if !main.backup_dir.is_dir() {
            return Err(ArchiverError::Config(format!(
                "Backup directory does not exist: {}",
                main.backup_dir.display()
            )));
        }
        if main.streamcompress && (main.prepare || main.tgz) {
            return Err(ArchiverError::Config(
                "streamcompress is mutually exclusive with prepare and tgz options".to_string(),
            ));
        }
        if main.versions == 0 {
            return Err(ArchiverError::Config(
                "Versions must keep at least one backup".to_string(),
            ));
        }
        if main.parallelism == 0 {
            return Err(ArchiverError::Config("Parallelism cannot be zero".to_string()));
        }

        Ok(())
    }
}
