//! opa - Optimized Percona-XtraBackup Archiver
//!
//! Wraps xtrabackup with timestamped backup generations, retention, a
//! free-space preflight and reporting to Zabbix.

pub mod compat;
pub mod conditions;
pub mod config;
pub mod executor;
pub mod fs;
pub mod monitor;
pub mod mysql;
pub mod runner;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::RunResult;
pub use utils::errors::{ArchiverError, Result};
