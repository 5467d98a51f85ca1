//! Metadata persisted inside every finished generation.
//!
//! `info.json` records how well the previous backup compressed so the next
//! run can size its expectations; `<item>.timestamp` files record when an
//! individual item was last backed up.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Ratio assumed when no previous generation left an `info.json`.
pub const DEFAULT_COMPRESSION_RATIO: f64 = 0.5;

/// Format written to `<item>.timestamp` files.
pub const ITEM_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Serialized as `info.json` in each generation directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub mysql_data_dir_bytes_used: u64,
    pub backup_bytes_used: u64,
    pub compression_ratio: f64,
}

impl BackupInfo {
    /// Build the record for a finished backup. A zero-sized source yields a
    /// ratio of 0.
    pub fn new(mysql_data_dir_bytes_used: u64, backup_bytes_used: u64) -> Self {
        let compression_ratio = if mysql_data_dir_bytes_used == 0 {
            0.0
        } else {
            backup_bytes_used as f64 / mysql_data_dir_bytes_used as f64
        };

        Self {
            mysql_data_dir_bytes_used,
            backup_bytes_used,
            compression_ratio,
        }
    }

    /// Expected size of a new backup of `source_bytes` at this ratio.
    pub fn estimated_backup_bytes(&self, source_bytes: u64) -> u64 {
        (source_bytes as f64 * self.compression_ratio).ceil() as u64
    }
}

impl Default for BackupInfo {
    fn default() -> Self {
        Self {
            mysql_data_dir_bytes_used: 0,
            backup_bytes_used: 0,
            compression_ratio: DEFAULT_COMPRESSION_RATIO,
        }
    }
}

/// Backup time reported for items that were never backed up.
pub fn never_backed_up() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

pub fn format_item_time(time: &NaiveDateTime) -> String {
    time.format(ITEM_TIME_FORMAT).to_string()
}

/// Parse an ISO-8601 datetime with optional fractional seconds.
pub fn parse_item_time(text: &str) -> Option<NaiveDateTime> {
    text.trim().parse::<NaiveDateTime>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_ratio() {
        let info = BackupInfo::new(1000, 250);
        assert!((info.compression_ratio - 0.25).abs() < f64::EPSILON);
        assert_eq!(info.estimated_backup_bytes(4000), 1000);
    }

    #[test]
    fn test_zero_source_ratio() {
        let info = BackupInfo::new(0, 500);
        assert_eq!(info.compression_ratio, 0.0);
        assert_eq!(info.backup_bytes_used, 500);
    }

    #[test]
    fn test_default_ratio() {
        let info = BackupInfo::default();
        assert_eq!(info.compression_ratio, DEFAULT_COMPRESSION_RATIO);
        assert_eq!(info.mysql_data_dir_bytes_used, 0);
    }

    #[test]
    fn test_json_field_names() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(BackupInfo::new(10, 5))?;
        assert_eq!(json["mysql_data_dir_bytes_used"], 10);
        assert_eq!(json["backup_bytes_used"], 5);
        assert_eq!(json["compression_ratio"], 0.5);
        Ok(())
    }

    #[test]
    fn test_item_time_formats() {
        let sentinel = never_backed_up();
        assert_eq!(format_item_time(&sentinel), "1900-01-01T00:00:00.000000");

        assert_eq!(parse_item_time("2023-10-01T12:00:00\n"), Some(
            NaiveDate::from_ymd_opt(2023, 10, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap()
        ));
        assert!(parse_item_time("2023-10-01T12:00:00.123456").is_some());
        assert!(parse_item_time("yesterday").is_none());
    }
}
