//! Compatibility between the MySQL server and the installed xtrabackup.
//!
//! Versions are compared as `major.minor`. A failed check is reported as a
//! [`Compatibility`] value; whether it aborts the run is up to the caller.

pub mod distro;
pub mod installer;
pub mod table;

use std::io;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::mysql;
use crate::utils::process::run_captured;
use crate::{ArchiverError, Result};
pub use distro::Distro;
pub use installer::write_installer;
pub use table::{download_url, required_xtrabackup_version};

static MAJOR_MINOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+").expect("valid version pattern"));

static XTRABACKUP_BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"version\s+(\d+\.\d+)").expect("valid banner pattern"));

/// Outcome of a compatibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compatibility {
    pub compatible: bool,
    pub message: String,
    /// Package matching the server, when the check found one
    pub download_url: Option<String>,
    /// xtrabackup `major.minor` the server needs, if known
    pub required_version: Option<String>,
}

impl Compatibility {
    fn pass(message: String) -> Self {
        Self {
            compatible: true,
            message,
            download_url: None,
            required_version: None,
        }
    }

    fn fail(message: String, download_url: Option<String>) -> Self {
        Self {
            compatible: false,
            message,
            download_url,
            required_version: None,
        }
    }
}

/// `major.minor` from a server version string such as `8.0.36-0ubuntu0.22.04.1`.
pub fn parse_mysql_version(version: &str) -> Result<String> {
    MAJOR_MINOR
        .find(version)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            ArchiverError::VersionParse(format!(
                "Unable to parse MySQL version from: {}",
                version.trim()
            ))
        })
}

/// `major.minor` from the output of `xtrabackup --version`.
pub fn parse_xtrabackup_version(output: &str) -> Result<String> {
    XTRABACKUP_BANNER
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            ArchiverError::VersionParse(format!(
                "Unable to parse XtraBackup version from: {}",
                output.trim()
            ))
        })
}

/// Query the server version through the mysql client.
pub async fn mysql_version(mysql_bin: &str) -> Result<String> {
    let output = mysql::query(mysql_bin, mysql::VERSION_QUERY).await?;
    parse_mysql_version(&output)
}

/// Installed xtrabackup version, or `None` when the binary is missing or
/// refuses to run.
pub async fn xtrabackup_version(xtrabackup_bin: &str) -> Result<Option<String>> {
    let output = match run_captured(Command::new(xtrabackup_bin).arg("--version")).await {
        Ok(output) => output,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("XtraBackup binary not found: {}", xtrabackup_bin);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if !output.success() {
        debug!(
            "{} --version exited with code {}",
            xtrabackup_bin,
            output.exit_code()
        );
        return Ok(None);
    }

    // Some releases print the banner on stderr
    let combined = format!("{}{}", output.stdout, output.stderr);
    parse_xtrabackup_version(&combined).map(Some)
}

/// Decide whether `xtrabackup_version` fits `mysql_version`.
///
/// `distro` is only consulted when a download suggestion is needed.
pub fn validate(
    mysql_version: &str,
    xtrabackup_version: Option<&str>,
    distro: &Distro,
    xtrabackup_bin: &str,
) -> Compatibility {
    Compatibility {
        required_version: required_xtrabackup_version(mysql_version).map(str::to_string),
        ..verdict(mysql_version, xtrabackup_version, distro, xtrabackup_bin)
    }
}

fn verdict(
    mysql_version: &str,
    xtrabackup_version: Option<&str>,
    distro: &Distro,
    xtrabackup_bin: &str,
) -> Compatibility {
    let required = required_xtrabackup_version(mysql_version);

    let Some(installed) = xtrabackup_version else {
        let suggestion = required.and_then(|req| {
            download_url(mysql_version, &distro.name, &distro.version).map(|url| (req, url))
        });
        return match suggestion {
            Some((req, url)) => Compatibility::fail(
                format!(
                    "XtraBackup not found at '{}'. Download XtraBackup {} for MySQL {} from: {}",
                    xtrabackup_bin, req, mysql_version, url
                ),
                Some(url),
            ),
            None => Compatibility::fail(
                format!("XtraBackup not found at '{}'", xtrabackup_bin),
                None,
            ),
        };
    };

    let Some(required) = required else {
        return Compatibility::fail(
            format!(
                "MySQL version {} unknown, extend the compatibility table \
                 or disable check_xtrabackup_version in the opa.conf",
                mysql_version
            ),
            None,
        );
    };

    if installed == required {
        return Compatibility::pass(format!(
            "XtraBackup {} is compatible with MySQL {}",
            installed, mysql_version
        ));
    }

    let mismatch = format!(
        "XtraBackup {} is not compatible with MySQL {}. Required version: {}.",
        installed, mysql_version, required
    );

    if distro.is_unknown() {
        return Compatibility::fail(
            format!(
                "{} Linux distribution unknown, extend the compatibility table \
                 or disable check_xtrabackup_version in the opa.conf",
                mismatch
            ),
            None,
        );
    }

    match download_url(mysql_version, &distro.name, &distro.version) {
        Some(url) => Compatibility::fail(
            format!("{} Download the correct version from: {}", mismatch, url),
            Some(url),
        ),
        None => Compatibility::fail(
            format!(
                "{} Distribution {} {} or MySQL {} not found in the compatibility table, \
                 extend it or disable check_xtrabackup_version in the opa.conf",
                mismatch, distro.name, distro.version, mysql_version
            ),
            None,
        ),
    }
}

/// Query both versions and the distribution, then validate.
pub async fn check(mysql_bin: &str, xtrabackup_bin: &str) -> Result<Compatibility> {
    let mysql = mysql_version(mysql_bin).await?;
    let xtrabackup = xtrabackup_version(xtrabackup_bin).await?;
    let distro = distro::detect().await;

    debug!(
        "Compatibility input: mysql={}, xtrabackup={:?}, distro={} {}",
        mysql, xtrabackup, distro.name, distro.version
    );

    let verdict = validate(&mysql, xtrabackup.as_deref(), &distro, xtrabackup_bin);
    if !verdict.compatible {
        warn!("{}", verdict.message);
    }
    Ok(verdict)
}
