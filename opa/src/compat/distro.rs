//! Linux distribution detection.

use std::path::Path;

use tokio::process::Command;

use crate::utils::process::run_captured;

pub const OS_RELEASE: &str = "/etc/os-release";
pub const UNKNOWN: &str = "unknown";

/// Distribution name (lowercase `ID`) and version (`VERSION_ID`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distro {
    pub name: String,
    pub version: String,
}

impl Distro {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN || self.version == UNKNOWN
    }
}

/// Extract `ID` and `VERSION_ID` from os-release content.
pub fn parse_os_release(content: &str) -> Option<Distro> {
    let mut id = None;
    let mut version_id = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        match key.trim() {
            "ID" if !value.is_empty() => id = Some(value.to_lowercase()),
            "VERSION_ID" if !value.is_empty() => version_id = Some(value.to_string()),
            _ => {}
        }
    }

    Some(Distro {
        name: id?,
        version: version_id?,
    })
}

/// Detect the running distribution: os-release first, `lsb_release` second.
pub async fn detect() -> Distro {
    detect_with(Path::new(OS_RELEASE), "lsb_release").await
}

pub async fn detect_with(os_release: &Path, lsb_release_bin: &str) -> Distro {
    if let Ok(content) = tokio::fs::read_to_string(os_release).await {
        if let Some(distro) = parse_os_release(&content) {
            return distro;
        }
    }

    let id = lsb_release(lsb_release_bin, "-si").await.map(|s| s.to_lowercase());
    let release = lsb_release(lsb_release_bin, "-sr").await;

    match (id, release) {
        (Some(name), Some(version)) => Distro { name, version },
        _ => Distro::unknown(),
    }
}

async fn lsb_release(bin: &str, flag: &str) -> Option<String> {
    let output = run_captured(Command::new(bin).arg(flag)).await.ok()?;
    let value = output.stdout.trim();
    (output.success() && !value.is_empty()).then(|| value.to_string())
}
