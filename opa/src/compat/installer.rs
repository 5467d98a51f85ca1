//! Installer script for the matching xtrabackup package.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::Result;

const TMP_FILE: &str = "/tmp/percona-xtrabackup.deb";

/// Shell script that downloads and installs the package at `download_url`.
pub fn installer_script(download_url: &str, version: &str) -> String {
    format!(
        r#"#!/bin/sh
# Install percona xtrabackup version {version}
# Generated by opa --validate --create-installer

TMP_FILE="{TMP_FILE}"

echo "Downloading percona xtrabackup version {version}"
test -e "$TMP_FILE" && rm -f "$TMP_FILE"
curl --fail -ls -o "$TMP_FILE" "{download_url}"
if [ $? -ne 0 ]; then
    echo "Download of {download_url} failed"
    rm -f "$TMP_FILE"
    exit 1
fi

echo "Installing percona xtrabackup version {version}"
DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends "$TMP_FILE"
if [ $? -ne 0 ]; then
    echo "Installation of $TMP_FILE failed"
    rm -f "$TMP_FILE"
    exit 1
fi

rm -f "$TMP_FILE"
echo "XtraBackup {version} installed successfully"
"#
    )
}

/// Write the installer script to `path` and make it executable.
pub fn write_installer(path: &Path, download_url: &str, version: &str) -> Result<()> {
    fs::write(path, installer_script(download_url, version))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }

    info!("Created installer script: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str = "https://downloads.percona.com/downloads/Percona-XtraBackup-8.0/xtrabackup.deb";

    #[test]
    fn test_script_content() {
        let script = installer_script(URL, "8.0");

        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains("percona xtrabackup version 8.0"));
        assert!(script.contains(URL));
        assert!(script.contains(r#"TMP_FILE="/tmp/percona-xtrabackup.deb""#));
        assert!(script.contains(r#"test -e "$TMP_FILE""#));
        assert!(script.contains("curl --fail -ls"));
        assert!(script.contains("DEBIAN_FRONTEND=noninteractive"));
        assert!(script.contains("apt-get install -y --no-install-recommends"));
        assert!(script.contains("if [ $? -ne 0 ]"));
        assert!(script.contains("exit 1"));
        assert!(script.contains(r#"rm -f "$TMP_FILE""#));
        assert!(script.contains("XtraBackup 8.0 installed successfully"));
    }

    #[test]
    fn test_write_installer_is_executable() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("install-xtrabackup.sh");
        write_installer(&path, URL, "2.4")?;

        let mode = fs::metadata(&path)?.permissions().mode();
        assert_ne!(mode & 0o111, 0);
        assert!(fs::read_to_string(&path)?.contains("version 2.4"));
        Ok(())
    }

    #[test]
    fn test_write_installer_missing_directory() {
        assert!(write_installer(Path::new("/nonexistent/dir/script.sh"), URL, "8.0").is_err());
    }
}
