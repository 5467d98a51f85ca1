//! Invocations of xtrabackup and the archive tools.
//!
//! Every step reports `Ok(false)` for a run that finished unsuccessfully and
//! `Err` when the process could not be driven at all.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::utils::process::{find_in_path, render, run_captured, CommandOutput};

/// Marker xtrabackup prints when it really finished.
pub const COMPLETION_MARKER: &str = "completed OK!";

pub const BACKUP_DIR: &str = "backup";
pub const STREAM_FILE: &str = "backup.xbstream";
pub const ARCHIVE_FILE: &str = "backup.tar.gz";

/// xtrabackup bound to one generation directory.
#[derive(Debug, Clone)]
pub struct XtraBackup {
    bin: String,
    options: Vec<String>,
    parallelism: usize,
    generation: PathBuf,
    tar: PathBuf,
    pigz: Option<PathBuf>,
}

impl XtraBackup {
    pub fn new(bin: &str, options: &[String], parallelism: usize, generation: &Path) -> Self {
        Self {
            bin: bin.to_string(),
            options: options.to_vec(),
            parallelism,
            generation: generation.to_path_buf(),
            tar: PathBuf::from("tar"),
            pigz: find_in_path("pigz"),
        }
    }

    /// Use other archive tools; `pigz: None` falls back to `tar -z`.
    pub fn with_archivers(mut self, tar: impl Into<PathBuf>, pigz: Option<PathBuf>) -> Self {
        self.tar = tar.into();
        self.pigz = pigz;
        self
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.generation.join(BACKUP_DIR)
    }

    pub fn stream_file(&self) -> PathBuf {
        self.generation.join(STREAM_FILE)
    }

    pub fn archive_file(&self) -> PathBuf {
        self.generation.join(ARCHIVE_FILE)
    }

    fn backup_args(&self) -> Vec<String> {
        let mut args = vec![
            "--backup".to_string(),
            format!("--target-dir={}", self.backup_dir().display()),
            format!("--parallel={}", self.parallelism),
        ];
        args.extend(self.options.iter().cloned());
        args
    }

    fn prepare_args(&self) -> Vec<String> {
        vec![
            "--prepare".to_string(),
            format!("--target-dir={}", self.backup_dir().display()),
        ]
    }

    fn stream_args(&self) -> Vec<String> {
        let mut args = vec![
            "--backup".to_string(),
            "--stream=xbstream".to_string(),
            "--compress".to_string(),
            format!("--compress-threads={}", self.parallelism),
            format!("--parallel={}", self.parallelism),
        ];
        args.extend(self.options.iter().cloned());
        args
    }

    /// Copy the data directory into `<generation>/backup`.
    pub async fn backup(&self) -> io::Result<bool> {
        let args = self.backup_args();
        info!("Executing XtraBackup command: {}", render(&self.bin, &args));

        let output = run_captured(Command::new(&self.bin).args(&args)).await?;
        Ok(completed("backup", &output))
    }

    /// Apply the redo log to the copied data.
    pub async fn prepare(&self) -> io::Result<bool> {
        let backup_dir = self.backup_dir();
        if !backup_dir.is_dir() {
            error!("Backup directory does not exist: {}", backup_dir.display());
            return Ok(false);
        }

        let args = self.prepare_args();
        info!("Executing XtraBackup prepare command: {}", render(&self.bin, &args));

        let output = run_captured(Command::new(&self.bin).args(&args)).await?;
        Ok(completed("prepare", &output))
    }

    /// Stream a compressed backup straight into `backup.xbstream`.
    pub async fn stream_compressed(&self) -> io::Result<bool> {
        let output_file = self.stream_file();
        let args = self.stream_args();
        info!("Executing XtraBackup streamcompress to {}", output_file.display());
        debug!("Command: {}", render(&self.bin, &args));

        let sink = File::create(&output_file)?;
        let output = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(sink))
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            error!(
                "XtraBackup streamcompress failed with return code {}",
                output.status.code().unwrap_or(1)
            );
            error!("Error output: {}", String::from_utf8_lossy(&output.stderr));
            return Ok(false);
        }

        if non_empty_file(&output_file) {
            info!("XtraBackup streamcompress completed successfully: {}", output_file.display());
            Ok(true)
        } else {
            error!("XtraBackup streamcompress failed - output file is empty or missing");
            Ok(false)
        }
    }

    /// Pack `<generation>/backup` into `backup.tar.gz` and drop the directory.
    pub async fn archive(&self) -> io::Result<bool> {
        let backup_dir = self.backup_dir();
        if !backup_dir.is_dir() {
            error!("Backup directory does not exist: {}", backup_dir.display());
            return Ok(false);
        }

        let output_file = self.archive_file();
        let ok = match &self.pigz {
            Some(pigz) => {
                info!("Compressing backup with pigz using {} threads", self.parallelism);
                self.tar_through(pigz, &output_file).await?
            }
            None => {
                info!("Compressing backup with gzip (pigz not available)");
                self.tar_gzip(&output_file).await?
            }
        };

        if !ok {
            return Ok(false);
        }

        if !non_empty_file(&output_file) {
            error!("Compression failed - output file is empty or missing");
            return Ok(false);
        }

        fs::remove_dir_all(&backup_dir)?;
        info!("Backup compressed successfully to {}", output_file.display());
        Ok(true)
    }

    /// `tar -cf - -C <generation> backup | pigz -p <n> > <output>`
    async fn tar_through(&self, pigz: &Path, output_file: &Path) -> io::Result<bool> {
        let mut tar = Command::new(&self.tar)
            .arg("-cf")
            .arg("-")
            .arg("-C")
            .arg(&self.generation)
            .arg(BACKUP_DIR)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let tar_stdout: Stdio = tar
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("tar stdout not captured"))?
            .try_into()?;

        let sink = File::create(output_file)?;
        let compressor = Command::new(pigz)
            .arg("-p")
            .arg(self.parallelism.to_string())
            .stdin(tar_stdout)
            .stdout(Stdio::from(sink))
            .stderr(Stdio::piped())
            .spawn()?;

        let tar_output = tar.wait_with_output().await?;
        let pigz_output = compressor.wait_with_output().await?;

        for (name, output) in [("tar", &tar_output), ("pigz", &pigz_output)] {
            if !output.status.success() {
                error!(
                    "Compression failed: {} exited with code {}",
                    name,
                    output.status.code().unwrap_or(1)
                );
                error!("Error output: {}", String::from_utf8_lossy(&output.stderr));
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `tar -czf <output> -C <generation> backup`
    async fn tar_gzip(&self, output_file: &Path) -> io::Result<bool> {
        let mut cmd = Command::new(&self.tar);
        cmd.arg("-czf")
            .arg(output_file)
            .arg("-C")
            .arg(&self.generation)
            .arg(BACKUP_DIR);
        debug!("Compression command: {:?}", cmd.as_std());

        let output = run_captured(&mut cmd).await?;
        if !output.success() {
            error!("Compression failed with return code {}", output.exit_code());
            error!("Error output: {}", output.stderr);
            return Ok(false);
        }
        Ok(true)
    }
}

/// Exit code first, then the completion marker on either stream.
pub fn completed(step: &str, output: &CommandOutput) -> bool {
    if !output.success() {
        error!("XtraBackup {} failed with return code {}", step, output.exit_code());
        error!("Error output: {}", output.stderr);
        return false;
    }

    if output.contains(COMPLETION_MARKER) {
        info!("XtraBackup {} completed successfully", step);
        true
    } else {
        error!("XtraBackup {} did not complete successfully", step);
        false
    }
}

fn non_empty_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: Option<i32>, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_completed_requires_exit_code_and_marker() {
        assert!(completed("backup", &output(Some(0), "", "231201 completed OK!")));
        assert!(completed("backup", &output(Some(0), "completed OK!", "")));
        assert!(!completed("backup", &output(Some(0), "done", "")));
        assert!(!completed("backup", &output(Some(1), "completed OK!", "")));
        assert!(!completed("backup", &output(None, "completed OK!", "")));
    }

    #[test]
    fn test_argument_lists() {
        let xb = XtraBackup::new(
            "/usr/bin/xtrabackup",
            &["--user=backup".to_string()],
            4,
            Path::new("/srv/opa/opa_20240301-120000"),
        );

        assert_eq!(
            xb.backup_args(),
            vec![
                "--backup",
                "--target-dir=/srv/opa/opa_20240301-120000/backup",
                "--parallel=4",
                "--user=backup",
            ]
        );
        assert_eq!(
            xb.prepare_args(),
            vec!["--prepare", "--target-dir=/srv/opa/opa_20240301-120000/backup"]
        );
        assert_eq!(
            xb.stream_args(),
            vec![
                "--backup",
                "--stream=xbstream",
                "--compress",
                "--compress-threads=4",
                "--parallel=4",
                "--user=backup",
            ]
        );
    }

    fn tool(dir: &Path, name: &str, body: &str) -> io::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    fn with_backup_dir(generation: &Path) -> io::Result<XtraBackup> {
        let xb = XtraBackup::new("/nonexistent/xtrabackup", &[], 2, generation);
        fs::create_dir_all(xb.backup_dir())?;
        fs::write(xb.backup_dir().join("ibdata1"), b"data")?;
        Ok(xb)
    }

    #[tokio::test]
    async fn test_archive_failure_keeps_backup_dir() -> io::Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let tools = temp_dir.path().join("bin");
        let generation = temp_dir.path().join("opa_20240301-120000");
        fs::create_dir_all(&tools)?;

        let broken_tar = tool(&tools, "tar", "echo 'tar: write error' >&2; exit 2")?;
        let xb = with_backup_dir(&generation)?.with_archivers(&broken_tar, None);
        assert!(!xb.archive().await?);
        assert!(xb.backup_dir().join("ibdata1").exists());

        let tar = tool(&tools, "tar-ok", "printf 'tar-stream'")?;
        let broken_pigz = tool(&tools, "pigz", "cat > /dev/null; exit 1")?;
        let xb = xb.with_archivers(&tar, Some(broken_pigz));
        assert!(!xb.archive().await?);
        assert!(xb.backup_dir().join("ibdata1").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_archive_through_compressor() -> io::Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let tools = temp_dir.path().join("bin");
        let generation = temp_dir.path().join("opa_20240301-120000");
        fs::create_dir_all(&tools)?;

        let tar = tool(&tools, "tar", "printf 'tar-stream'")?;
        let pigz = tool(&tools, "pigz", "cat")?;
        let xb = with_backup_dir(&generation)?.with_archivers(&tar, Some(pigz));

        assert!(xb.archive().await?);
        assert_eq!(fs::read(xb.archive_file())?, b"tar-stream");
        assert!(!xb.backup_dir().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_prepare_without_backup_dir() -> io::Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let xb = XtraBackup::new("/nonexistent/xtrabackup", &[], 1, temp_dir.path());
        assert!(!xb.prepare().await?);
        assert!(!xb.archive().await?);
        Ok(())
    }
}
