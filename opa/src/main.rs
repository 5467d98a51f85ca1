//! opa - main entry point
//!
//! Runs one backup per invocation, or only checks the xtrabackup setup with
//! `--validate`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use opa::config::{Config, DEFAULT_CONFIG_PATH};
use opa::runner;
use opa::utils::logger::RunLog;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Optimized Percona-XtraBackup Archiver - A smart wrapper around xtrabackup",
    long_about = None
)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Set log level to debug and override log level from config file
    #[arg(short, long)]
    debug: bool,

    /// Check that the installed xtrabackup matches the MySQL server and exit
    #[arg(long)]
    validate: bool,

    /// Write an installer script for the matching xtrabackup package
    #[arg(long, value_name = "FILE", requires = "validate")]
    create_installer: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)?;

    if args.validate {
        let _log = RunLog::init(runner::log_level(&config, args.debug), args.debug, None)?;
        let verdict = runner::validate_setup(&config, args.create_installer.as_deref())
            .await
            .context("Validation failed")?;

        if verdict.compatible {
            println!("OK: {}", verdict.message);
            return Ok(ExitCode::SUCCESS);
        }

        println!("ERROR: {}", verdict.message);
        if let (Some(path), Some(_)) = (&args.create_installer, &verdict.download_url) {
            println!("Installer script written to {}", path.display());
        }
        return Ok(ExitCode::FAILURE);
    }

    let result = runner::run_backup(&config, args.debug).await?;
    Ok(ExitCode::from(result.exit_code() as u8))
}
