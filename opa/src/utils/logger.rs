//! Logging configuration using tracing.
//!
//! Every run writes its own log file into the current generation directory.
//! The subscriber is installed as a scoped default and lives exactly as long
//! as the [`RunLog`] that owns it.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::Result;

/// Map the configured level names onto tracing filter directives.
pub fn filter_directive(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warning" | "warn" => "warn",
        "error" | "critical" => "error",
        _ => "info",
    }
}

/// Build the event filter. `RUST_LOG` applies unless the level was `forced`
/// on the command line.
pub fn env_filter(level: &str, forced: bool) -> EnvFilter {
    select_filter(level, forced, std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

fn select_filter(level: &str, forced: bool, env: Option<&str>) -> EnvFilter {
    env.filter(|_| !forced)
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(filter_directive(level)).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Logging context of a single run.
pub struct RunLog {
    path: Option<PathBuf>,
    level: String,
    _guard: DefaultGuard,
}

impl RunLog {
    /// Install the run's subscriber. With `log_file` every event is appended
    /// to that file; without it events go to stdout.
    pub fn init(level: &str, forced: bool, log_file: Option<&Path>) -> Result<Self> {
        let filter = env_filter(level, forced);

        let guard = match log_file {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                let subscriber = tracing_subscriber::registry().with(filter).with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_target(false)
                        .with_writer(Mutex::new(file)),
                );
                tracing::subscriber::set_default(subscriber)
            }
            None => {
                let subscriber = tracing_subscriber::registry()
                    .with(filter)
                    .with(tracing_subscriber::fmt::layer().with_target(false));
                tracing::subscriber::set_default(subscriber)
            }
        };

        tracing::info!("Logger initialized with level: {}", level);

        Ok(Self {
            path: log_file.map(Path::to_path_buf),
            level: level.to_string(),
            _guard: guard,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    /// The log file was moved (the open handle keeps writing to it).
    pub fn relocate(&mut self, new_path: PathBuf) {
        self.path = Some(new_path);
    }

    /// Read the whole log written so far. Empty when logging to stdout.
    pub fn read(&self) -> String {
        match &self.path {
            Some(path) => fs::read_to_string(path).unwrap_or_default(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("warning"), "warn");
        assert_eq!(filter_directive("error"), "error");
        assert_eq!(filter_directive("CRITICAL"), "error");
        assert_eq!(filter_directive("bogus"), "info");
    }

    #[test]
    fn test_run_log_writes_and_relocates() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let log_path = temp_dir.path().join("opa.log");

        let mut log = RunLog::init("info", false, Some(&log_path))?;
        tracing::info!("first message");
        tracing::debug!("hidden message");

        let content = log.read();
        assert!(content.contains("Logger initialized with level: info"));
        assert!(content.contains("first message"));
        assert!(!content.contains("hidden message"));

        let moved = temp_dir.path().join("last.log");
        fs::rename(&log_path, &moved)?;
        log.relocate(moved.clone());
        tracing::warn!("after move");

        assert_eq!(log.path(), Some(moved.as_path()));
        assert!(log.read().contains("after move"));
        Ok(())
    }

    #[test]
    fn test_run_log_appends_to_existing_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let log_path = temp_dir.path().join("opa.log");
        fs::write(&log_path, "earlier run\n")?;

        let log = RunLog::init("info", false, Some(&log_path))?;
        tracing::info!("later run");

        let content = log.read();
        assert!(content.starts_with("earlier run\n"));
        assert!(content.contains("later run"));
        Ok(())
    }

    #[test]
    fn test_forced_level_ignores_environment() {
        let forced = select_filter("debug", true, Some("error"));
        assert_eq!(forced.max_level_hint(), Some(LevelFilter::DEBUG));

        let from_env = select_filter("debug", false, Some("error"));
        assert_eq!(from_env.max_level_hint(), Some(LevelFilter::ERROR));

        let from_config = select_filter("warning", false, None);
        assert_eq!(from_config.max_level_hint(), Some(LevelFilter::WARN));
    }
}
