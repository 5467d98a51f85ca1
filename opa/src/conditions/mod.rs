//! Operator supplied shell commands that gate or follow a run.
//!
//! Skip conditions end the run successfully when one of them exits 0, run
//! conditions abort it unless all of them exit 0, and terminate conditions run
//! after the backup without influencing its outcome.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::ConditionsConfig;
use crate::utils::process::{run_captured, CommandOutput};

/// Environment variable carrying the current generation to terminate hooks.
pub const CURRENT_DIR_ENV: &str = "OPA_CURRENT_DIR";

const SHELL: &str = "/bin/sh";

pub struct ConditionRunner {
    config: ConditionsConfig,
}

impl ConditionRunner {
    pub fn new(config: ConditionsConfig) -> Self {
        Self { config }
    }

    /// True when any skip condition exits 0.
    pub async fn check_skip_conditions(&self) -> bool {
        if self.config.skip_conditions.is_empty() {
            return false;
        }

        info!("Checking skip conditions...");
        for command in &self.config.skip_conditions {
            let output = execute(command, self.config.skip_conditions_timeout, None).await;

            if output.success() {
                info!("Skip condition met: '{}' (exit code: 0)", command);
                if !output.stdout.trim().is_empty() {
                    debug!("Skip condition stdout: '{}'", output.stdout.trim());
                }
                return true;
            }

            debug!(
                "Skip condition not met: '{}' (exit code: {})",
                command,
                output.exit_code()
            );
            if !output.stderr.trim().is_empty() {
                debug!("Skip condition stderr: '{}'", output.stderr.trim());
            }
        }

        info!("No skip conditions met, proceeding with backup");
        false
    }

    /// True when every run condition exits 0.
    pub async fn check_run_conditions(&self) -> bool {
        for command in &self.config.run_conditions {
            let output = execute(command, self.config.run_conditions_timeout, None).await;

            if !output.success() {
                error!(
                    "Run condition failed: '{}' (exit code: {})",
                    command,
                    output.exit_code()
                );
                if !output.stderr.trim().is_empty() {
                    error!("Run condition stderr: {}", output.stderr.trim());
                }
                return false;
            }

            debug!("Run condition passed: '{}' (exit code: 0)", command);
        }

        if !self.config.run_conditions.is_empty() {
            info!("All run conditions met");
        }
        true
    }

    /// Run every terminate condition with [`CURRENT_DIR_ENV`] set to
    /// `current_dir`. Returns whether all of them exited 0.
    pub async fn execute_terminate_conditions(&self, current_dir: &Path) -> bool {
        if self.config.terminate_conditions.is_empty() {
            return true;
        }

        let mut all_success = true;
        for command in &self.config.terminate_conditions {
            let output = execute(
                command,
                self.config.terminate_conditions_timeout,
                Some(current_dir),
            )
            .await;

            if output.success() {
                info!("Terminate condition succeeded: '{}'", command);
                if !output.stdout.trim().is_empty() {
                    debug!("Terminate condition stdout: {}", output.stdout.trim());
                }
            } else {
                error!(
                    "Terminate condition failed: '{}' (exit code: {})",
                    command,
                    output.exit_code()
                );
                if !output.stderr.trim().is_empty() {
                    error!("Terminate condition stderr: {}", output.stderr.trim());
                }
                all_success = false;
            }
        }

        if all_success {
            info!("All terminate conditions succeeded");
        } else {
            error!("One or more terminate conditions failed");
        }
        all_success
    }
}

/// Run `command` under `/bin/sh -c`. A timeout (0 = none) or a spawn error
/// yields exit code 1; a timed out child is killed.
async fn execute(command: &str, timeout_secs: u64, current_dir: Option<&Path>) -> CommandOutput {
    let mut cmd = Command::new(SHELL);
    cmd.arg("-c").arg(command).kill_on_drop(true);
    if let Some(dir) = current_dir {
        cmd.env(CURRENT_DIR_ENV, dir);
    }

    let result = if timeout_secs > 0 {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), run_captured(&mut cmd)).await {
            Ok(result) => result,
            Err(_) => {
                error!("Command timed out after {} seconds: '{}'", timeout_secs, command);
                return CommandOutput {
                    code: Some(1),
                    stdout: String::new(),
                    stderr: format!("Command timed out after {} seconds", timeout_secs),
                };
            }
        }
    } else {
        run_captured(&mut cmd).await
    };

    result.unwrap_or_else(|e| {
        error!("Failed to execute command '{}': {}", command, e);
        CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: e.to_string(),
        }
    })
}
