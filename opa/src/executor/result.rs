//! Outcome of a backup run.

use serde::Serialize;

/// Counters and skip flags reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub successful: u32,
    pub failed: u32,
    pub total: u32,
    pub all_skipped_successfully: bool,
    pub all_skipped_faulty: bool,
}

impl Default for RunResult {
    fn default() -> Self {
        Self {
            successful: 0,
            failed: 0,
            total: 1,
            all_skipped_successfully: false,
            all_skipped_faulty: false,
        }
    }
}

impl RunResult {
    pub fn succeeded() -> Self {
        Self {
            successful: 1,
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            failed: 1,
            ..Self::default()
        }
    }

    /// Skip conditions matched; nothing to do.
    pub fn skipped_successfully() -> Self {
        Self {
            all_skipped_successfully: true,
            ..Self::default()
        }
    }

    /// The run never started because a precondition failed.
    pub fn skipped_faulty() -> Self {
        Self {
            all_skipped_faulty: true,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.all_skipped_faulty
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// One-line summary placed at the top of the monitoring report.
    pub fn summary(&self) -> &'static str {
        if self.failed > 0 {
            "Summary: Backup failed. Error=1"
        } else if self.all_skipped_successfully {
            "Summary: Successfully skipped all databases due to skip_conditions. Error=0"
        } else if self.all_skipped_faulty {
            "Summary: All databases were skipped due to faulty run_conditions. Error=1"
        } else {
            "Summary: Successfully backed up all databases. Error=0"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_counts_one_attempt() {
        let result = RunResult::default();
        assert_eq!(result.total, 1);
        assert_eq!(result.successful, 0);
        assert_eq!(result.failed, 0);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunResult::succeeded().exit_code(), 0);
        assert_eq!(RunResult::skipped_successfully().exit_code(), 0);
        assert_eq!(RunResult::failed().exit_code(), 1);
        assert_eq!(RunResult::skipped_faulty().exit_code(), 1);
    }

    #[test]
    fn test_summary_lines() {
        assert!(RunResult::failed().summary().ends_with("Error=1"));
        assert!(RunResult::skipped_successfully()
            .summary()
            .contains("skip_conditions. Error=0"));
        assert!(RunResult::skipped_faulty()
            .summary()
            .contains("faulty run_conditions. Error=1"));
        assert_eq!(
            RunResult::succeeded().summary(),
            "Summary: Successfully backed up all databases. Error=0"
        );
    }
}
