//! Reporting to Zabbix through `zabbix_sender`.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::ZabbixConfig;
use crate::executor::RunResult;
use crate::utils::logger::RunLog;
use crate::utils::process::run_captured;

/// Largest value the Zabbix server accepts for a text item.
pub const MAX_VALUE_BYTES: usize = 65536;

const DEFAULT_RETRIES: u32 = 10;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

pub struct ZabbixSender {
    config: ZabbixConfig,
    retries: u32,
    backoff: Duration,
}

impl ZabbixSender {
    pub fn new(config: ZabbixConfig) -> Self {
        Self {
            config,
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Number of attempts and base delay; the n-th retry waits `n * backoff`.
    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries.max(1);
        self.backoff = backoff;
        self
    }

    pub fn enabled(&self) -> bool {
        !self.config.item_key.is_empty()
    }

    /// Send one item value. Returns whether the sender accepted it.
    pub async fn send_value(&self, value: &str) -> bool {
        if !self.enabled() {
            return false;
        }

        let sender = &self.config.sender_bin;
        for attempt in 0..self.retries {
            let result = run_captured(
                Command::new(sender)
                    .arg("-c")
                    .arg(&self.config.agent_conf)
                    .arg("-k")
                    .arg(&self.config.item_key)
                    .arg("-o")
                    .arg(value),
            )
            .await;

            match result {
                Ok(output) if output.success() => {
                    info!("{}: sent successfully, item_key: {}", sender, self.config.item_key);
                    return true;
                }
                Ok(output) => warn!(
                    "{} failed: exit_code={}, stdout='{}', stderr='{}'",
                    sender,
                    output.exit_code(),
                    single_line(&output.stdout),
                    single_line(&output.stderr)
                ),
                Err(e) => warn!("{} failed: {}", sender, e),
            }

            if attempt + 1 < self.retries {
                let delay = self.backoff * (attempt + 1);
                warn!("Retrying {} in {:?}", sender, delay);
                tokio::time::sleep(delay).await;
            }
        }

        error!("{} failed: giving up after {} tries.", sender, self.retries);
        false
    }

    /// Send the summary of `result` followed by the run log.
    pub async fn send_log_file(&self, result: &RunResult, log: &RunLog) -> bool {
        if !self.enabled() {
            return false;
        }

        let log_name = log
            .path()
            .map(Path::display)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "the log file".to_string());
        let report = compose_report(result.summary(), &log.read(), &log_name, MAX_VALUE_BYTES);
        self.send_value(&report).await
    }
}

/// Summary plus log, cut line-wise to `max_bytes` with a notice pointing at
/// `log_name` when it does not fit.
pub fn compose_report(summary: &str, log: &str, log_name: &str, max_bytes: usize) -> String {
    let full = format!("{}\n{}", summary, log);
    if full.len() < max_bytes {
        return full;
    }

    let notice = format!(
        "\n** Zabbix item values has been truncated because it exceeds {} bytes.**\n\
         ** Refer to {} on the monitored host to get the full report.**\n",
        max_bytes, log_name
    );
    let budget = max_bytes.saturating_sub(notice.len());

    let mut report = String::new();
    for line in full.lines() {
        // Each kept line gains a leading space and a newline
        if report.len() + line.len() + 2 > budget {
            break;
        }
        report.push(' ');
        report.push_str(line);
        report.push('\n');
    }
    report.push_str(&notice);
    report
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], "")
}
