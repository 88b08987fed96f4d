//! Structured run logging.
//!
//! Provides tracing subscriber setup for the worker binary and a small
//! helper that tags run lifecycle events with the rule and task ids.

use auctioneer_models::{RunOutcome, TaskId};
use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogFormat;

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, defaulting to `info` for the auctioneer crates.
/// Calling it twice is a no-op.
pub fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,auctioneer_worker=info,auctioneer_gateway=info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init(),
    };

    if result.is_err() {
        warn!("Tracing subscriber already installed");
    }
}

/// Logger for one rule run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    rule_id: i64,
    task_id: String,
}

impl RunLogger {
    pub fn new(rule_id: i64, task_id: &TaskId) -> Self {
        Self {
            rule_id,
            task_id: task_id.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(rule_id = self.rule_id, task_id = %self.task_id, "Run started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(rule_id = self.rule_id, task_id = %self.task_id, "Run progress: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(rule_id = self.rule_id, task_id = %self.task_id, "Run failed: {}", message);
    }

    /// Log the finished run, as a warning if the platform reported issues.
    pub fn log_outcome(&self, outcome: &RunOutcome) {
        if outcome.is_ok {
            info!(
                rule_id = self.rule_id,
                task_id = %self.task_id,
                records = outcome.records_total,
                successes = outcome.successes,
                "Run completed"
            );
        } else {
            warn!(
                rule_id = self.rule_id,
                task_id = %self.task_id,
                records = outcome.records_total,
                successes = outcome.successes,
                warnings = outcome.warnings,
                errors = outcome.errors,
                "Run completed with issues"
            );
        }
    }

    pub fn rule_id(&self) -> i64 {
        self.rule_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("rule_run", rule_id = self.rule_id, task_id = %self.task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let task_id = TaskId::from_string("task-1");
        let logger = RunLogger::new(42, &task_id);

        assert_eq!(logger.rule_id(), 42);
        assert_eq!(logger.task_id(), "task-1");
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing(LogFormat::Text);
        init_tracing(LogFormat::Json);
    }
}
