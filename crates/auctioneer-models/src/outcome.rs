//! Run outcome records.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};

/// Acknowledgement field listing non-fatal issues.
pub const WARNINGS_FIELD: &str = "Warnings";

/// Acknowledgement field listing failures.
pub const ERRORS_FIELD: &str = "Errors";

/// Unique identifier for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary of one rule run, built once from the acknowledgements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunOutcome {
    pub task_id: TaskId,
    pub rule_id: i64,
    /// Keyword bid updates submitted to the write
    pub records_total: usize,
    /// Acknowledgement records returned by the write
    pub acknowledged: usize,
    /// Warning items across all acknowledgements
    pub warnings: usize,
    /// Error items across all acknowledgements
    pub errors: usize,
    /// Acknowledgements carrying neither warnings nor errors
    pub successes: usize,
    pub is_ok: bool,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    /// Build an outcome from write acknowledgements.
    pub fn from_acknowledgements(
        task_id: TaskId,
        rule_id: i64,
        records_total: usize,
        acknowledgements: &[Value],
    ) -> ModelResult<Self> {
        let mut warnings = 0;
        let mut errors = 0;
        let mut successes = 0;

        for ack in acknowledgements {
            let ack_warnings = issue_count(ack, WARNINGS_FIELD);
            let ack_errors = issue_count(ack, ERRORS_FIELD);
            if ack_warnings == 0 && ack_errors == 0 {
                successes += 1;
            }
            warnings += ack_warnings;
            errors += ack_errors;
        }

        let outcome = Self {
            task_id,
            rule_id,
            records_total,
            acknowledged: acknowledgements.len(),
            warnings,
            errors,
            successes,
            is_ok: warnings == 0 && errors == 0 && successes > 0,
            finished_at: Utc::now(),
        };
        outcome.validate()?;
        Ok(outcome)
    }

    /// Check internal consistency of the counters.
    pub fn validate(&self) -> ModelResult<()> {
        if self.successes > self.acknowledged {
            return Err(ModelError::InvalidOutcome(format!(
                "successes ({}) exceed acknowledgements ({})",
                self.successes, self.acknowledged
            )));
        }

        let expected_ok = self.warnings == 0 && self.errors == 0 && self.successes > 0;
        if self.is_ok != expected_ok {
            return Err(ModelError::InvalidOutcome(format!(
                "is_ok={} does not match counters (warnings={}, errors={}, successes={})",
                self.is_ok, self.warnings, self.errors, self.successes
            )));
        }

        Ok(())
    }
}

fn issue_count(ack: &Value, field: &str) -> usize {
    ack.get(field)
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_acknowledgements() {
        let acks = vec![json!({"KeywordId": 1}), json!({"KeywordId": 2})];
        let outcome = RunOutcome::from_acknowledgements(TaskId::new(), 5, 2, &acks).unwrap();
        assert_eq!(outcome.acknowledged, 2);
        assert_eq!(outcome.successes, 2);
        assert_eq!(outcome.warnings, 0);
        assert!(outcome.is_ok);
    }

    #[test]
    fn test_counts_warning_and_error_items() {
        let acks = vec![
            json!({"KeywordId": 1, "Warnings": [{"Code": 10000}, {"Code": 10001}]}),
            json!({"KeywordId": 2, "Errors": [{"Code": 8800}]}),
            json!({"KeywordId": 3}),
        ];
        let outcome = RunOutcome::from_acknowledgements(TaskId::new(), 5, 3, &acks).unwrap();
        assert_eq!(outcome.warnings, 2);
        assert_eq!(outcome.errors, 1);
        assert_eq!(outcome.successes, 1);
        assert!(!outcome.is_ok);
    }

    #[test]
    fn test_empty_acknowledgements_are_not_ok() {
        let outcome = RunOutcome::from_acknowledgements(TaskId::new(), 5, 0, &[]).unwrap();
        assert_eq!(outcome.successes, 0);
        assert!(!outcome.is_ok);
    }

    #[test]
    fn test_validate_rejects_inconsistent_counters() {
        let mut outcome =
            RunOutcome::from_acknowledgements(TaskId::from_string("t-1"), 5, 1, &[json!({})])
                .unwrap();
        outcome.is_ok = false;
        assert!(matches!(outcome.validate(), Err(ModelError::InvalidOutcome(_))));

        outcome.is_ok = true;
        outcome.successes = 4;
        assert!(outcome.validate().is_err());
    }

    #[test]
    fn test_task_id_is_transparent() {
        let id = TaskId::from_string("abc");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("abc"));
        assert_eq!(id.to_string(), "abc");
    }
}
