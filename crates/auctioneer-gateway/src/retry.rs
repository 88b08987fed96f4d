//! Soft-error retry.
//!
//! The platform reports some transient failures in-band: an HTTP 200 body
//! whose payload carries an `error_code`. [`with_soft_retry`] watches a record
//! stream for such codes and restarts the whole operation with escalating
//! backoff. Records yielded before a restart may be yielded again, so the
//! wrapped operation must be safe to re-run from the beginning.

use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SoftRetryConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics::record_soft_retry;

/// Field carrying an in-band error code.
pub const ERROR_CODE_FIELD: &str = "error_code";

/// In-band error code of a record, if any.
pub fn error_code(record: &Value) -> Option<i64> {
    let code = record.get(ERROR_CODE_FIELD)?;
    code.as_i64()
        .or_else(|| code.as_str().and_then(|s| s.trim().parse().ok()))
}

fn backoff_for(config: &SoftRetryConfig, retries: u32, record: Value) -> GatewayResult<Duration> {
    if retries > config.max_retries {
        return Err(GatewayError::MaxRetry {
            attempts: config.max_retries,
            last_error: record,
        });
    }
    Ok(config.delay(retries))
}

/// Wrap a record-producing operation with soft-error retry.
///
/// `pass` is called once per attempt and must build a fresh stream. Retry
/// state lives in the returned stream, so every call starts from zero.
pub fn with_soft_retry<F, S>(
    config: SoftRetryConfig,
    operation: &'static str,
    pass: F,
) -> impl Stream<Item = GatewayResult<Value>> + Send + 'static
where
    F: Fn() -> S + Send + Sync + 'static,
    S: Stream<Item = GatewayResult<Value>> + Send + 'static,
{
    try_stream! {
        let mut retries: u32 = 0;

        'attempt: loop {
            let mut records = Box::pin(pass());

            while let Some(record) = records.next().await {
                let record = record?;

                let code = match error_code(&record) {
                    Some(code) if config.is_retryable(code) => code,
                    _ => {
                        yield record;
                        continue;
                    }
                };

                retries += 1;
                debug!(operation, reason = %record, "Soft error received");
                let delay = backoff_for(&config, retries, record)?;

                warn!(
                    operation,
                    code,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "Ad platform returned a soft error, restarting operation"
                );
                record_soft_retry(operation, code);

                tokio::time::sleep(delay).await;
                continue 'attempt;
            }

            break;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::stream;
    use serde_json::json;

    use super::*;

    fn fast_config() -> SoftRetryConfig {
        SoftRetryConfig {
            backoff_factor: Duration::from_millis(1),
            ..SoftRetryConfig::default()
        }
    }

    /// Operation whose n-th pass yields `script[n]` (the last entry repeats).
    fn scripted(
        script: Vec<Vec<Value>>,
    ) -> (Arc<AtomicUsize>, impl Fn() -> stream::Iter<std::vec::IntoIter<GatewayResult<Value>>>) {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let pass = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let records = script[n.min(script.len() - 1)].clone();
            stream::iter(records.into_iter().map(Ok::<Value, GatewayError>).collect::<Vec<_>>())
        };
        (passes, pass)
    }

    fn soft_error() -> Value {
        json!({"error_code": 1001, "error_string": "Server is busy"})
    }

    #[test]
    fn test_three_soft_errors_then_success() {
        let (passes, pass) = scripted(vec![
            vec![soft_error()],
            vec![soft_error()],
            vec![soft_error()],
            vec![json!("OK")],
        ]);

        let records: Vec<_> =
            tokio_test::block_on(with_soft_retry(fast_config(), "test", pass).collect());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_ref().unwrap(), &json!("OK"));
        assert_eq!(passes.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_four_soft_errors_exceed_budget() {
        let (passes, pass) = scripted(vec![vec![soft_error()]]);

        let records: Vec<_> =
            tokio_test::block_on(with_soft_retry(fast_config(), "test", pass).collect());

        assert_eq!(records.len(), 1);
        match &records[0] {
            Err(err @ GatewayError::MaxRetry { attempts, .. }) => {
                assert_eq!(*attempts, 3);
                assert_eq!(err.soft_error_code(), Some(1001));
            }
            other => panic!("expected MaxRetry, got {:?}", other),
        }
        assert_eq!(passes.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_other_codes_pass_through() {
        let (passes, pass) = scripted(vec![vec![json!({"error_code": 8000}), json!({"Id": 1})]]);

        let records: Vec<_> =
            tokio_test::block_on(with_soft_retry(fast_config(), "test", pass).collect());

        assert_eq!(records.len(), 2);
        assert_eq!(passes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restart_repeats_earlier_records() {
        let (_, pass) = scripted(vec![
            vec![json!({"Id": 1}), soft_error()],
            vec![json!({"Id": 1}), json!({"Id": 2})],
        ]);

        let records: Vec<Value> = tokio_test::block_on(
            with_soft_retry(fast_config(), "test", pass)
                .map(|r| r.unwrap())
                .collect(),
        );

        assert_eq!(records, vec![json!({"Id": 1}), json!({"Id": 1}), json!({"Id": 2})]);
    }

    #[test]
    fn test_inner_error_stops_stream() {
        let pass = || {
            stream::iter(vec![
                Err(GatewayError::payload_error("bad")),
                Ok(json!({"Id": 1})),
            ])
        };

        let records: Vec<_> =
            tokio_test::block_on(with_soft_retry(fast_config(), "test", pass).collect());

        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], Err(GatewayError::PayloadError(_))));
    }

    #[test]
    fn test_string_error_codes() {
        assert_eq!(error_code(&json!({"error_code": "52"})), Some(52));
        assert_eq!(error_code(&json!({"error_code": 1000})), Some(1000));
        assert_eq!(error_code(&json!({"KeywordId": 1})), None);
        assert_eq!(error_code(&json!("OK")), None);
    }
}
