use std::future::Future;
use std::time::Duration;

use crate::config::settings::RetryPolicy;
use crate::provider::CloudResult;

use super::clock::Clock;

/// Retry a control-plane call with exponential backoff.
///
/// Only throttling-class errors are retried; everything else is returned on
/// the first failure so the caller can classify it.
pub async fn with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    operation_name: &str,
    mut f: F,
) -> CloudResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CloudResult<T>>,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt > policy.max_retries {
                    tracing::error!(
                        operation = operation_name,
                        attempts = attempt,
                        "All retry attempts exhausted"
                    );
                    return Err(e);
                }

                let delay = backoff_delay(policy.base_delay_ms, attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Throttled, retrying"
                );
                clock.sleep(delay).await;
            }
        }
    }
}

fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_delay_ms.saturating_mul(factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::clock::ManualClock;
    use crate::provider::CloudError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn clock() -> ManualClock {
        ManualClock::new(chrono::Utc::now())
    }

    #[tokio::test]
    async fn retries_throttles_then_succeeds() {
        let clock = clock();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { max_retries: 5, base_delay_ms: 500 };

        let result = with_backoff(&policy, &clock, "get_namespace", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CloudError::Throttled("slow down".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500ms + 1000ms
        assert_eq!(clock.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn non_transient_errors_fail_fast() {
        let clock = clock();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: CloudResult<()> = with_backoff(&policy, &clock, "get_namespace", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CloudError::AccessDenied("no".into())) }
        })
        .await;

        assert!(matches!(result, Err(CloudError::AccessDenied(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let clock = clock();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { max_retries: 2, base_delay_ms: 10 };

        let result: CloudResult<()> = with_backoff(&policy, &clock, "create_schedule", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CloudError::Throttled("again".into())) }
        })
        .await;

        assert!(matches!(result, Err(CloudError::Throttled(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_doubles() {
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 3), Duration::from_millis(2000));
    }
}
