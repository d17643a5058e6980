use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::settings::{PollPolicy, RetryPolicy};
use crate::error::{MigrationError, Result};
use crate::provider::models::{LifecycleState, ResourceHandle, ResourceKind};
use crate::provider::CloudResult;

use super::clock::Clock;
use super::retry::with_backoff;

/// Where a wait currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitState {
    /// Still waiting; carries the last observed state.
    Pending(LifecycleState),
    Ready(ResourceHandle),
    Failed(LifecycleState),
}

impl WaitState {
    /// Transition on a fresh observation of the resource.
    ///
    /// A resource that is not visible yet counts as ABSENT and keeps the wait going.
    pub fn observe(observed: Option<ResourceHandle>) -> Self {
        match observed {
            None => WaitState::Pending(LifecycleState::Absent),
            Some(handle) => match handle.state {
                LifecycleState::Available => WaitState::Ready(handle),
                LifecycleState::Failed | LifecycleState::Deleting => WaitState::Failed(handle.state),
                other => WaitState::Pending(other),
            },
        }
    }
}

/// Fixed-interval poller that blocks until a resource is AVAILABLE.
#[derive(Clone)]
pub struct Waiter {
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    retry: RetryPolicy,
}

impl Waiter {
    pub fn new(clock: Arc<dyn Clock>, cancel: CancellationToken, retry: RetryPolicy) -> Self {
        Self { clock, cancel, retry }
    }

    /// Poll `probe` until the resource is AVAILABLE.
    ///
    /// Fails with `Timeout` once the budget is spent, `OperationFailed` when the
    /// resource reports FAILED or DELETING, and `Cancelled` if the token fires.
    pub async fn wait_until_available<F, Fut>(
        &self,
        kind: ResourceKind,
        name: &str,
        policy: PollPolicy,
        mut probe: F,
    ) -> Result<ResourceHandle>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CloudResult<ResourceHandle>>,
    {
        let started = self.clock.now();
        let operation = format!("get_{}", kind);
        let mut last = LifecycleState::Absent;
        let mut checks: u32 = 0;

        tracing::info!(kind = %kind, name = name, timeout_secs = policy.timeout_secs, "Waiting for resource to become available");

        loop {
            if self.cancel.is_cancelled() {
                return Err(MigrationError::Cancelled);
            }

            let waited = self.clock.now().saturating_duration_since(started);
            if waited > policy.timeout() {
                tracing::error!(kind = %kind, name = name, checks = checks, last_state = %last, "Timed out waiting for resource");
                return Err(MigrationError::Timeout {
                    kind,
                    name: name.to_string(),
                    waited,
                    last_state: last,
                });
            }

            checks += 1;
            let observed = match with_backoff(&self.retry, self.clock.as_ref(), &operation, &mut probe).await {
                Ok(handle) => Some(handle),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(MigrationError::remote(&operation, name, e)),
            };

            match WaitState::observe(observed) {
                WaitState::Ready(handle) => {
                    tracing::info!(kind = %kind, name = name, checks = checks, elapsed_secs = waited.as_secs(), "Resource is available");
                    return Ok(handle);
                }
                WaitState::Failed(state) => {
                    return Err(MigrationError::OperationFailed {
                        resource: format!("{} '{}'", kind, name),
                        reason: format!("entered {} state", state),
                    });
                }
                WaitState::Pending(state) => {
                    if state != last || checks == 1 {
                        tracing::info!(kind = %kind, name = name, state = %state, check = checks, elapsed_secs = waited.as_secs(), "Resource status");
                    }
                    last = state;
                }
            }

            self.pause(policy.interval()).await?;
        }
    }

    async fn pause(&self, interval: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(MigrationError::Cancelled),
            _ = self.clock.sleep(interval) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::clock::ManualClock;
    use crate::provider::CloudError;
    use std::sync::Mutex;

    fn waiter(clock: Arc<ManualClock>) -> (Waiter, CancellationToken) {
        let token = CancellationToken::new();
        let w = Waiter::new(clock, token.clone(), RetryPolicy::default());
        (w, token)
    }

    fn handle(state: LifecycleState) -> ResourceHandle {
        ResourceHandle::new(ResourceKind::Namespace, "ns", state)
    }

    /// Probe that replays a fixed script of observations, repeating the last one.
    fn scripted(
        script: Vec<CloudResult<LifecycleState>>,
    ) -> impl FnMut() -> std::future::Ready<CloudResult<ResourceHandle>> {
        let script = Mutex::new(script);
        move || {
            let mut s = script.lock().unwrap();
            let next = if s.len() > 1 { s.remove(0) } else { s[0].clone() };
            std::future::ready(next.map(handle))
        }
    }

    #[tokio::test]
    async fn not_found_then_available() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let (w, _) = waiter(clock.clone());
        let probe = scripted(vec![
            Err(CloudError::NotFound("ns".into())),
            Ok(LifecycleState::Creating),
            Ok(LifecycleState::Available),
        ]);

        let h = w
            .wait_until_available(ResourceKind::Namespace, "ns", PollPolicy::new(1800, 15), probe)
            .await
            .unwrap();

        assert_eq!(h.state, LifecycleState::Available);
        assert_eq!(clock.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn times_out_with_last_state() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let (w, _) = waiter(clock.clone());
        let probe = scripted(vec![Ok(LifecycleState::Restoring)]);

        let err = w
            .wait_until_available(ResourceKind::Workgroup, "wg", PollPolicy::new(60, 15), probe)
            .await
            .unwrap_err();

        match err {
            MigrationError::Timeout { last_state, waited, .. } => {
                assert_eq!(last_state, LifecycleState::Restoring);
                assert!(waited > Duration::from_secs(60));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn failed_state_is_fatal() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let (w, _) = waiter(clock);
        let probe = scripted(vec![Ok(LifecycleState::Creating), Ok(LifecycleState::Failed)]);

        let err = w
            .wait_until_available(ResourceKind::Snapshot, "snap", PollPolicy::new(3600, 30), probe)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::OperationFailed { .. }));
    }

    #[tokio::test]
    async fn other_errors_propagate_immediately() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let (w, _) = waiter(clock.clone());
        let probe = scripted(vec![Err(CloudError::AccessDenied("denied".into()))]);

        let err = w
            .wait_until_available(ResourceKind::Namespace, "ns", PollPolicy::new(1800, 15), probe)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Remote { .. }));
        assert_eq!(clock.sleep_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_polling() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let (w, token) = waiter(clock);
        token.cancel();
        let probe = scripted(vec![Ok(LifecycleState::Available)]);

        let err = w
            .wait_until_available(ResourceKind::Namespace, "ns", PollPolicy::new(1800, 15), probe)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Cancelled));
    }

    #[test]
    fn deleting_is_a_failure_state() {
        assert_eq!(
            WaitState::observe(Some(handle(LifecycleState::Deleting))),
            WaitState::Failed(LifecycleState::Deleting)
        );
        assert_eq!(WaitState::observe(None), WaitState::Pending(LifecycleState::Absent));
    }
}
