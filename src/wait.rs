//! Bounded polling for asynchronous provisioning.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::EbsError;

/// Default delay between two checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default overall budget for one wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval and deadline applied to every wait in one orchestration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSettings {
    /// Delay before each check.
    pub interval: Duration,
    /// Budget after which the wait fails with [`EbsError::Timeout`].
    pub timeout: Duration,
}

impl PollSettings {
    /// Creates settings with explicit timings.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT)
    }
}

/// Aborts the spawned poller when the wait that owns it goes away.
struct PollerGuard(JoinHandle<()>);

impl Drop for PollerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Repeats `check` until it yields a value, fails, or the timeout elapses.
///
/// Each round sleeps for the interval before checking, so even a resource
/// that is already in the desired state is observed once after one
/// interval. `Ok(None)` from the check means "not yet". The check runs on a
/// spawned task that is aborted when the deadline wins the race or when the
/// returned future is dropped before completing.
///
/// # Errors
///
/// Returns the first error produced by `check`, or [`EbsError::Timeout`]
/// naming `condition` and `resource_id` when the deadline passes first.
pub async fn poll_until<T, P, Fut>(
    settings: PollSettings,
    condition: &str,
    resource_id: &str,
    mut check: P,
) -> Result<T, EbsError>
where
    T: Send + 'static,
    P: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<T>, EbsError>> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let interval = settings.interval;
    let _poller = PollerGuard(tokio::spawn(async move {
        let outcome = loop {
            sleep(interval).await;
            match check().await {
                Ok(Some(value)) => break Ok(value),
                Ok(None) => {}
                Err(err) => break Err(err),
            }
        };
        if sender.send(outcome).is_err() {
            tracing::debug!("poll outcome dropped after the wait ended");
        }
    }));

    let timed_out = || EbsError::Timeout {
        condition: condition.to_owned(),
        resource_id: resource_id.to_owned(),
    };

    tokio::select! {
        received = receiver => received.unwrap_or_else(|_| {
            tracing::warn!(condition, resource_id, "poller stopped without reporting");
            Err(timed_out())
        }),
        () = sleep(settings.timeout) => {
            tracing::warn!(condition, resource_id, timeout = ?settings.timeout, "wait timed out");
            Err(timed_out())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn fast() -> PollSettings {
        PollSettings::new(Duration::from_millis(5), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn returns_first_ready_value() {
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let value = poll_until(fast(), "volume-available", "vol-1", move || {
            let round = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok((round >= 3).then_some(round)) }
        })
        .await
        .unwrap_or_else(|err| panic!("poll should succeed: {err}"));
        assert_eq!(value, 3);
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn check_error_stops_the_wait() {
        let result: Result<(), EbsError> = poll_until(fast(), "snapshot-completed", "snap-1", || async {
            Err(EbsError::Validation(String::from("check failed")))
        })
        .await;
        assert_eq!(
            result,
            Err(EbsError::Validation(String::from("check failed")))
        );
    }

    #[tokio::test]
    async fn times_out_and_stops_polling() {
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let settings = PollSettings::new(Duration::from_millis(5), Duration::from_millis(40));
        let result: Result<(), EbsError> = poll_until(settings, "volume-available", "vol-9", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await;
        assert_eq!(
            result,
            Err(EbsError::Timeout {
                condition: String::from("volume-available"),
                resource_id: String::from("vol-9"),
            })
        );

        let after_timeout = checks.load(Ordering::SeqCst);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(checks.load(Ordering::SeqCst), after_timeout);
    }

    #[tokio::test]
    async fn dropping_the_wait_stops_polling() {
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let settings = PollSettings::new(Duration::from_millis(5), Duration::from_secs(30));
        let wait = poll_until(settings, "volume-available", "vol-3", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<Option<()>, EbsError>(None) }
        });

        let outer = tokio::time::timeout(Duration::from_millis(30), wait).await;
        assert!(outer.is_err(), "outer timeout should win");
        sleep(Duration::from_millis(10)).await;

        let after_drop = checks.load(Ordering::SeqCst);
        assert!(after_drop > 0, "check should have run before the drop");
        sleep(Duration::from_millis(60)).await;
        assert_eq!(checks.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn defaults_match_one_second_and_thirty_seconds() {
        let settings = PollSettings::default();
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }
}
