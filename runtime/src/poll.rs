//! Cooperative polling until the host converges on a target state.

use std::future::Future;
use std::time::{Duration, Instant};

use virtnet_core::error::{NetError, Result};
use virtnet_core::PollConfig;

/// Shortest pause between probes, whatever the configured interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Wait for `probe` to report convergence.
///
/// Sleeps `config.delay()` first, then probes at most every
/// `config.interval()` until `config.timeout()` (measured from the call)
/// has elapsed. A probe error counts as "not yet converged"; only the
/// timeout is returned to the caller, carrying the last probe error.
pub async fn wait_for<F, Fut>(
    subject: &str,
    target: &str,
    config: &PollConfig,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let timeout = config.timeout();
    let interval = config.interval().max(MIN_INTERVAL);
    let mut last_error: Option<String> = None;
    let mut attempts: u32 = 0;

    tokio::time::sleep(config.delay().min(timeout)).await;

    loop {
        attempts += 1;
        match probe().await {
            Ok(true) => {
                tracing::debug!(subject, target, attempts, "Reached target state");
                return Ok(());
            }
            Ok(false) => {
                tracing::debug!(subject, target, attempts, "Not yet converged");
            }
            Err(e) => {
                tracing::warn!(subject, target, attempts, error = %e, "Probe failed, retrying");
                last_error = Some(e.to_string());
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(NetError::ConvergenceTimeout {
                subject: subject.to_string(),
                target: target.to_string(),
                timeout_ms: config.timeout_ms,
                last_error,
            });
        }

        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> PollConfig {
        PollConfig {
            delay_ms: 1,
            interval_ms: 2,
            timeout_ms: 200,
        }
    }

    #[tokio::test]
    async fn test_wait_for_immediate() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        wait_for("net", "ACTIVE", &fast(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_for_after_several_probes() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        wait_for("net", "ACTIVE", &fast(), move || async move {
            Ok(counter.fetch_add(1, Ordering::SeqCst) >= 3)
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_wait_for_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        wait_for("net", "NOT_EXISTS", &fast(), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(NetError::External("connection reset".to_string()))
            } else {
                Ok(true)
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let config = PollConfig {
            delay_ms: 1,
            interval_ms: 5,
            timeout_ms: 30,
        };
        let err = wait_for("k8snet", "ACTIVE", &config, || async { Ok(false) })
            .await
            .unwrap_err();
        match err {
            NetError::ConvergenceTimeout {
                subject,
                target,
                timeout_ms,
                last_error,
            } => {
                assert_eq!(subject, "k8snet");
                assert_eq!(target, "ACTIVE");
                assert_eq!(timeout_ms, 30);
                assert!(last_error.is_none());
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_wait_for_timeout_keeps_last_error() {
        let config = PollConfig {
            delay_ms: 0,
            interval_ms: 5,
            timeout_ms: 20,
        };
        let err = wait_for("k8snet", "NOT_EXISTS", &config, || async {
            Err(NetError::External("still busy".to_string()))
        })
        .await
        .unwrap_err();
        match err {
            NetError::ConvergenceTimeout { last_error, .. } => {
                assert!(last_error.unwrap().contains("still busy"));
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_wait_for_zero_interval_is_clamped() {
        let config = PollConfig {
            delay_ms: 0,
            interval_ms: 0,
            timeout_ms: 50,
        };
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = wait_for("k8snet", "ACTIVE", &config, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, NetError::ConvergenceTimeout { .. }));
        // One probe per MIN_INTERVAL at most, plus the first and last.
        assert!(calls.load(Ordering::SeqCst) <= 7);
    }

    #[tokio::test]
    async fn test_wait_for_waits_initial_delay() {
        let config = PollConfig {
            delay_ms: 40,
            interval_ms: 5,
            timeout_ms: 500,
        };
        let start = Instant::now();
        wait_for("net", "ACTIVE", &config, || async { Ok(true) })
            .await
            .unwrap();
        assert!(start.elapsed().as_millis() >= 40);
    }
}
