//! Bounded, time-limited fan-out over independent provider calls.
use crate::error::{ProviderError, ProviderResult};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutConfig {
    /// Calls in flight at once
    pub concurrency: usize,
    /// Budget for each individual call
    pub timeout: Duration,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            // one slot per cell of a full 3x3 neighborhood
            concurrency: 9,
            timeout: Duration::from_secs(2),
        }
    }
}

/// Sender half of a query cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half, handed to a query. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// One result slot per key, in key order.
#[derive(Debug)]
pub struct FanOutReport<K, T> {
    pub slots: Vec<(K, ProviderResult<T>)>,
    pub cancelled: bool,
}

impl<K, T> FanOutReport<K, T> {
    pub fn failed(&self) -> usize {
        self.slots.iter().filter(|(_, r)| r.is_err()).count()
    }
}

/// Run `fetch` for every key with at most `config.concurrency` calls in flight
/// and `config.timeout` per call.
///
/// Slots come back in key order whatever order the calls finish in. On
/// cancellation the in-flight calls are dropped, slots already collected are
/// kept, and every remaining key gets `ProviderError::Cancelled`.
pub async fn fan_out<K, T, F, Fut>(
    keys: Vec<K>,
    config: &FanOutConfig,
    cancel: Option<&CancelSignal>,
    fetch: F,
) -> FanOutReport<K, T>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let budget = config.timeout;
    let calls = keys.iter().cloned().map(|key| {
        let call = fetch(key);
        async move {
            match timeout(budget, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(budget)),
            }
        }
    });

    let mut in_flight = stream::iter(calls).buffered(config.concurrency.max(1));
    let mut results: Vec<ProviderResult<T>> = Vec::with_capacity(keys.len());
    let mut cancelled = false;

    loop {
        let next = match cancel {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    cancelled = true;
                    break;
                }
                item = in_flight.next() => item,
            },
            None => in_flight.next().await,
        };

        match next {
            Some(result) => results.push(result),
            None => break,
        }
    }
    drop(in_flight);

    let mut results = results.into_iter();
    let slots = keys
        .into_iter()
        .map(|key| {
            let result = results.next().unwrap_or(Err(ProviderError::Cancelled));
            (key, result)
        })
        .collect();

    FanOutReport { slots, cancelled }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(concurrency: usize, timeout_ms: u64) -> FanOutConfig {
        FanOutConfig {
            concurrency,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn test_slots_follow_key_order_not_completion_order() {
        let keys = vec![30u64, 10, 20];
        let report = fan_out(keys, &config(3, 1_000), None, |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, ProviderError>(delay * 2)
        })
        .await;

        let values: Vec<u64> = report.slots.iter().map(|(_, r)| *r.as_ref().unwrap()).collect();
        assert_eq!(values, vec![60, 20, 40]);
        assert!(!report.cancelled);
        assert_eq!(report.failed(), 0);
    }

    #[tokio::test]
    async fn test_failures_and_timeouts_stay_in_their_slot() {
        let keys = vec!["ok", "boom", "slow"];
        let report = fan_out(keys, &config(3, 20), None, |key| async move {
            match key {
                "boom" => Err(ProviderError::Unavailable("partition offline".into())),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(0)
                }
                _ => Ok(1),
            }
        })
        .await;

        assert_eq!(report.slots[0].1, Ok(1));
        assert!(matches!(report.slots[1].1, Err(ProviderError::Unavailable(_))));
        assert_eq!(
            report.slots[2].1,
            Err(ProviderError::Timeout(Duration::from_millis(20)))
        );
        assert_eq!(report.failed(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = fan_out((0..12).collect(), &config(3, 1_000), None, |_key: i32| {
            let active = active.clone();
            let peak = peak.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ProviderError>(())
            }
        })
        .await;

        assert_eq!(report.slots.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_cancel_keeps_collected_slots() {
        let (handle, signal) = cancel_pair();
        let keys = vec![0u64, 1, 2];

        let report = fan_out(keys, &config(1, 5_000), Some(&signal), |key| {
            let cancel_now = key == 1;
            let handle = &handle;
            async move {
                if cancel_now {
                    handle.cancel();
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok::<_, ProviderError>(key)
            }
        })
        .await;

        assert!(report.cancelled);
        assert!(signal.is_cancelled());
        assert_eq!(report.slots[0].1, Ok(0));
        assert_eq!(report.slots[1].1, Err(ProviderError::Cancelled));
        assert_eq!(report.slots[2].1, Err(ProviderError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_issues_no_calls() {
        let (handle, signal) = cancel_pair();
        handle.cancel();
        let calls = AtomicUsize::new(0);

        let report = fan_out(vec![1, 2], &config(2, 1_000), Some(&signal), |key: i32| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, ProviderError>(key) }
        })
        .await;

        assert!(report.cancelled);
        assert_eq!(report.failed(), 2);
        // futures are built lazily by the stream, none were polled
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (handle, signal) = cancel_pair();
        drop(handle);

        let report = fan_out(vec![7], &config(1, 1_000), Some(&signal), |key: i32| async move {
            Ok::<_, ProviderError>(key)
        })
        .await;

        assert!(!report.cancelled);
        assert_eq!(report.slots[0].1, Ok(7));
    }
}
