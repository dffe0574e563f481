//! Bounded, failure-isolated dispatch of downstream work.
//!
//! Sections and vision pages are independent once segmentation is done, so
//! the per-section / per-page work a caller hangs off the core (description
//! calls, atomisation, writing artifacts) runs on a bounded pool here. Each
//! item runs in its own tokio task: an `Err` or a panic is logged and
//! reported against the item's key while its siblings carry on.
//!
//! There is no timeout: external calls own their own deadlines. The only
//! cancellation is [`StopHandle::stop`], which stops *starting* items.

use crate::error::UnitError;
use futures::stream::{self, StreamExt};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared flag that stops submission of items not yet started.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pool settings.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Maximum items in flight. Values below 1 are treated as 1.
    pub concurrency: usize,
    pub stop: Option<StopHandle>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            stop: None,
        }
    }
}

impl DispatchOptions {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            stop: None,
        }
    }

    pub fn with_stop(mut self, stop: StopHandle) -> Self {
        self.stop = Some(stop);
        self
    }
}

/// Outcome of a dispatch run. Each list keeps the items' input order.
#[derive(Debug)]
pub struct DispatchReport<K, T> {
    pub completed: Vec<(K, T)>,
    pub failed: Vec<(K, UnitError)>,
    /// Items never started because the stop handle fired.
    pub skipped: Vec<K>,
}

impl<K, T> DispatchReport<K, T> {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

enum Outcome<K, T> {
    Done(K, T),
    Failed(K, UnitError),
    Skipped(K),
}

/// Run `worker` over every `(key, payload)` with at most
/// `options.concurrency` tasks in flight.
pub async fn dispatch<K, P, T, E, F, Fut>(
    items: Vec<(K, P)>,
    options: &DispatchOptions,
    worker: F,
) -> DispatchReport<K, T>
where
    K: Clone + Display + Send + 'static,
    P: Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
    F: Fn(K, P) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let concurrency = options.concurrency.max(1);
    let total = items.len();
    debug!("Dispatching {} items, concurrency {}", total, concurrency);

    let worker = &worker;
    let mut outcomes: Vec<(usize, Outcome<K, T>)> = stream::iter(items.into_iter().enumerate())
        .map(|(i, (key, payload))| {
            let stop = options.stop.clone();
            async move {
                if stop.as_ref().is_some_and(StopHandle::is_stopped) {
                    return (i, Outcome::Skipped(key));
                }
                let task = tokio::spawn(worker(key.clone(), payload));
                let outcome = match task.await {
                    Ok(Ok(value)) => Outcome::Done(key, value),
                    Ok(Err(e)) => {
                        warn!("Task '{}' failed: {}", key, e);
                        let detail = e.to_string();
                        Outcome::Failed(key.clone(), UnitError::Task { key: key.to_string(), detail })
                    }
                    Err(join) => {
                        let detail = if join.is_panic() {
                            "task panicked".to_string()
                        } else {
                            format!("task aborted: {join}")
                        };
                        warn!("Task '{}' failed: {}", key, detail);
                        Outcome::Failed(key.clone(), UnitError::Task { key: key.to_string(), detail })
                    }
                };
                (i, outcome)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    outcomes.sort_by_key(|(i, _)| *i);
    let mut report = DispatchReport {
        completed: Vec::new(),
        failed: Vec::new(),
        skipped: Vec::new(),
    };
    for (_, outcome) in outcomes {
        match outcome {
            Outcome::Done(k, v) => report.completed.push((k, v)),
            Outcome::Failed(k, e) => report.failed.push((k, e)),
            Outcome::Skipped(k) => report.skipped.push(k),
        }
    }
    debug!(
        "Dispatch done: {} ok, {} failed, {} skipped of {}",
        report.completed.len(),
        report.failed.len(),
        report.skipped.len(),
        total
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn failures_are_isolated() {
        let items: Vec<(String, u32)> = (1..=5).map(|n| (format!("s{n}"), n)).collect();
        let report = dispatch(items, &DispatchOptions::new(2), |_key, n| async move {
            if n == 3 {
                Err(format!("boom {n}"))
            } else {
                Ok(n * 10)
            }
        })
        .await;
        assert_eq!(
            report.completed,
            vec![
                ("s1".to_string(), 10),
                ("s2".to_string(), 20),
                ("s4".to_string(), 40),
                ("s5".to_string(), 50)
            ]
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(
            report.failed[0].1,
            UnitError::Task {
                key: "s3".into(),
                detail: "boom 3".into()
            }
        );
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn panics_are_isolated() {
        let items = vec![(1u32, ()), (2u32, ())];
        let report = dispatch(items, &DispatchOptions::new(2), |key, _| async move {
            if key == 1 {
                panic!("worker blew up");
            }
            Ok::<_, String>(key)
        })
        .await;
        assert_eq!(report.completed, vec![(2, 2)]);
        assert_eq!(report.failed[0].0, 1);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<(usize, ())> = (0..12).map(|i| (i, ())).collect();
        let report = dispatch(items, &DispatchOptions::new(3), |_, _| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(())
            }
        })
        .await;
        assert_eq!(report.completed.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn stop_skips_unstarted_items() {
        let stop = StopHandle::new();
        let options = DispatchOptions::new(1).with_stop(stop.clone());
        let items: Vec<(usize, ())> = (0..4).map(|i| (i, ())).collect();
        let report = dispatch(items, &options, |key, _| {
            let stop = stop.clone();
            async move {
                if key == 1 {
                    stop.stop();
                }
                Ok::<_, String>(key)
            }
        })
        .await;
        assert_eq!(report.completed, vec![(0, 0), (1, 1)]);
        assert_eq!(report.skipped, vec![2, 3]);
        assert!(!report.is_clean());
    }
}
