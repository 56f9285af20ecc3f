use super::queue::LoadQueueEntry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("load cancelled")]
    Cancelled,
}

/// Where fragment bodies come from
pub trait FragmentSource: Send + Sync {
    fn fetch(&self, entry: &LoadQueueEntry) -> Result<String, LoadError>;
}

/// Outcome of one queue entry, sent back to the UI loop
#[derive(Debug)]
pub enum LoadEvent {
    Loaded { entry: LoadQueueEntry, body: String },
    Failed { entry: LoadQueueEntry, error: LoadError },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Delay before retry n is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Background thread performing fetches one request at a time
pub struct LoadWorker {
    requests: mpsc::Sender<LoadQueueEntry>,
    cancelled: Arc<AtomicBool>,
}

impl LoadWorker {
    pub fn spawn(
        source: Arc<dyn FragmentSource>,
        policy: RetryPolicy,
        events: mpsc::Sender<LoadEvent>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<LoadQueueEntry>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let token = Arc::clone(&cancelled);

        thread::spawn(move || {
            for entry in rx {
                if token.load(Ordering::SeqCst) {
                    break;
                }
                let event = match fetch_with_retries(source.as_ref(), &entry, policy, &token) {
                    Ok(body) => LoadEvent::Loaded { entry, body },
                    Err(LoadError::Cancelled) => break,
                    Err(error) => LoadEvent::Failed { entry, error },
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            log::debug!("load worker stopped");
        });

        LoadWorker {
            requests: tx,
            cancelled,
        }
    }

    /// Hand an entry to the worker. False once the worker has stopped.
    pub fn submit(&self, entry: LoadQueueEntry) -> bool {
        self.requests.send(entry).is_ok()
    }

    /// Stop after the current attempt; later results are discarded
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Drop for LoadWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub(crate) fn fetch_with_retries(
    source: &dyn FragmentSource,
    entry: &LoadQueueEntry,
    policy: RetryPolicy,
    cancelled: &AtomicBool,
) -> Result<String, LoadError> {
    let mut attempt = 0;
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(LoadError::Cancelled);
        }
        match source.fetch(entry) {
            Ok(body) => return Ok(body),
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                log::warn!(
                    "fetch of {} failed ({}), retry {}/{}",
                    entry.file.path,
                    e,
                    attempt,
                    policy.retries
                );
                thread::sleep(policy.backoff * attempt);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffFile;
    use crate::load::LoadQueue;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn entry(container: usize) -> LoadQueueEntry {
        LoadQueueEntry::file(
            container,
            DiffFile {
                filediff_id: container as u64 + 1,
                interfilediff_id: None,
                revision: 1,
                interdiff_revision: None,
                index: container,
                path: format!("f{}", container),
            },
        )
    }

    fn status_error() -> LoadError {
        LoadError::Status {
            status: 503,
            url: "http://example.test".into(),
        }
    }

    /// Records fetch order and the peak number of concurrent fetches
    #[derive(Default)]
    struct CountingSource {
        active: AtomicUsize,
        peak: AtomicUsize,
        order: Mutex<Vec<usize>>,
    }

    impl FragmentSource for CountingSource {
        fn fetch(&self, entry: &LoadQueueEntry) -> Result<String, LoadError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            self.order.lock().unwrap().push(entry.container);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("body {}", entry.container))
        }
    }

    struct FlakySource {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FragmentSource for FlakySource {
        fn fetch(&self, _entry: &LoadQueueEntry) -> Result<String, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(status_error());
            }
            Ok("ok".into())
        }
    }

    fn quick(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn queue_and_worker_run_fifo_without_overlap() {
        let source = Arc::new(CountingSource::default());
        let (tx, rx) = mpsc::channel();
        let worker = LoadWorker::spawn(source.clone(), quick(0), tx);

        let mut queue = LoadQueue::new();
        for i in 0..6 {
            queue.enqueue(entry(i));
        }
        let mut next = queue.start();
        let mut seen = Vec::new();
        while let Some(e) = next.take() {
            assert!(worker.submit(e));
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                LoadEvent::Loaded { entry, body } => {
                    assert_eq!(body, format!("body {}", entry.container));
                    seen.push(entry.container);
                }
                LoadEvent::Failed { error, .. } => panic!("unexpected failure: {}", error),
            }
            next = queue.complete();
        }

        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(*source.order.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(source.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_until_success_within_budget() {
        let source = FlakySource {
            failures_left: AtomicUsize::new(2),
            calls: AtomicUsize::new(0),
        };
        let body = fetch_with_retries(&source, &entry(0), quick(2), &AtomicBool::new(false)).unwrap();
        assert_eq!(body, "ok");
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up_after_retry_budget() {
        let source = FlakySource {
            failures_left: AtomicUsize::new(5),
            calls: AtomicUsize::new(0),
        };
        let result = fetch_with_retries(&source, &entry(0), quick(1), &AtomicBool::new(false));
        assert!(matches!(result, Err(LoadError::Status { status: 503, .. })));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancelled_token_skips_fetch() {
        let source = FlakySource {
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        };
        let result = fetch_with_retries(&source, &entry(0), quick(1), &AtomicBool::new(true));
        assert!(matches!(result, Err(LoadError::Cancelled)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn worker_reports_failure_after_retries() {
        let source = Arc::new(FlakySource {
            failures_left: AtomicUsize::new(10),
            calls: AtomicUsize::new(0),
        });
        let (tx, rx) = mpsc::channel();
        let worker = LoadWorker::spawn(source, quick(1), tx);
        assert!(worker.submit(entry(3)));
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            LoadEvent::Failed { entry, error } => {
                assert_eq!(entry.container, 3);
                assert!(error.to_string().contains("503"));
            }
            LoadEvent::Loaded { .. } => panic!("expected failure"),
        }
    }
}
