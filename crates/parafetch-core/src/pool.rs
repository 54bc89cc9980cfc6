//! Worker pool: bounds how many fetch tasks run concurrently for one
//! download, draining an ordered queue of `(chunk number, range)` pairs as
//! slots free up.
//!
//! The reference downloader's thread pool keeps two independently-guarded
//! collections — a pending queue and a running set — and never holds both
//! locks at once. A `tokio::sync::Semaphore` gives the same "how many slots
//! are free" bookkeeping the running set existed for, without a second lock:
//! acquiring a permit is the only gate on starting a task, and the queue
//! mutex is held only for the instant it takes to pop the next entry.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::fetch::{self, TaskEvent};
use crate::probe::Credentials;
use crate::types::Range;

pub struct WorkerPool {
    queue: Arc<Mutex<VecDeque<(u32, Range)>>>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    show_headers: bool,
}

impl WorkerPool {
    pub fn new(ranges: Vec<(u32, Range)>, max_count: u32, cancel: CancellationToken) -> Self {
        Self::with_header_logging(ranges, max_count, cancel, false)
    }

    pub fn with_header_logging(
        ranges: Vec<(u32, Range)>,
        max_count: u32,
        cancel: CancellationToken,
        show_headers: bool,
    ) -> Self {
        Self {
            queue: Arc::new(Mutex::new(ranges.into_iter().collect())),
            semaphore: Arc::new(Semaphore::new(max_count.max(1) as usize)),
            cancel,
            show_headers,
        }
    }

    /// Drain the queue, running up to `max_count` fetches at a time, until
    /// it's empty or the pool is stopped. Returns once every spawned task has
    /// produced its terminal event.
    pub async fn run(
        &self,
        client: reqwest::Client,
        url: url::Url,
        credentials: Option<Credentials>,
        events: mpsc::UnboundedSender<TaskEvent>,
    ) {
        let mut handles = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };

            let next = {
                let mut q = self.queue.lock().await;
                q.pop_front()
            };

            let (num, range) = match next {
                Some(entry) => entry,
                None => {
                    drop(permit);
                    break;
                }
            };

            let client = client.clone();
            let url = url.clone();
            let credentials = credentials.clone();
            let cancel = self.cancel.clone();
            let events = events.clone();
            let show_headers = self.show_headers;

            tracing::debug!(chunk = num, "dispatching task");
            handles.push(tokio::spawn(async move {
                fetch::run(client, url, range, num, credentials, cancel, show_headers, events).await;
                drop(permit);
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Stop accepting new tasks and signal every running fetch to cancel.
    /// Tasks already in flight still emit a terminal `Failed` event; this
    /// does not wait for them.
    pub async fn stop(&self) {
        tracing::debug!("stopping worker pool");
        self.cancel.cancel();
        self.queue.lock().await.clear();
    }
}
