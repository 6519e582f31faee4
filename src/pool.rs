//! Bounded worker pool for article conversion.
//!
//! Workers are OS threads pulling titles from a shared job queue and
//! pushing `(title, outcome)` pairs onto a result channel. Each worker
//! builds its own context once at startup from an initializer closure;
//! configuration crosses the boundary only at pool construction and only
//! read-only.
//!
//! There is no way to preempt a running thread, so `terminate` detaches
//! the workers instead of joining them: channels are dropped, stale
//! results from the old generation can no longer be delivered, and a
//! genuinely hung worker is leaked. `close` is the graceful counterpart
//! that joins after the queue drains. Dropping a pool that was neither
//! closed nor terminated behaves like `terminate`.

use crate::error::ConvertError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

pub type JobOutcome<R> = (String, Result<R, ConvertError>);

pub struct WorkerPool<R> {
    job_tx: Option<Sender<String>>,
    results: Receiver<JobOutcome<R>>,
    handles: Vec<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
    size: usize,
}

impl<R: Send + 'static> WorkerPool<R> {
    pub fn new<C, I, F>(size: usize, init: Arc<I>, job: Arc<F>) -> Self
    where
        C: 'static,
        I: Fn() -> C + Send + Sync + 'static,
        F: Fn(&C, &str) -> Result<R, ConvertError> + Send + Sync + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<String>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, results) = mpsc::channel();
        let active = Arc::new(AtomicUsize::new(0));

        info!(workers = size, "Creating worker pool");

        let mut handles = Vec::with_capacity(size);
        for worker_id in 0..size {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let active = Arc::clone(&active);
            let init = Arc::clone(&init);
            let job = Arc::clone(&job);

            let handle = thread::Builder::new()
                .name(format!("wikidict-worker-{worker_id}"))
                .spawn(move || {
                    let ctx = init();
                    loop {
                        let title = match job_rx.lock() {
                            Ok(guard) => match guard.recv() {
                                Ok(title) => title,
                                Err(_) => break,
                            },
                            Err(_) => break,
                        };

                        active.fetch_add(1, Ordering::SeqCst);
                        let outcome = catch_unwind(AssertUnwindSafe(|| job(&ctx, &title)))
                            .unwrap_or_else(|_| {
                                warn!(title, "Worker panicked while converting article");
                                Err(ConvertError::failed(&title))
                            });
                        active.fetch_sub(1, Ordering::SeqCst);

                        // The scheduler may have replaced this pool; stale
                        // results have nowhere to go and the worker exits.
                        if result_tx.send((title, outcome)).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        WorkerPool {
            job_tx: Some(job_tx),
            results,
            handles,
            active,
            size,
        }
    }

    /// Queues a title for conversion. Returns false if the pool is no
    /// longer accepting work.
    pub fn dispatch(&self, title: String) -> bool {
        match &self.job_tx {
            Some(tx) => tx.send(title).is_ok(),
            None => false,
        }
    }

    /// Blocks for the next completed result, bounded by `timeout`.
    pub fn next_result(&self, timeout: Duration) -> Result<JobOutcome<R>, RecvTimeoutError> {
        self.results.recv_timeout(timeout)
    }

    /// Workers currently executing a job (as opposed to waiting for one).
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Graceful shutdown: stops accepting work, lets queued jobs finish,
    /// joins every worker.
    pub fn close(mut self) {
        self.job_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }

    /// Immediate shutdown: drops both channels and detaches the workers.
    pub fn terminate(mut self) {
        self.job_tx.take();
        self.handles.clear();
    }
}

impl<R> Drop for WorkerPool<R> {
    fn drop(&mut self) {
        self.job_tx.take();
        self.handles.clear();
    }
}
