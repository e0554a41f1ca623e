//! Queued persistence on a dedicated writer thread.
//!
//! The control loop hands readings to a bounded `crossbeam-channel`
//! queue and moves on; a single worker drains it into the wrapped backend.
//! When the queue is full the oldest pending reading is dropped so the
//! most recent data wins. Dropping the handle closes the queue, lets the
//! worker drain what is left, and joins it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{error, info, warn};

use crate::app::ports::PersistenceBackend;
use crate::app::reading::SensorReading;
use crate::error::StoreError;

enum Job {
    EnsureSchema,
    Insert(SensorReading),
}

pub struct BackgroundStore {
    tx: Option<Sender<Job>>,
    // Second receiver, used only to evict the oldest job on overflow.
    evict: Receiver<Job>,
    worker: Option<JoinHandle<()>>,
    dropped: u64,
    failed: Arc<AtomicU64>,
}

impl BackgroundStore {
    /// Spawn the writer thread. `capacity` must be at least 1.
    pub fn spawn<B>(mut backend: B, capacity: usize) -> Result<Self, StoreError>
    where
        B: PersistenceBackend + Send + 'static,
    {
        let (tx, rx) = bounded::<Job>(capacity.max(1));
        let evict = rx.clone();
        let failed = Arc::new(AtomicU64::new(0));
        let worker_failed = Arc::clone(&failed);

        let worker = thread::Builder::new()
            .name("envmon-store".into())
            .spawn(move || {
                for job in rx {
                    let result = match job {
                        Job::EnsureSchema => backend.ensure_schema(),
                        Job::Insert(reading) => backend.insert(&reading),
                    };
                    if let Err(e) = result {
                        worker_failed.fetch_add(1, Ordering::Relaxed);
                        error!("STORE | background write failed: {}", e);
                    }
                }
                info!("STORE | writer drained, exiting");
            })
            .map_err(|e| StoreError::Connect(format!("cannot spawn writer thread: {e}")))?;

        info!("STORE | background writer started (queue capacity {})", capacity);
        Ok(Self {
            tx: Some(tx),
            evict,
            worker: Some(worker),
            dropped: 0,
            failed,
        })
    }

    /// Readings discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Writes that failed on the worker after the backend's own retries.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.evict.len()
    }

    fn enqueue(&mut self, job: Job) -> Result<(), StoreError> {
        let tx = self.tx.clone().ok_or(StoreError::WriterStopped)?;
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                if self.evict.try_recv().is_ok() {
                    self.dropped += 1;
                    warn!(
                        "STORE | queue full, dropped oldest reading ({} so far)",
                        self.dropped
                    );
                }
                // Only this handle produces, so there is room now unless the
                // worker died in between.
                tx.try_send(job).map_err(|e| {
                    if e.is_full() {
                        self.dropped += 1;
                    }
                    send_error(&e)
                })
            }
            Err(e) => Err(send_error(&e)),
        }
    }
}

fn send_error(e: &TrySendError<Job>) -> StoreError {
    match e {
        TrySendError::Full(_) => StoreError::QueueFull,
        TrySendError::Disconnected(_) => StoreError::WriterStopped,
    }
}

impl PersistenceBackend for BackgroundStore {
    /// Queues schema creation; the worker runs it before later inserts.
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.enqueue(Job::EnsureSchema)
    }

    /// Returns once the reading is queued, not once it is written.
    fn insert(&mut self, reading: &SensorReading) -> Result<(), StoreError> {
        self.enqueue(Job::Insert(*reading))
    }
}

impl Drop for BackgroundStore {
    fn drop(&mut self) {
        let pending = self.evict.len();
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if pending > 0 {
                info!("STORE | flushing {} queued reading(s)", pending);
            }
            if worker.join().is_err() {
                error!("STORE | writer thread panicked");
            }
        }
        if self.dropped > 0 {
            warn!("STORE | {} reading(s) dropped on overflow", self.dropped);
        }
    }
}
