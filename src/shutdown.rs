//! Cooperative shutdown token.
//!
//! Triggering drops the only sender of a zero-capacity channel, which wakes
//! every waiting receiver with `Disconnected` and keeps reporting it on
//! every later check. The loop uses [`Shutdown::wait`] as its inter-tick
//! sleep, so a signal cuts the wait short but never an in-flight tick.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};

/// Observing half, held by the loop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: Receiver<()>,
}

/// Triggering half, held by the signal listener.
#[derive(Debug)]
pub struct ShutdownHandle {
    _tx: Sender<()>,
}

pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = bounded(0);
    (ShutdownHandle { _tx: tx }, Shutdown { rx })
}

impl ShutdownHandle {
    pub fn trigger(self) {}
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep up to `timeout`. Returns `true` as soon as shutdown is requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) => false,
        }
    }
}
