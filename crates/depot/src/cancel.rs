use async_std::channel::{self, Receiver, Sender};
use async_std::future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared stop flag threaded from the fleet loop down to each file fetch.
/// Fetches already in flight are allowed to finish; queued ones are skipped.
#[derive(Debug, Clone)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    // Never carries a message. Closing it wakes every pending `sleep`.
    closer: Sender<()>,
    closed: Receiver<()>,
}

impl Default for Cancellation {
    fn default() -> Self {
        let (closer, closed) = channel::bounded(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            closer,
            closed,
        }
    }
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.closer.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration`, waking as soon as [`cancel`](Self::cancel) is
    /// called. Returns `false` if the sleep was cut short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match future::timeout(duration, self.closed.recv()).await {
            Ok(_) => false,
            Err(_) => !self.is_cancelled(),
        }
    }
}
