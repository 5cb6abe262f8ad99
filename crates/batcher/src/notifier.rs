//! One-shot notification that the accumulated encoded size warrants a
//! batch.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info};

/// Armed/fired latch over a cumulative-size threshold.
///
/// The latch fires at most once between two [`reset`](Self::reset) calls no
/// matter how many completions cross the threshold; `reset` is called once
/// per batch seal, after the completed set has been drained.
#[derive(Debug)]
pub struct EncodedSizeNotifier {
    notify_tx: mpsc::Sender<()>,
    threshold: u64,
    active: AtomicBool,
}

impl EncodedSizeNotifier {
    /// Creates a notifier emitting on `notify_tx` once `threshold` bytes of
    /// encoded results have accumulated. A threshold of zero disables it.
    pub fn new(notify_tx: mpsc::Sender<()>, threshold: u64) -> Self {
        Self {
            notify_tx,
            threshold,
            active: AtomicBool::new(true),
        }
    }

    /// Creates a notifier together with its signal channel.
    pub fn channel(threshold: u64) -> (Self, mpsc::Receiver<()>) {
        // Capacity 1: a pending signal already says everything a second one
        // would.
        let (tx, rx) = mpsc::channel(1);
        (Self::new(tx, threshold), rx)
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Fires the signal if the threshold is enabled, crossed, and the latch
    /// is still armed.
    ///
    /// Emission is best-effort and never blocks: if the receiver has not
    /// drained the previous signal the new one is dropped, which is
    /// equivalent from the receiver's point of view.
    pub fn maybe_signal(&self, total_bytes: u64) {
        if self.threshold == 0 || total_bytes < self.threshold {
            return;
        }

        if self
            .active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!(
                total_bytes,
                threshold = self.threshold,
                "encoded size threshold reached"
            );
            if self.notify_tx.try_send(()).is_err() {
                debug!("batch signal already pending, dropping");
            }
        }
    }

    /// Re-arms the latch. Called exactly once per batch seal.
    pub fn reset(&self) {
        self.active.store(true, Ordering::Release);
    }
}
