//! Registry of per-request cancellation handles.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Cancellation handles for every encoding request issued since the last
/// batch seal.
///
/// Encoding requests depend on the reference block number, so when a batch
/// is sealed and the cursor advances, everything still in flight is
/// cancelled and re-requested on a later cycle. Cancelling a token whose
/// request already finished is a no-op.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Mutex<Vec<CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: CancellationToken) {
        self.tokens.lock().push(token);
    }

    /// Cancels every registered handle and empties the registry, returning
    /// how many were cancelled.
    pub fn cancel_all_and_clear(&self) -> usize {
        let mut tokens = self.tokens.lock();
        let count = tokens.len();
        for token in tokens.drain(..) {
            token.cancel();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}
