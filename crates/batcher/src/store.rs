//! In-memory store of encoding requests and their completed artifacts.
//!
//! Exactly one entry exists per blob key at any time: `Requested` while an
//! encoding request is outstanding, `Encoded` once its result has arrived.
//! The dispatcher, response processor, and batch assembler run on
//! independent execution contexts, so every operation takes the single
//! internal lock; raw iteration is never exposed.

use std::collections::HashMap;

use parking_lot::Mutex;
use tessera_common::{BlobCommitments, BlobKey, BlobMetadata, Chunk};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A result arrived for a key with no outstanding request, e.g. after a
    /// seal already removed the entry. The stale result must not resurrect
    /// state.
    #[error("no outstanding encoding request for blob {0}")]
    NotFound(BlobKey),
}

/// Completed encoding artifact for one blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingResult {
    pub metadata: BlobMetadata,
    pub commitments: BlobCommitments,
    pub chunks: Vec<Chunk>,
    /// Batching cursor the result was accumulated under.
    pub reference_block_number: u64,
}

impl EncodingResult {
    /// Bytes this artifact contributes to the accumulated encoded size:
    /// chunk payloads plus the serialized commitment.
    pub fn encoded_size(&self) -> u64 {
        let chunks: u64 = self.chunks.iter().map(Chunk::len_bytes).sum();
        chunks + self.commitments.commitment.len_bytes()
    }
}

#[derive(Debug)]
enum BlobEncodingState {
    /// Request submitted, no result yet.
    Requested,
    /// Result received and awaiting batching.
    Encoded(EncodingResult),
}

/// Shared store of per-blob encoding state.
#[derive(Debug, Default)]
pub struct EncodedBlobStore {
    entries: Mutex<HashMap<BlobKey, BlobEncodingState>>,
}

impl EncodedBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any entry (requested or encoded) exists for the key. Used to
    /// prevent duplicate dispatch.
    pub fn has_encoding_requested(&self, key: BlobKey) -> bool {
        self.entries.lock().contains_key(&key)
    }

    /// Records an outstanding request. A second call for the same key while
    /// any entry exists is a no-op.
    pub fn put_encoding_request(&self, key: BlobKey) {
        let mut entries = self.entries.lock();
        entries.entry(key).or_insert(BlobEncodingState::Requested);
    }

    /// Transitions a requested entry to encoded. Fails if no requested
    /// entry exists for the result's key.
    pub fn put_encoding_result(&self, result: EncodingResult) -> Result<(), StoreError> {
        let key = result.metadata.blob_key();
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(BlobEncodingState::Requested) => {
                entries.insert(key, BlobEncodingState::Encoded(result));
                Ok(())
            }
            _ => Err(StoreError::NotFound(key)),
        }
    }

    /// Removes any entry for the key, regardless of state. Used when an
    /// encoding request fails so the blob becomes eligible for re-dispatch.
    pub fn delete_encoding_request(&self, key: BlobKey) {
        self.entries.lock().remove(&key);
    }

    /// Removes an encoded entry, leaving requested entries untouched. Used
    /// when a downstream stage rejects a blob after encoding but before
    /// batching.
    pub fn delete_encoding_result(&self, key: BlobKey) {
        let mut entries = self.entries.lock();
        if matches!(entries.get(&key), Some(BlobEncodingState::Encoded(_))) {
            entries.remove(&key);
            debug!(%key, "evicted encoded result");
        }
    }

    /// Returns `(count, total_bytes)` over all encoded entries.
    pub fn encoded_result_size(&self) -> (usize, u64) {
        let entries = self.entries.lock();
        let mut count = 0;
        let mut total = 0u64;
        for state in entries.values() {
            if let BlobEncodingState::Encoded(result) = state {
                count += 1;
                total += result.encoded_size();
            }
        }
        (count, total)
    }

    /// Atomically removes and returns all encoded entries, leaving
    /// requested entries in place. Results recorded after this call belong
    /// to the next generation and are never returned twice.
    pub fn take_encoded_results(&self) -> Vec<EncodingResult> {
        let mut entries = self.entries.lock();
        let keys: Vec<BlobKey> = entries
            .iter()
            .filter(|(_, state)| matches!(state, BlobEncodingState::Encoded(_)))
            .map(|(key, _)| *key)
            .collect();

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(BlobEncodingState::Encoded(result)) = entries.remove(&key) {
                results.push(result);
            }
        }
        results
    }
}
