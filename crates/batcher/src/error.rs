//! Error type for the batching core.

use tessera_common::{BlobKey, BlobStoreError, EncoderError};
use tessera_primitives::merkle::MerkleError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum BatcherError {
    /// No completed encoding results were available to seal. Not fatal; the
    /// caller should retry once more completions have accumulated.
    #[error("no encoded results")]
    NoEncodedResults,

    /// Construction-time misconfiguration. The only fatal error in this
    /// crate.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `start` was called more than once.
    #[error("streamer already started")]
    AlreadyStarted,

    #[error("blob store: {0}")]
    BlobStore(#[from] BlobStoreError),

    /// An encoding request finished with an error. Cancellations are
    /// expected during batch sealing; check
    /// [`is_benign_cancellation`](Self::is_benign_cancellation) before
    /// treating this as a fault.
    #[error("encoding blob {key}: {source}")]
    Encoding {
        key: BlobKey,
        source: EncoderError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("computing batch root: {0}")]
    Merkle(#[from] MerkleError),
}

impl BatcherError {
    /// True for encode failures caused by request cancellation, which occur
    /// whenever a batch seal aborts outstanding work and must not be logged
    /// as faults.
    pub fn is_benign_cancellation(&self) -> bool {
        matches!(self, BatcherError::Encoding { source, .. } if source.is_cancelled())
    }
}

pub(crate) type Result<T> = std::result::Result<T, BatcherError>;
