//! Interfaces to the batching core's external collaborators.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    encoding::EncodingParams,
    types::{Blob, BlobCommitments, BlobKey, BlobMetadata, BlobStatus, Chunk},
};

#[derive(Debug, Clone, Error)]
pub enum BlobStoreError {
    #[error("blob {0} not found")]
    NotFound(BlobKey),

    #[error("store backend: {0}")]
    Backend(String),
}

/// Durable blob store the dispatcher polls for work.
///
/// Implementations live outside this workspace; the core only reads
/// metadata and payloads and flips terminally-failed blobs to
/// [`BlobStatus::Failed`].
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns metadata for every blob currently in `status`.
    async fn get_metadata_by_status(
        &self,
        status: BlobStatus,
    ) -> Result<Vec<BlobMetadata>, BlobStoreError>;

    /// Fetches the raw payloads for the given metadata records.
    async fn get_blobs(
        &self,
        metadata: Vec<BlobMetadata>,
    ) -> Result<HashMap<BlobKey, Blob>, BlobStoreError>;

    /// Marks a blob as terminally failed. It will no longer be returned by
    /// [`Self::get_metadata_by_status`] for `Processing`.
    async fn mark_blob_failed(&self, key: BlobKey) -> Result<(), BlobStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum EncoderError {
    /// The request was cancelled before completing, normally because a
    /// batch was sealed while the request was in flight.
    #[error("encoding request cancelled")]
    Cancelled,

    #[error("encoding request timed out")]
    Timeout,

    #[error("encoder rejected request: {0}")]
    Rejected(String),

    #[error("encoder transport: {0}")]
    Transport(String),
}

impl EncoderError {
    /// Whether the failure is an expected cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EncoderError::Cancelled)
    }
}

/// External erasure-coding service. Takes raw bytes plus parameters and
/// returns a commitment and chunk set; the coding math is opaque here.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait EncoderClient: Send + Sync {
    async fn encode_blob(
        &self,
        data: Vec<u8>,
        params: EncodingParams,
    ) -> Result<(BlobCommitments, Vec<Chunk>), EncoderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_error_cancellation_classification() {
        assert!(EncoderError::Cancelled.is_cancelled());
        assert!(!EncoderError::Timeout.is_cancelled());
        assert!(!EncoderError::Transport("reset".into()).is_cancelled());
    }
}
