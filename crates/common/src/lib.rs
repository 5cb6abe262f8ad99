//! Shared types and collaborator interfaces for the tessera disperser.
//!
//! This crate defines the blob domain model (keys, metadata, commitments,
//! headers), the encoding parameter arithmetic, and the traits through which
//! the batching core talks to its collaborators: the durable blob store, the
//! external encoding service, and the bounded worker pool. Implementations
//! of the durable store and the encoder live outside this workspace; tests
//! use the mockall mocks exposed behind the `test-utils` feature.

pub mod encoding;
pub mod logging;
pub mod pool;
pub mod traits;
pub mod types;

pub use encoding::{blob_length_symbols, EncodingParams, ParamsError, SYMBOL_SIZE_BYTES};
pub use pool::WorkerPool;
pub use traits::{BlobStore, BlobStoreError, EncoderClient, EncoderError};
#[cfg(feature = "test-utils")]
pub use traits::{MockBlobStore, MockEncoderClient};
pub use types::{
    BatchHeader, Blob, BlobCommitments, BlobHeader, BlobKey, BlobMetadata, BlobStatus, Chunk,
    Commitment, EncodedBlob,
};
