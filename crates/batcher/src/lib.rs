//! Encoding-and-batching core of the tessera disperser.
//!
//! The [`EncodingStreamer`] pulls blobs awaiting erasure-coded redundancy
//! from the blob store, drives the external encoder under bounded
//! concurrency, accumulates per-blob artifacts in the [`EncodedBlobStore`],
//! and seals them into deterministically-ordered batches anchored by a
//! Merkle commitment root.
//!
//! # Architecture
//!
//! Three activities share the streamer's state:
//!
//! - A timer-driven dispatch loop invokes one encoding cycle per interval.
//!   Admission control caps the worker pool's queue at the configured
//!   limit, so the encoder is never asked to exceed its sustainable
//!   throughput.
//! - A response loop drains the shared results queue, recording artifacts
//!   and firing the [`EncodedSizeNotifier`] when the accumulated encoded
//!   size crosses its threshold.
//! - [`EncodingStreamer::seal_batch`], invoked by the caller on its own
//!   schedule (often on the notifier's signal), cancels everything still in
//!   flight, drains the completed set, and assembles the batch. Cancelled
//!   requests surface as benign failures and their blobs are re-dispatched
//!   on a later cycle under the new reference block number.
//!
//! # Usage
//!
//! ```ignore
//! use tessera_batcher::{BatcherConfig, EncodedSizeNotifier, EncodingStreamer};
//!
//! let (notifier, mut batch_signal) = EncodedSizeNotifier::channel(batch_size_threshold);
//! let streamer = Arc::new(EncodingStreamer::new(
//!     config,
//!     blob_store,
//!     encoder_client,
//!     notifier,
//!     worker_pool,
//! )?);
//!
//! streamer.start(lifetime.clone())?;
//!
//! // Seal on the notifier's signal (or on an independent timer).
//! while batch_signal.recv().await.is_some() {
//!     streamer.set_reference_block_number(chain_state.latest_block());
//!     match streamer.seal_batch() {
//!         Ok(batch) => dispatch_downstream(batch),
//!         Err(BatcherError::NoEncodedResults) => {} // retry on the next signal
//!         Err(err) => tracing::warn!(%err, "seal failed"),
//!     }
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod registry;
pub mod store;
pub mod streamer;

pub use batch::Batch;
pub use config::BatcherConfig;
pub use error::BatcherError;
pub use notifier::EncodedSizeNotifier;
pub use registry::CancellationRegistry;
pub use store::{EncodedBlobStore, EncodingResult, StoreError};
pub use streamer::{EncodingResponse, EncodingStreamer};
