//! Prometheus metrics for the encoding streamer.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Registry,
};

lazy_static! {
    /// Registry for all batcher metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Completed encoded blobs currently awaiting batching.
    pub static ref ENCODED_BLOBS: IntGauge = register_int_gauge!(
        "tessera_encoded_blobs",
        "Completed encoded blobs awaiting batching"
    )
    .unwrap();

    /// Accumulated size of completed encoded blobs awaiting batching.
    pub static ref ENCODED_BLOB_BYTES: IntGauge = register_int_gauge!(
        "tessera_encoded_blob_bytes",
        "Total bytes of completed encoded blobs awaiting batching"
    )
    .unwrap();

    /// Failed encoding requests by reason.
    pub static ref ENCODING_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tessera_encoding_failures_total",
        "Encoding requests that finished with an error",
        &["reason"] // reason=[cancelled|timeout|failed]
    )
    .unwrap();

    /// Batches sealed since startup.
    pub static ref BATCHES_SEALED_TOTAL: IntCounter = register_int_counter!(
        "tessera_batches_sealed_total",
        "Batches sealed since startup"
    )
    .unwrap();

    /// Blobs per sealed batch.
    pub static ref BATCH_BLOBS: Histogram = register_histogram!(HistogramOpts::new(
        "tessera_batch_blobs",
        "Number of blobs in each sealed batch"
    )
    .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]))
    .unwrap();
}

/// Registers all batcher metrics with [`struct@REGISTRY`].
pub fn register_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(ENCODED_BLOBS.clone()))?;
    REGISTRY.register(Box::new(ENCODED_BLOB_BYTES.clone()))?;
    REGISTRY.register(Box::new(ENCODING_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BATCHES_SEALED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BATCH_BLOBS.clone()))?;
    Ok(())
}

/// Label value for [`struct@ENCODING_FAILURES_TOTAL`].
pub(crate) fn failure_reason(err: &tessera_common::EncoderError) -> &'static str {
    use tessera_common::EncoderError;
    match err {
        EncoderError::Cancelled => "cancelled",
        EncoderError::Timeout => "timeout",
        EncoderError::Rejected(_) | EncoderError::Transport(_) => "failed",
    }
}
