//! Configuration for the encoding streamer.

use std::time::Duration;

use serde::Deserialize;

fn default_encoding_interval_ms() -> u64 {
    // Dispatch cadence between encoding cycles.
    2_000
}

fn default_encoding_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatcherConfig {
    /// Order of the SRS used by the encoder's trusted setup; upper bound on
    /// chunk lengths.
    pub srs_order: u64,

    /// Maximum number of encoding requests that may sit in the worker
    /// pool's queue. Must be nonzero.
    pub encoding_queue_limit: usize,

    /// Per-request encoding deadline, in milliseconds.
    #[serde(default = "default_encoding_request_timeout_ms")]
    pub encoding_request_timeout_ms: u64,

    /// Interval between dispatch cycles, in milliseconds.
    #[serde(default = "default_encoding_interval_ms")]
    pub encoding_interval_ms: u64,

    /// Target number of chunks per encoded blob. The single-chunk
    /// derivation policy does not consume this yet; it is reserved for
    /// per-operator chunk assignment.
    #[serde(default)]
    pub target_num_chunks: u64,
}

impl BatcherConfig {
    pub fn encoding_request_timeout(&self) -> Duration {
        Duration::from_millis(self.encoding_request_timeout_ms)
    }

    pub fn encoding_interval(&self) -> Duration {
        Duration::from_millis(self.encoding_interval_ms)
    }
}
