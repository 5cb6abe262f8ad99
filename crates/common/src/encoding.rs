//! Encoding parameter arithmetic and structural validation.
//!
//! Blobs are measured in field-element symbols of [`SYMBOL_SIZE_BYTES`]
//! bytes. Chunk lengths are rounded up to a power of two so they line up
//! with the encoder's FFT domains, and every parameter set is bounded by
//! the SRS order of the trusted setup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes of payload carried per field-element symbol.
pub const SYMBOL_SIZE_BYTES: u64 = 31;

/// Length of a payload in symbols, rounding the trailing partial symbol up.
pub fn blob_length_symbols(blob_size_bytes: u64) -> u64 {
    blob_size_bytes.div_ceil(SYMBOL_SIZE_BYTES)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("chunk length must be nonzero")]
    ZeroChunkLength,

    #[error("chunk count must be nonzero")]
    ZeroNumChunks,

    #[error("blob length {0} symbols is too large to encode")]
    BlobTooLarge(u64),

    #[error("chunk length {chunk_length} exceeds SRS order {srs_order}")]
    ExceedsSrsOrder { chunk_length: u64, srs_order: u64 },

    #[error("parameters cover {covered} symbols, need {required}")]
    InsufficientCoverage { covered: u128, required: u128 },
}

/// Parameters handed to the encoding service for one blob.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EncodingParams {
    chunk_length: u64,
    num_chunks: u64,
}

impl EncodingParams {
    /// Builds parameters from a requested chunk length and count. The chunk
    /// length is rounded up to the next power of two.
    pub fn new(chunk_length: u64, num_chunks: u64) -> Result<Self, ParamsError> {
        if chunk_length == 0 {
            return Err(ParamsError::ZeroChunkLength);
        }
        if num_chunks == 0 {
            return Err(ParamsError::ZeroNumChunks);
        }
        let chunk_length = chunk_length
            .checked_next_power_of_two()
            .ok_or(ParamsError::BlobTooLarge(chunk_length))?;
        Ok(Self {
            chunk_length,
            num_chunks,
        })
    }

    /// Derives parameters for a blob of `blob_length` symbols under the
    /// fixed single-chunk policy: one chunk at twice the blob length, a 2x
    /// redundancy factor with no further splitting.
    pub fn for_blob(blob_length: u64) -> Result<Self, ParamsError> {
        let chunk_length = blob_length
            .checked_mul(2)
            .ok_or(ParamsError::BlobTooLarge(blob_length))?;
        Self::new(chunk_length, 1)
    }

    /// Chunk length in symbols.
    pub fn chunk_length(&self) -> u64 {
        self.chunk_length
    }

    pub fn num_chunks(&self) -> u64 {
        self.num_chunks
    }

    /// Checks the structural bound: the chunk length must fit within the
    /// SRS order, and the parameters must cover the blob at the 2x
    /// redundancy factor.
    pub fn validate(&self, blob_length: u64, srs_order: u64) -> Result<(), ParamsError> {
        if self.chunk_length > srs_order {
            return Err(ParamsError::ExceedsSrsOrder {
                chunk_length: self.chunk_length,
                srs_order,
            });
        }

        let covered = self.chunk_length as u128 * self.num_chunks as u128;
        let required = blob_length as u128 * 2;
        if covered < required {
            return Err(ParamsError::InsufficientCoverage { covered, required });
        }

        Ok(())
    }
}
