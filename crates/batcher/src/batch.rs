//! Batch assembly from drained encoding results.

use std::collections::BTreeMap;

use tessera_common::{BatchHeader, BlobHeader, BlobKey, BlobMetadata, EncodedBlob};
use tessera_primitives::merkle::MerkleTree;

use crate::{
    error::{BatcherError, Result},
    store::EncodingResult,
};

/// A sealed batch: four parallel collections in one shared index order plus
/// the header carrying the commitment root.
///
/// For every `i`, `encoded_blobs[i]`, `blob_headers[i]`, and
/// `blob_metadata[i]` describe the same blob. The order is ascending blob
/// key, so the same completed set always commits to the same root.
#[derive(Debug)]
pub struct Batch {
    pub encoded_blobs: Vec<EncodedBlob>,
    pub blob_headers: Vec<BlobHeader>,
    pub blob_metadata: Vec<BlobMetadata>,
    pub batch_header: BatchHeader,
    /// Tree over the ordered header hashes, kept for inclusion-proof
    /// generation downstream.
    pub merkle_tree: MerkleTree,
}

impl Batch {
    /// Builds a batch from drained results under the given batching cursor.
    pub(crate) fn assemble(
        results: Vec<EncodingResult>,
        reference_block_number: u64,
    ) -> Result<Self> {
        // One bundle per distinct key; the BTreeMap fixes the committed
        // order to ascending blob key.
        let mut by_key: BTreeMap<BlobKey, EncodingResult> = BTreeMap::new();
        for result in results {
            by_key.entry(result.metadata.blob_key()).or_insert(result);
        }

        if by_key.is_empty() {
            return Err(BatcherError::NoEncodedResults);
        }

        let mut encoded_blobs = Vec::with_capacity(by_key.len());
        let mut blob_headers = Vec::with_capacity(by_key.len());
        let mut blob_metadata = Vec::with_capacity(by_key.len());
        for result in by_key.into_values() {
            let header = BlobHeader {
                commitments: result.commitments,
            };
            encoded_blobs.push(EncodedBlob {
                header: header.clone(),
                chunks: result.chunks,
            });
            blob_headers.push(header);
            blob_metadata.push(result.metadata);
        }

        let mut batch_header = BatchHeader::new(reference_block_number);
        let merkle_tree = batch_header.set_batch_root(&blob_headers)?;

        Ok(Self {
            encoded_blobs,
            blob_headers,
            blob_metadata,
            batch_header,
            merkle_tree,
        })
    }

    /// Number of blobs in the batch.
    pub fn len(&self) -> usize {
        self.blob_headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blob_headers.is_empty()
    }
}
