//! Blob domain types shared between the batching core and its callers.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tessera_primitives::{
    merkle::{MerkleError, MerkleTree},
    sha256, Buf32, Buf48,
};

/// Unique identifier of a blob, derived from its content and the dispersal
/// request it arrived in.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Default,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct BlobKey(Buf32);

impl BlobKey {
    /// Derives the key from the raw payload and the request nonce, so the
    /// same payload dispersed twice yields distinct keys.
    pub fn compute(data: &[u8], request_nonce: u64) -> Self {
        let payload_hash = sha256(data);
        let mut preimage = [0u8; 40];
        preimage[..32].copy_from_slice(payload_hash.as_slice());
        preimage[32..].copy_from_slice(&request_nonce.to_le_bytes());
        Self(sha256(&preimage))
    }
}

impl From<Buf32> for BlobKey {
    fn from(value: Buf32) -> Self {
        Self(value)
    }
}

impl From<BlobKey> for Buf32 {
    fn from(value: BlobKey) -> Self {
        value.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Lifecycle status of a blob in the durable store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BlobStatus {
    /// Accepted and awaiting encoding/batching.
    Processing,
    /// Included in a confirmed batch.
    Confirmed,
    /// Terminally failed; will not be retried.
    Failed,
}

/// Durable record describing a blob. Read-only to the batching core.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlobMetadata {
    blob_key: BlobKey,
    blob_size: u64,
    status: BlobStatus,
}

impl BlobMetadata {
    pub fn new(blob_key: BlobKey, blob_size: u64, status: BlobStatus) -> Self {
        Self {
            blob_key,
            blob_size,
            status,
        }
    }

    pub fn blob_key(&self) -> BlobKey {
        self.blob_key
    }

    /// Payload size in bytes.
    pub fn blob_size(&self) -> u64 {
        self.blob_size
    }

    pub fn status(&self) -> BlobStatus {
        self.status
    }
}

/// Raw blob payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Blob {
    pub data: Vec<u8>,
}

/// Opaque polynomial commitment (compressed curve point).
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Default,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Commitment(Buf48);

impl Commitment {
    pub const fn new(bytes: Buf48) -> Self {
        Self(bytes)
    }

    /// Serialized size in bytes, counted toward encoded-artifact totals.
    pub const fn len_bytes(&self) -> u64 {
        Buf48::LEN as u64
    }
}

impl From<Buf48> for Commitment {
    fn from(value: Buf48) -> Self {
        Self(value)
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Commitment to a blob along with its length in symbols.
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct BlobCommitments {
    pub commitment: Commitment,
    /// Blob length in symbols.
    pub length: u64,
}

/// A single erasure-coded chunk of a blob.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Chunk {
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Per-blob header committed to by the batch root.
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct BlobHeader {
    pub commitments: BlobCommitments,
}

impl BlobHeader {
    /// Hash of the canonical (borsh) encoding; the Merkle leaf for this
    /// blob.
    pub fn compute_hash(&self) -> Buf32 {
        let encoded = borsh::to_vec(self).expect("types: serialize blob header");
        sha256(&encoded)
    }
}

/// Header plus chunk set, the unit carried in a sealed batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncodedBlob {
    pub header: BlobHeader,
    pub chunks: Vec<Chunk>,
}

/// Batch-wide header anchoring the ordered blob headers.
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct BatchHeader {
    pub reference_block_number: u64,
    pub batch_root: Buf32,
}

impl BatchHeader {
    /// Creates a header with a zeroed root placeholder.
    pub fn new(reference_block_number: u64) -> Self {
        Self {
            reference_block_number,
            batch_root: Buf32::zero(),
        }
    }

    /// Computes the commitment root over the ordered header list, storing it
    /// in `batch_root` and returning the tree for proof generation.
    pub fn set_batch_root(&mut self, headers: &[BlobHeader]) -> Result<MerkleTree, MerkleError> {
        let leaves = headers.iter().map(|h| h.compute_hash()).collect();
        let tree = MerkleTree::from_leaves(leaves)?;
        self.batch_root = tree.root();
        Ok(tree)
    }
}
