//! Encoding streamer: dispatches encoding requests, processes their
//! completions, and seals batches.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::{runtime::Handle, sync::mpsc, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tessera_common::{
    blob_length_symbols, BlobCommitments, BlobMetadata, BlobStatus, BlobStore, Chunk,
    EncoderClient, EncoderError, EncodingParams, WorkerPool,
};

use crate::{
    batch::Batch,
    config::BatcherConfig,
    error::{BatcherError, Result},
    metrics,
    notifier::EncodedSizeNotifier,
    registry::CancellationRegistry,
    store::{EncodedBlobStore, EncodingResult},
};

/// Depth of the shared results queue between encoding jobs and the response
/// loop.
const RESPONSE_QUEUE_DEPTH: usize = 256;

/// Completion or failure of one encoding request, posted on the results
/// queue by the worker job.
#[derive(Debug)]
pub struct EncodingResponse {
    pub metadata: BlobMetadata,
    pub outcome: std::result::Result<(BlobCommitments, Vec<Chunk>), EncoderError>,
}

/// Drives blobs awaiting encoding through the external encoder and
/// accumulates their artifacts until a batch is sealed.
///
/// Three activities share this state: the timer-driven dispatch loop, the
/// response loop draining the results queue (both spawned by
/// [`start`](Self::start)), and [`seal_batch`](Self::seal_batch), which the
/// caller invokes at its own cadence. Seal invocations must be externally
/// serialized; the two loops are internal and safe against each other.
pub struct EncodingStreamer<S, E> {
    config: BatcherConfig,
    encoded_store: EncodedBlobStore,
    reference_block_number: AtomicU64,
    notifier: EncodedSizeNotifier,
    cancel_registry: CancellationRegistry,
    blob_store: Arc<S>,
    encoder: Arc<E>,
    pool: Arc<dyn WorkerPool>,
    response_tx: mpsc::Sender<EncodingResponse>,
    response_rx: Mutex<Option<mpsc::Receiver<EncodingResponse>>>,
}

impl<S, E> EncodingStreamer<S, E>
where
    S: BlobStore + 'static,
    E: EncoderClient + 'static,
{
    /// Creates a streamer. Fails fast on a zero encoding queue limit.
    pub fn new(
        config: BatcherConfig,
        blob_store: Arc<S>,
        encoder: Arc<E>,
        notifier: EncodedSizeNotifier,
        pool: Arc<dyn WorkerPool>,
    ) -> Result<Self> {
        if config.encoding_queue_limit == 0 {
            return Err(BatcherError::InvalidConfig(
                "encoding_queue_limit must be greater than 0".into(),
            ));
        }

        let (response_tx, response_rx) = mpsc::channel(RESPONSE_QUEUE_DEPTH);
        Ok(Self {
            config,
            encoded_store: EncodedBlobStore::new(),
            reference_block_number: AtomicU64::new(0),
            notifier,
            cancel_registry: CancellationRegistry::new(),
            blob_store,
            encoder,
            pool,
            response_tx,
            response_rx: Mutex::new(Some(response_rx)),
        })
    }

    /// Spawns the dispatch and response loops. Returns immediately; both
    /// loops run until `lifetime` is cancelled.
    pub fn start(self: &Arc<Self>, lifetime: CancellationToken) -> Result<()> {
        let mut response_rx = self
            .response_rx
            .lock()
            .take()
            .ok_or(BatcherError::AlreadyStarted)?;

        let this = self.clone();
        let cancel = lifetime.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    response = response_rx.recv() => {
                        let Some(response) = response else { break };
                        if let Err(err) = this.process_encoding_response(response) {
                            if err.is_benign_cancellation() {
                                debug!(%err, "encoding request cancelled");
                            } else {
                                error!(%err, "error processing encoding response");
                            }
                        }
                    }
                }
            }
            debug!("encoding response loop stopped");
        });

        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.config.encoding_interval());
            ticker.reset(); // Skip the immediate first tick.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = lifetime.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = this.request_encoding_cycle(&lifetime).await {
                            warn!(%err, "encoding request cycle failed");
                        }
                    }
                }
            }
            debug!("encoding dispatch loop stopped");
        });

        Ok(())
    }

    /// One dispatch pass: pulls blobs awaiting encoding and submits as many
    /// requests as the pool's queue has room for.
    pub async fn request_encoding_cycle(&self, lifetime: &CancellationToken) -> Result<()> {
        let metadata = self
            .blob_store
            .get_metadata_by_status(BlobStatus::Processing)
            .await?;

        let mut candidates: Vec<BlobMetadata> = metadata
            .into_iter()
            .filter(|m| !self.encoded_store.has_encoding_requested(m.blob_key()))
            .collect();
        if candidates.is_empty() {
            debug!("no new blobs to encode");
            return Ok(());
        }

        // Admission control: never let the pool's queue exceed the limit.
        let waiting = self.pool.waiting_queue_size();
        let capacity = self.config.encoding_queue_limit.saturating_sub(waiting);
        if capacity == 0 {
            warn!(
                waiting,
                limit = self.config.encoding_queue_limit,
                "encoding queue is full, skipping this cycle"
            );
            return Ok(());
        }
        candidates.truncate(capacity);

        let blobs = self.blob_store.get_blobs(candidates.clone()).await?;
        debug!(num_blobs = candidates.len(), "requesting encoding");

        for metadata in candidates {
            let key = metadata.blob_key();
            let Some(blob) = blobs.get(&key) else {
                warn!(%key, "payload missing for blob awaiting encoding");
                continue;
            };
            self.request_encoding_for_blob(metadata, blob.data.clone(), lifetime)
                .await;
        }

        Ok(())
    }

    /// Validates parameters for one blob and submits its encoding job.
    async fn request_encoding_for_blob(
        &self,
        metadata: BlobMetadata,
        data: Vec<u8>,
        lifetime: &CancellationToken,
    ) {
        let key = metadata.blob_key();
        let blob_length = blob_length_symbols(metadata.blob_size());

        let params = EncodingParams::for_blob(blob_length)
            .and_then(|p| p.validate(blob_length, self.config.srs_order).map(|_| p));
        let params = match params {
            Ok(params) => params,
            Err(err) => {
                // Terminal for this blob; it will not be retried.
                error!(%key, %err, "invalid encoding parameters, failing blob");
                if let Err(err) = self.blob_store.mark_blob_failed(key).await {
                    error!(%key, %err, "error marking blob failed");
                }
                return;
            }
        };

        // An encoding request is tied to the reference block number, so a
        // batch seal cancels everything still in flight via the registry.
        let request_cancel = lifetime.child_token();
        self.cancel_registry.register(request_cancel.clone());
        self.encoded_store.put_encoding_request(key);

        let encoder = self.encoder.clone();
        let response_tx = self.response_tx.clone();
        let timeout = self.config.encoding_request_timeout();
        let handle = Handle::current();
        self.pool.execute(Box::new(move || {
            let outcome = handle.block_on(async {
                tokio::select! {
                    _ = request_cancel.cancelled() => Err(EncoderError::Cancelled),
                    res = tokio::time::timeout(timeout, encoder.encode_blob(data, params)) => {
                        match res {
                            Ok(outcome) => outcome,
                            Err(_) => Err(EncoderError::Timeout),
                        }
                    }
                }
            });
            drop(request_cancel);
            if response_tx
                .blocking_send(EncodingResponse { metadata, outcome })
                .is_err()
            {
                warn!("encoding response receiver dropped");
            }
        }));
    }

    /// Consumes one message from the results queue.
    ///
    /// Failures remove the outstanding request so the blob becomes eligible
    /// for re-dispatch on a later cycle; successes are recorded and may
    /// trigger the size notifier.
    pub fn process_encoding_response(&self, response: EncodingResponse) -> Result<()> {
        let key = response.metadata.blob_key();
        let (commitments, chunks) = match response.outcome {
            Ok(encoded) => encoded,
            Err(err) => {
                self.encoded_store.delete_encoding_request(key);
                metrics::ENCODING_FAILURES_TOTAL
                    .with_label_values(&[metrics::failure_reason(&err)])
                    .inc();
                return Err(BatcherError::Encoding { key, source: err });
            }
        };

        let result = EncodingResult {
            metadata: response.metadata,
            commitments,
            chunks,
            reference_block_number: self.reference_block_number(),
        };
        self.encoded_store.put_encoding_result(result)?;

        let (count, total_bytes) = self.encoded_store.encoded_result_size();
        metrics::ENCODED_BLOBS.set(count as i64);
        metrics::ENCODED_BLOB_BYTES.set(total_bytes as i64);
        self.notifier.maybe_signal(total_bytes);

        Ok(())
    }

    /// Seals a batch from all completed artifacts.
    ///
    /// Outstanding encoding requests are force-cancelled first: their
    /// results would be tied to a cursor that is being consumed. On an
    /// empty completed set this fails with
    /// [`BatcherError::NoEncodedResults`] and performs no further mutation,
    /// so the notifier stays in whatever state it was in. Must not run
    /// concurrently with itself.
    pub fn seal_batch(&self) -> Result<Batch> {
        let cancelled = self.cancel_registry.cancel_all_and_clear();
        if cancelled > 0 {
            info!(count = cancelled, "cancelled outstanding encoding requests");
        }

        let results = self.encoded_store.take_encoded_results();
        if results.is_empty() {
            return Err(BatcherError::NoEncodedResults);
        }

        self.notifier.reset();

        let reference_block_number = self.reference_block_number();
        if reference_block_number == 0 {
            warn!("sealing batch with zero reference block number");
        }

        let batch = Batch::assemble(results, reference_block_number)?;

        // The cursor is consumed; the caller supplies a fresh one before
        // the next seal.
        self.reference_block_number.store(0, Ordering::Release);

        let (count, total_bytes) = self.encoded_store.encoded_result_size();
        metrics::ENCODED_BLOBS.set(count as i64);
        metrics::ENCODED_BLOB_BYTES.set(total_bytes as i64);
        metrics::BATCHES_SEALED_TOTAL.inc();
        metrics::BATCH_BLOBS.observe(batch.len() as f64);

        info!(
            num_blobs = batch.len(),
            reference_block_number, "sealed batch"
        );
        Ok(batch)
    }

    /// Evicts a completed-but-not-yet-batched artifact, so a blob rejected
    /// by a later pipeline stage can be retried from scratch.
    pub fn remove_encoded_result(&self, metadata: &BlobMetadata) {
        self.encoded_store.delete_encoding_result(metadata.blob_key());
    }

    /// Current batching cursor.
    pub fn reference_block_number(&self) -> u64 {
        self.reference_block_number.load(Ordering::Acquire)
    }

    /// Updates the batching cursor from the caller's chain-state view.
    pub fn set_reference_block_number(&self, block_number: u64) {
        self.reference_block_number
            .store(block_number, Ordering::Release);
    }

    /// `(count, total_bytes)` over completed artifacts awaiting batching.
    pub fn encoded_result_size(&self) -> (usize, u64) {
        self.encoded_store.encoded_result_size()
    }
}

impl<S, E> std::fmt::Debug for EncodingStreamer<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodingStreamer")
            .field("config", &self.config)
            .field("reference_block_number", &self.reference_block_number)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::AtomicUsize,
        time::Duration,
    };

    use tessera_common::{
        pool::Job, Blob, BlobKey, Commitment, MockBlobStore, MockEncoderClient,
    };
    use tessera_primitives::Buf48;

    use super::*;

    fn test_config(queue_limit: usize) -> BatcherConfig {
        BatcherConfig {
            srs_order: 1 << 20,
            encoding_queue_limit: queue_limit,
            encoding_request_timeout_ms: 1_000,
            encoding_interval_ms: 20,
            target_num_chunks: 0,
        }
    }

    fn test_metadata(tag: u8, size: u64) -> BlobMetadata {
        BlobMetadata::new(BlobKey::compute(&[tag], 0), size, BlobStatus::Processing)
    }

    fn test_commitments(tag: u8) -> BlobCommitments {
        BlobCommitments {
            commitment: Commitment::new(Buf48::new([tag; 48])),
            length: 16,
        }
    }

    fn success_response(tag: u8, size: u64, chunk_bytes: usize) -> EncodingResponse {
        EncodingResponse {
            metadata: test_metadata(tag, size),
            outcome: Ok((
                test_commitments(tag),
                vec![Chunk {
                    data: vec![tag; chunk_bytes],
                }],
            )),
        }
    }

    /// Pool that records jobs without running them and reports a fixed
    /// waiting-queue depth.
    #[derive(Default)]
    struct ManualPool {
        jobs: Mutex<Vec<Job>>,
        waiting: usize,
    }

    impl ManualPool {
        fn with_waiting(waiting: usize) -> Self {
            Self {
                jobs: Mutex::new(Vec::new()),
                waiting,
            }
        }

        fn job_count(&self) -> usize {
            self.jobs.lock().len()
        }
    }

    impl WorkerPool for ManualPool {
        fn execute(&self, job: Job) {
            self.jobs.lock().push(job);
        }

        fn waiting_queue_size(&self) -> usize {
            self.waiting
        }
    }

    fn streamer_with(
        config: BatcherConfig,
        blob_store: MockBlobStore,
        encoder: MockEncoderClient,
        notifier: EncodedSizeNotifier,
        pool: Arc<dyn WorkerPool>,
    ) -> EncodingStreamer<MockBlobStore, MockEncoderClient> {
        EncodingStreamer::new(config, Arc::new(blob_store), Arc::new(encoder), notifier, pool)
            .expect("test: create streamer")
    }

    #[test]
    fn test_new_rejects_zero_queue_limit() {
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let result = EncodingStreamer::new(
            test_config(0),
            Arc::new(MockBlobStore::new()),
            Arc::new(MockEncoderClient::new()),
            notifier,
            Arc::new(ManualPool::default()),
        );
        assert!(matches!(result.unwrap_err(), BatcherError::InvalidConfig(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dispatch_and_process_roundtrip() {
        // Two blobs awaiting encoding flow through dispatch, the worker
        // pool, response processing, and a seal.
        let metadata = vec![test_metadata(1, 100), test_metadata(2, 100)];

        let mut blob_store = MockBlobStore::new();
        let listed = metadata.clone();
        blob_store
            .expect_get_metadata_by_status()
            .returning(move |_| Ok(listed.clone()));
        blob_store.expect_get_blobs().returning(|requested| {
            Ok(requested
                .iter()
                .map(|m| {
                    (
                        m.blob_key(),
                        Blob {
                            data: vec![0xab; m.blob_size() as usize],
                        },
                    )
                })
                .collect::<HashMap<_, _>>())
        });

        let mut encoder = MockEncoderClient::new();
        encoder.expect_encode_blob().returning(|_, params| {
            Ok((
                BlobCommitments {
                    commitment: Commitment::new(Buf48::new([7; 48])),
                    length: params.chunk_length(),
                },
                vec![Chunk { data: vec![0; 64] }],
            ))
        });

        let (notifier, _notify_rx) = EncodedSizeNotifier::channel(0);
        let pool = Arc::new(threadpool::ThreadPool::new(2));
        let streamer = streamer_with(test_config(8), blob_store, encoder, notifier, pool);

        let lifetime = CancellationToken::new();
        streamer.request_encoding_cycle(&lifetime).await.unwrap();

        let mut response_rx = streamer
            .response_rx
            .lock()
            .take()
            .expect("test: receiver present");
        for _ in 0..2 {
            let response = tokio::time::timeout(Duration::from_secs(5), response_rx.recv())
                .await
                .expect("test: response in time")
                .expect("test: channel open");
            streamer.process_encoding_response(response).unwrap();
        }

        assert_eq!(streamer.encoded_result_size().0, 2);

        streamer.set_reference_block_number(10);
        let batch = streamer.seal_batch().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.batch_header.reference_block_number, 10);
        assert_eq!(streamer.encoded_result_size(), (0, 0));
    }

    #[tokio::test]
    async fn test_dispatch_respects_queue_capacity() {
        // Queue limit 5 with 3 already waiting: at most 2 of the 10
        // eligible blobs may be submitted.
        let metadata: Vec<BlobMetadata> = (0..10).map(|i| test_metadata(i, 100)).collect();

        let mut blob_store = MockBlobStore::new();
        let listed = metadata.clone();
        blob_store
            .expect_get_metadata_by_status()
            .returning(move |_| Ok(listed.clone()));
        blob_store
            .expect_get_blobs()
            .withf(|requested| requested.len() == 2)
            .returning(|requested| {
                Ok(requested
                    .iter()
                    .map(|m| (m.blob_key(), Blob { data: vec![1; 100] }))
                    .collect::<HashMap<_, _>>())
            });

        let pool = Arc::new(ManualPool::with_waiting(3));
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let streamer = streamer_with(
            test_config(5),
            blob_store,
            MockEncoderClient::new(),
            notifier,
            pool.clone(),
        );

        streamer
            .request_encoding_cycle(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(pool.job_count(), 2);
        assert_eq!(streamer.cancel_registry.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_skips_when_queue_full() {
        let mut blob_store = MockBlobStore::new();
        blob_store
            .expect_get_metadata_by_status()
            .returning(|_| Ok(vec![test_metadata(1, 100)]));
        blob_store.expect_get_blobs().never();

        let pool = Arc::new(ManualPool::with_waiting(5));
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let streamer = streamer_with(
            test_config(5),
            blob_store,
            MockEncoderClient::new(),
            notifier,
            pool.clone(),
        );

        streamer
            .request_encoding_cycle(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(pool.job_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_filters_outstanding_requests() {
        let metadata = test_metadata(1, 100);
        let mut blob_store = MockBlobStore::new();
        let listed = metadata.clone();
        blob_store
            .expect_get_metadata_by_status()
            .returning(move |_| Ok(vec![listed.clone()]));
        blob_store.expect_get_blobs().never();

        let pool = Arc::new(ManualPool::default());
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let streamer = streamer_with(
            test_config(5),
            blob_store,
            MockEncoderClient::new(),
            notifier,
            pool.clone(),
        );

        // A request is already outstanding for the key.
        streamer
            .encoded_store
            .put_encoding_request(metadata.blob_key());

        streamer
            .request_encoding_cycle(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(pool.job_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_params_marks_blob_failed() {
        // 496 bytes = 16 symbols -> chunk length 32 > SRS order 8.
        let metadata = test_metadata(1, 496);
        let key = metadata.blob_key();

        let mut blob_store = MockBlobStore::new();
        let listed = metadata.clone();
        blob_store
            .expect_get_metadata_by_status()
            .returning(move |_| Ok(vec![listed.clone()]));
        blob_store.expect_get_blobs().returning(move |requested| {
            Ok(requested
                .iter()
                .map(|m| (m.blob_key(), Blob { data: vec![1; 496] }))
                .collect::<HashMap<_, _>>())
        });
        blob_store
            .expect_mark_blob_failed()
            .withf(move |k| *k == key)
            .times(1)
            .returning(|_| Ok(()));

        let pool = Arc::new(ManualPool::default());
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let mut config = test_config(5);
        config.srs_order = 8;
        let streamer = streamer_with(
            config,
            blob_store,
            MockEncoderClient::new(),
            notifier,
            pool.clone(),
        );

        streamer
            .request_encoding_cycle(&CancellationToken::new())
            .await
            .unwrap();

        // No work submitted and no entry recorded for the failed blob.
        assert_eq!(pool.job_count(), 0);
        assert!(!streamer.encoded_store.has_encoding_requested(key));
    }

    #[test]
    fn test_process_failure_removes_request() {
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let streamer = streamer_with(
            test_config(5),
            MockBlobStore::new(),
            MockEncoderClient::new(),
            notifier,
            Arc::new(ManualPool::default()),
        );

        let metadata = test_metadata(1, 100);
        let key = metadata.blob_key();
        streamer.encoded_store.put_encoding_request(key);

        let err = streamer
            .process_encoding_response(EncodingResponse {
                metadata,
                outcome: Err(EncoderError::Transport("connection reset".into())),
            })
            .unwrap_err();

        assert!(!err.is_benign_cancellation());
        // Entry removed: the blob is eligible for re-dispatch.
        assert!(!streamer.encoded_store.has_encoding_requested(key));
    }

    #[test]
    fn test_process_cancellation_is_benign() {
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let streamer = streamer_with(
            test_config(5),
            MockBlobStore::new(),
            MockEncoderClient::new(),
            notifier,
            Arc::new(ManualPool::default()),
        );

        let metadata = test_metadata(1, 100);
        let key = metadata.blob_key();
        streamer.encoded_store.put_encoding_request(key);

        let err = streamer
            .process_encoding_response(EncodingResponse {
                metadata,
                outcome: Err(EncoderError::Cancelled),
            })
            .unwrap_err();

        assert!(err.is_benign_cancellation());
        assert!(!streamer.encoded_store.has_encoding_requested(key));
    }

    #[test]
    fn test_late_result_after_seal_reports_not_found() {
        // A result for a key whose request was removed by a prior seal's
        // cancellation must not resurrect state.
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let streamer = streamer_with(
            test_config(5),
            MockBlobStore::new(),
            MockEncoderClient::new(),
            notifier,
            Arc::new(ManualPool::default()),
        );

        let response = success_response(1, 100, 32);
        let key = response.metadata.blob_key();
        let err = streamer.process_encoding_response(response).unwrap_err();

        assert!(matches!(err, BatcherError::Store(_)));
        assert!(!streamer.encoded_store.has_encoding_requested(key));
        assert_eq!(streamer.encoded_result_size(), (0, 0));
    }

    #[test]
    fn test_notifier_fires_once_at_threshold() {
        // Threshold 1000, three completions of 400 encoded bytes each
        // (352-byte chunk + 48-byte commitment): one signal, after the
        // third.
        let (notifier, mut notify_rx) = EncodedSizeNotifier::channel(1000);
        let streamer = streamer_with(
            test_config(5),
            MockBlobStore::new(),
            MockEncoderClient::new(),
            notifier,
            Arc::new(ManualPool::default()),
        );

        for tag in [1u8, 2, 3] {
            let response = success_response(tag, 100, 352);
            streamer
                .encoded_store
                .put_encoding_request(response.metadata.blob_key());
            streamer.process_encoding_response(response).unwrap();

            if tag < 3 {
                assert!(notify_rx.try_recv().is_err(), "fired below threshold");
            }
        }

        assert!(notify_rx.try_recv().is_ok(), "no signal after crossing");
        assert!(notify_rx.try_recv().is_err(), "signalled more than once");
    }

    #[test]
    fn test_seal_batch_cancels_and_orders() {
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let streamer = streamer_with(
            test_config(5),
            MockBlobStore::new(),
            MockEncoderClient::new(),
            notifier,
            Arc::new(ManualPool::default()),
        );

        // Two completed, one still in flight with a registered handle.
        for tag in [5u8, 1] {
            let response = success_response(tag, 100, 32);
            streamer
                .encoded_store
                .put_encoding_request(response.metadata.blob_key());
            streamer.process_encoding_response(response).unwrap();
        }
        let in_flight = test_metadata(9, 100).blob_key();
        streamer.encoded_store.put_encoding_request(in_flight);
        let token = CancellationToken::new();
        streamer.cancel_registry.register(token.clone());

        streamer.set_reference_block_number(77);
        let batch = streamer.seal_batch().unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.batch_header.reference_block_number, 77);
        assert!(token.is_cancelled());
        assert!(streamer.cancel_registry.is_empty());
        // Cursor consumed.
        assert_eq!(streamer.reference_block_number(), 0);
        // The in-flight request entry survives the drain.
        assert!(streamer.encoded_store.has_encoding_requested(in_flight));

        // Batch order is ascending blob key across all collections.
        let keys: Vec<BlobKey> = batch.blob_metadata.iter().map(|m| m.blob_key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        // Nothing left to seal.
        assert!(matches!(
            streamer.seal_batch().unwrap_err(),
            BatcherError::NoEncodedResults
        ));
    }

    #[test]
    fn test_empty_seal_does_not_reset_notifier() {
        let (notifier, mut notify_rx) = EncodedSizeNotifier::channel(100);
        let streamer = streamer_with(
            test_config(5),
            MockBlobStore::new(),
            MockEncoderClient::new(),
            notifier,
            Arc::new(ManualPool::default()),
        );

        // Fire the notifier.
        streamer.notifier.maybe_signal(500);
        assert!(notify_rx.try_recv().is_ok());

        // An empty seal fails and must not re-arm the latch.
        assert!(matches!(
            streamer.seal_batch().unwrap_err(),
            BatcherError::NoEncodedResults
        ));
        streamer.notifier.maybe_signal(500);
        assert!(notify_rx.try_recv().is_err());

        // A successful seal re-arms it.
        let response = success_response(1, 100, 32);
        streamer
            .encoded_store
            .put_encoding_request(response.metadata.blob_key());
        streamer.process_encoding_response(response).unwrap();
        streamer.seal_batch().unwrap();

        streamer.notifier.maybe_signal(500);
        assert!(notify_rx.try_recv().is_ok());
    }

    #[test]
    fn test_remove_encoded_result_evicts() {
        let (notifier, _rx) = EncodedSizeNotifier::channel(0);
        let streamer = streamer_with(
            test_config(5),
            MockBlobStore::new(),
            MockEncoderClient::new(),
            notifier,
            Arc::new(ManualPool::default()),
        );

        let response = success_response(1, 100, 32);
        let metadata = response.metadata.clone();
        streamer
            .encoded_store
            .put_encoding_request(metadata.blob_key());
        streamer.process_encoding_response(response).unwrap();
        assert_eq!(streamer.encoded_result_size().0, 1);

        streamer.remove_encoded_result(&metadata);
        assert_eq!(streamer.encoded_result_size(), (0, 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_loops_run_and_stop_on_cancel() {
        let dispatch_calls = Arc::new(AtomicUsize::new(0));

        let mut blob_store = MockBlobStore::new();
        let calls = dispatch_calls.clone();
        let listed = test_metadata(1, 100);
        blob_store.expect_get_metadata_by_status().returning(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![listed.clone()])
        });
        blob_store.expect_get_blobs().returning(|requested| {
            Ok(requested
                .iter()
                .map(|m| (m.blob_key(), Blob { data: vec![1; 100] }))
                .collect::<HashMap<_, _>>())
        });

        let mut encoder = MockEncoderClient::new();
        encoder.expect_encode_blob().returning(|_, _| {
            Ok((
                BlobCommitments {
                    commitment: Commitment::new(Buf48::new([7; 48])),
                    length: 8,
                },
                vec![Chunk { data: vec![0; 16] }],
            ))
        });

        let (notifier, _notify_rx) = EncodedSizeNotifier::channel(0);
        let pool = Arc::new(threadpool::ThreadPool::new(1));
        let streamer = Arc::new(streamer_with(
            test_config(4),
            blob_store,
            encoder,
            notifier,
            pool,
        ));

        let lifetime = CancellationToken::new();
        streamer.start(lifetime.clone()).unwrap();
        assert!(matches!(
            streamer.start(lifetime.clone()).unwrap_err(),
            BatcherError::AlreadyStarted
        ));

        // Both loops running: the blob gets dispatched, encoded, and its
        // result processed.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while streamer.encoded_result_size().0 == 0 {
            assert!(std::time::Instant::now() < deadline, "no result processed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        lifetime.cancel();
        tokio::time::sleep(Duration::from_millis(60)).await;

        // No further dispatch cycles after cancellation.
        let after = dispatch_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(dispatch_calls.load(Ordering::SeqCst), after);
    }
}
