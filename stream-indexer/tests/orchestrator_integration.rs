//! Integration tests for the stream indexer orchestrator.
//!
//! These tests use the real Orchestrator, DocumentTransformer and BulkIndexWriter
//! but mock dependencies (StreamSource and SearchIndexProvider) to ensure reliable testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{timeout, Instant};

use stream_indexer::consumer::{StreamPosition, StreamRecord, StreamSource};
use stream_indexer::errors::IngestError;
use stream_indexer::loader::BulkIndexWriter;
use stream_indexer::orchestrator::{CycleOutcome, LoopState, Orchestrator, OrchestratorConfig};
use stream_indexer::processor::DocumentTransformer;
use stream_indexer_repository::{
    BatchResult, IndexSettings, IndexStatus, SearchIndexError, SearchIndexProvider,
};
use stream_indexer_shared::IndexDocument;

const TOPIC: &str = "wikimedia.recentchange";

/// One scripted answer of the mock source.
enum Step {
    Batch(Vec<StreamRecord>),
    Error(&'static str),
}

// Mock stream source for testing
struct MockStreamSource {
    steps: Mutex<VecDeque<Step>>,
    /// Every record handed out, so a rewind can queue them again.
    delivered: Mutex<Vec<StreamRecord>>,
    commits: Mutex<Vec<Vec<StreamPosition>>>,
    rewinds: Mutex<Vec<Vec<StreamPosition>>>,
    /// When each fetch was issued.
    fetched_at: Mutex<Vec<Instant>>,
    /// Block instead of ending the stream once the script is exhausted.
    block_when_drained: bool,
    error_on_subscribe: bool,
    error_on_rewind: bool,
}

impl MockStreamSource {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            delivered: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
            rewinds: Mutex::new(Vec::new()),
            fetched_at: Mutex::new(Vec::new()),
            block_when_drained: false,
            error_on_subscribe: false,
            error_on_rewind: false,
        }
    }

    fn batches(batches: Vec<Vec<StreamRecord>>) -> Self {
        Self::new(batches.into_iter().map(Step::Batch).collect())
    }

    fn last_commit(&self) -> Option<Vec<StreamPosition>> {
        self.commits.lock().unwrap().last().cloned()
    }

    fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }

    fn rewinds(&self) -> Vec<Vec<StreamPosition>> {
        self.rewinds.lock().unwrap().clone()
    }

    /// Time elapsed between consecutive fetches.
    fn fetch_gaps(&self) -> Vec<Duration> {
        self.fetched_at
            .lock()
            .unwrap()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    fn fetch_count(&self) -> usize {
        self.fetched_at.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl StreamSource for MockStreamSource {
    fn subscribe(&self) -> Result<(), IngestError> {
        if self.error_on_subscribe {
            Err(IngestError::KafkaError("Mock subscribe error".to_string()))
        } else {
            Ok(())
        }
    }

    async fn fetch(
        &self,
        max_records: usize,
        _linger: Duration,
    ) -> Result<Option<Vec<StreamRecord>>, IngestError> {
        self.fetched_at.lock().unwrap().push(Instant::now());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Batch(mut records)) => {
                records.truncate(max_records);
                self.delivered.lock().unwrap().extend(records.clone());
                Ok(Some(records))
            }
            Some(Step::Error(msg)) => Err(IngestError::kafka(msg)),
            None if self.block_when_drained => {
                std::future::pending::<()>().await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn commit(&self, positions: &[StreamPosition]) -> Result<(), IngestError> {
        self.commits.lock().unwrap().push(positions.to_vec());
        Ok(())
    }

    async fn rewind(&self, positions: &[StreamPosition]) -> Result<(), IngestError> {
        if self.error_on_rewind {
            return Err(IngestError::rewind("Mock seek error"));
        }
        self.rewinds.lock().unwrap().push(positions.to_vec());

        // Queue every delivered record at or after the rewound positions
        let mut delivered = self.delivered.lock().unwrap();
        let redelivery: Vec<StreamRecord> = delivered
            .iter()
            .filter(|r| {
                positions.iter().any(|p| {
                    p.topic == r.topic && p.partition == r.partition && r.offset >= p.offset
                })
            })
            .cloned()
            .collect();
        delivered.retain(|r| !redelivery.contains(r));

        if !redelivery.is_empty() {
            self.steps
                .lock()
                .unwrap()
                .push_front(Step::Batch(redelivery));
        }
        Ok(())
    }
}

// Mock search provider storing documents by id
struct MockSearchProvider {
    store: Mutex<HashMap<String, String>>,
    bulk_calls: AtomicUsize,
    /// Number of upcoming bulk calls that fail at the transport level.
    transport_failures: AtomicUsize,
    reject_ids: Vec<String>,
}

impl MockSearchProvider {
    fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
            bulk_calls: AtomicUsize::new(0),
            transport_failures: AtomicUsize::new(0),
            reject_ids: Vec::new(),
        }
    }

    fn failing(times: usize) -> Self {
        let provider = Self::new();
        provider.transport_failures.store(times, Ordering::SeqCst);
        provider
    }

    fn stored(&self) -> HashMap<String, String> {
        self.store.lock().unwrap().clone()
    }

    fn bulk_call_count(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SearchIndexProvider for MockSearchProvider {
    async fn index_exists(&self, _name: &str) -> Result<bool, SearchIndexError> {
        Ok(true)
    }

    async fn create_index(
        &self,
        _name: &str,
        _settings: &IndexSettings,
    ) -> Result<IndexStatus, SearchIndexError> {
        Ok(IndexStatus::AlreadyExists)
    }

    async fn bulk_upsert(
        &self,
        _index: &str,
        documents: &[IndexDocument],
    ) -> Result<Vec<BatchResult>, SearchIndexError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.transport_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transport_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SearchIndexError::transport("connection refused"));
        }

        let mut store = self.store.lock().unwrap();
        Ok(documents
            .iter()
            .map(|d| {
                if self.reject_ids.iter().any(|id| id == d.id()) {
                    BatchResult::failed(
                        d.id(),
                        Some(400),
                        Some("mapper_parsing_exception".to_string()),
                        "failed to parse field",
                    )
                } else {
                    store.insert(d.id().to_string(), d.body().to_string());
                    BatchResult::indexed(d.id())
                }
            })
            .collect())
    }
}

fn event(partition: i32, offset: i64, id: &str) -> StreamRecord {
    StreamRecord::new(
        TOPIC,
        partition,
        offset,
        format!(r#"{{"meta":{{"id":"{}"}},"title":"Page {}"}}"#, id, offset),
    )
}

fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        batch_size: 50,
        batch_timeout: Duration::from_millis(10),
        pacing_delay: Duration::ZERO,
        retry_backoff: Duration::ZERO,
        progress_interval: Duration::from_secs(60),
    }
}

/// Helper to create a test orchestrator with mocked dependencies
fn create_test_orchestrator(
    source: Arc<MockStreamSource>,
    provider: Arc<MockSearchProvider>,
) -> Orchestrator {
    let writer = BulkIndexWriter::new(provider, "wikimedia");
    Orchestrator::with_config(source, DocumentTransformer::new(), writer, test_config())
}

const PACING: Duration = Duration::from_millis(1000);

/// Orchestrator that waits `PACING` after each cycle that sent documents.
fn create_paced_orchestrator(
    source: Arc<MockStreamSource>,
    provider: Arc<MockSearchProvider>,
) -> Orchestrator {
    let writer = BulkIndexWriter::new(provider, "wikimedia");
    let config = OrchestratorConfig {
        pacing_delay: PACING,
        ..test_config()
    };
    Orchestrator::with_config(source, DocumentTransformer::new(), writer, config)
}

#[tokio::test]
async fn test_malformed_event_is_skipped_and_committed_past() {
    let source = Arc::new(MockStreamSource::batches(vec![vec![
        event(0, 0, "a"),
        StreamRecord::new(TOPIC, 0, 1, r#"{"meta":{}}"#),
        event(0, 2, "c"),
    ]]));
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_test_orchestrator(source.clone(), provider.clone());

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.is_ok(), "Orchestrator should complete");
    assert!(result.unwrap().is_ok());

    let stored = provider.stored();
    assert_eq!(stored.len(), 2);
    assert!(stored.contains_key("a"));
    assert!(stored.contains_key("c"));

    assert_eq!(orchestrator.cursor().position(TOPIC, 0), Some(2));
    assert_eq!(
        source.last_commit(),
        Some(vec![StreamPosition::new(TOPIC, 0, 2)])
    );

    let stats = orchestrator.stats();
    assert_eq!(stats.records_received, 3);
    assert_eq!(stats.documents_indexed, 2);
    assert_eq!(stats.malformed_records, 1);
    assert_eq!(orchestrator.state(), LoopState::Stopped);
}

#[tokio::test]
async fn test_documents_keep_raw_payload() {
    let payload = r#"{"meta":{"id":"abc-123"},"title":"X"}"#;
    let source = Arc::new(MockStreamSource::batches(vec![vec![StreamRecord::new(
        TOPIC, 0, 0, payload,
    )]]));
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_test_orchestrator(source, provider.clone());

    orchestrator.run().await.unwrap();

    assert_eq!(provider.stored()["abc-123"], payload);
}

#[tokio::test]
async fn test_transport_failure_leaves_cursor_and_redelivers() {
    let source = Arc::new(MockStreamSource::new(Vec::new()));
    let provider = Arc::new(MockSearchProvider::failing(1));
    let mut orchestrator = create_test_orchestrator(source.clone(), provider.clone());

    // Recorded as delivered so the rewind can queue the batch again
    let batch = vec![event(0, 10, "a"), event(0, 11, "b")];
    source.delivered.lock().unwrap().extend(batch.clone());

    let before = orchestrator.cursor().clone();
    let outcome = orchestrator.process_cycle(batch).await.unwrap();

    assert_eq!(outcome, CycleOutcome::Rewound { documents: 2 });
    assert_eq!(orchestrator.cursor(), &before);
    assert_eq!(source.commit_count(), 0);
    assert_eq!(
        source.rewinds(),
        vec![vec![StreamPosition::new(TOPIC, 0, 10)]]
    );

    // The loop picks up the redelivered records and stores them
    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.unwrap().is_ok());

    assert_eq!(provider.bulk_call_count(), 2);
    assert_eq!(provider.stored().len(), 2);
    assert_eq!(orchestrator.cursor().position(TOPIC, 0), Some(11));
    assert_eq!(orchestrator.stats().transport_failures, 1);
}

#[tokio::test]
async fn test_transport_failure_during_run_redelivers_same_records() {
    let source = Arc::new(MockStreamSource::batches(vec![vec![
        event(0, 0, "a"),
        event(0, 1, "b"),
    ]]));
    let provider = Arc::new(MockSearchProvider::failing(1));
    let mut orchestrator = create_test_orchestrator(source.clone(), provider.clone());

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.unwrap().is_ok());

    assert_eq!(provider.bulk_call_count(), 2);
    assert_eq!(provider.stored().len(), 2);
    assert_eq!(source.commit_count(), 1);
    assert_eq!(
        source.last_commit(),
        Some(vec![StreamPosition::new(TOPIC, 0, 1)])
    );
}

#[tokio::test]
async fn test_item_failure_still_advances_cursor() {
    let source = Arc::new(MockStreamSource::batches(vec![vec![
        event(0, 0, "a"),
        event(0, 1, "b"),
    ]]));
    let provider = Arc::new(MockSearchProvider {
        reject_ids: vec!["b".to_string()],
        ..MockSearchProvider::new()
    });
    let mut orchestrator = create_test_orchestrator(source.clone(), provider.clone());

    orchestrator.run().await.unwrap();

    assert_eq!(provider.stored().len(), 1);
    assert_eq!(orchestrator.cursor().position(TOPIC, 0), Some(1));
    assert_eq!(orchestrator.stats().item_failures, 1);
    assert_eq!(orchestrator.stats().documents_indexed, 1);
}

#[tokio::test]
async fn test_redelivered_event_is_stored_once() {
    let source = Arc::new(MockStreamSource::batches(vec![
        vec![event(0, 0, "same")],
        vec![event(0, 1, "same")],
    ]));
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_test_orchestrator(source, provider.clone());

    orchestrator.run().await.unwrap();

    assert_eq!(provider.stored().len(), 1);
    assert_eq!(orchestrator.stats().documents_indexed, 2);
}

#[tokio::test]
async fn test_all_malformed_batch_skips_flush_but_commits() {
    let source = Arc::new(MockStreamSource::batches(vec![vec![
        StreamRecord::new(TOPIC, 0, 0, "not json"),
        StreamRecord::new(TOPIC, 0, 1, r#"{"meta":{"id":7}}"#),
    ]]));
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_test_orchestrator(source.clone(), provider.clone());

    orchestrator.run().await.unwrap();

    assert_eq!(provider.bulk_call_count(), 0);
    assert_eq!(orchestrator.stats().malformed_records, 2);
    assert_eq!(
        source.last_commit(),
        Some(vec![StreamPosition::new(TOPIC, 0, 1)])
    );
}

#[tokio::test]
async fn test_commit_covers_every_partition() {
    let source = Arc::new(MockStreamSource::batches(vec![vec![
        event(0, 4, "a"),
        event(1, 9, "b"),
        event(0, 5, "c"),
    ]]));
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_test_orchestrator(source.clone(), provider);

    orchestrator.run().await.unwrap();

    assert_eq!(
        source.last_commit(),
        Some(vec![
            StreamPosition::new(TOPIC, 0, 5),
            StreamPosition::new(TOPIC, 1, 9),
        ])
    );
}

#[tokio::test]
async fn test_fetch_error_is_retried() {
    let source = Arc::new(MockStreamSource::new(vec![
        Step::Error("broker transport failure"),
        Step::Batch(vec![event(0, 0, "a")]),
    ]));
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_test_orchestrator(source, provider.clone());

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.unwrap().is_ok());

    assert_eq!(provider.stored().len(), 1);
}

#[tokio::test]
async fn test_orchestrator_shutdown_during_fetch() {
    let source = Arc::new(MockStreamSource {
        block_when_drained: true,
        ..MockStreamSource::new(Vec::new())
    });
    let provider = Arc::new(MockSearchProvider::new());
    let (shutdown, shutdown_rx) = broadcast::channel(1);
    let mut orchestrator = create_test_orchestrator(source.clone(), provider)
        .with_shutdown(shutdown.clone(), shutdown_rx);

    let shutdown_task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown.send(());
    });

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.is_ok(), "Shutdown should interrupt the fetch");
    assert!(result.unwrap().is_ok());
    assert!(shutdown_task.await.is_ok());

    assert_eq!(source.commit_count(), 0);
    assert_eq!(orchestrator.state(), LoopState::Stopped);
}

#[tokio::test]
async fn test_shutdown_before_run_processes_nothing() {
    let source = Arc::new(MockStreamSource::batches(vec![vec![event(0, 0, "a")]]));
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_test_orchestrator(source.clone(), provider.clone());

    orchestrator.shutdown();
    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.unwrap().is_ok());

    assert_eq!(provider.bulk_call_count(), 0);
    assert_eq!(source.commit_count(), 0);
}

#[tokio::test]
async fn test_orchestrator_subscribe_error() {
    let source = Arc::new(MockStreamSource {
        error_on_subscribe: true,
        ..MockStreamSource::new(Vec::new())
    });
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_test_orchestrator(source, provider);

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.is_ok(), "Orchestrator should complete");

    match result.unwrap().unwrap_err() {
        IngestError::KafkaError(msg) => assert_eq!(msg, "Mock subscribe error"),
        other => panic!("Expected KafkaError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rewind_failure_stops_loop() {
    let source = Arc::new(MockStreamSource {
        error_on_rewind: true,
        ..MockStreamSource::batches(vec![vec![event(0, 0, "a")], vec![event(0, 1, "b")]])
    });
    let provider = Arc::new(MockSearchProvider::failing(1));
    let mut orchestrator = create_test_orchestrator(source.clone(), provider.clone());

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;

    assert!(matches!(
        result.unwrap(),
        Err(IngestError::RewindError(_))
    ));
    // Nothing after the failed batch may be committed
    assert_eq!(source.commit_count(), 0);
    assert_eq!(provider.bulk_call_count(), 1);
    assert_eq!(orchestrator.state(), LoopState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_pacing_delay_follows_flush() {
    let source = Arc::new(MockStreamSource::batches(vec![
        vec![event(0, 0, "a")],
        vec![event(0, 1, "b")],
    ]));
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_paced_orchestrator(source.clone(), provider.clone());

    orchestrator.run().await.unwrap();

    // Two paced cycles, then the fetch that ends the stream
    let gaps = source.fetch_gaps();
    assert_eq!(gaps.len(), 2);
    assert!(gaps.iter().all(|gap| *gap >= PACING), "gaps: {:?}", gaps);
    assert_eq!(provider.stored().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_all_malformed_cycle_is_not_paced() {
    let source = Arc::new(MockStreamSource::batches(vec![
        vec![StreamRecord::new(TOPIC, 0, 0, "not json")],
        vec![event(0, 1, "a")],
    ]));
    let provider = Arc::new(MockSearchProvider::new());
    let mut orchestrator = create_paced_orchestrator(source.clone(), provider.clone());

    orchestrator.run().await.unwrap();

    let gaps = source.fetch_gaps();
    assert_eq!(gaps.len(), 2);
    assert_eq!(gaps[0], Duration::ZERO);
    assert!(gaps[1] >= PACING);
    assert_eq!(provider.bulk_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_pacing_stops_before_next_fetch() {
    let source = Arc::new(MockStreamSource::batches(vec![
        vec![event(0, 0, "a")],
        vec![event(0, 1, "b")],
    ]));
    let provider = Arc::new(MockSearchProvider::new());
    let (shutdown, shutdown_rx) = broadcast::channel(1);
    let mut orchestrator = create_paced_orchestrator(source.clone(), provider.clone())
        .with_shutdown(shutdown.clone(), shutdown_rx);

    tokio::spawn(async move {
        tokio::time::sleep(PACING / 2).await;
        let _ = shutdown.send(());
    });

    let started = Instant::now();
    orchestrator.run().await.unwrap();

    assert!(started.elapsed() < PACING);
    assert_eq!(source.fetch_count(), 1);
    assert_eq!(provider.stored().len(), 1);
    assert_eq!(source.commit_count(), 1);
    assert_eq!(orchestrator.state(), LoopState::Stopped);
}
