//! Orchestrator module for the stream indexer ingest.
//!
//! Drives the fetch, transform, flush and commit cycle over the stream source,
//! document transformer and bulk index writer.

mod cursor;

pub use cursor::CommitCursor;

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval_at, sleep, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::{StreamPosition, StreamRecord, StreamSource};
use crate::errors::IngestError;
use crate::loader::BulkIndexWriter;
use crate::processor::DocumentTransformer;

/// Configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum number of records per cycle.
    pub batch_size: usize,
    /// How long to keep collecting after the first record of a cycle arrives.
    pub batch_timeout: Duration,
    /// Delay after each cycle that flushed documents.
    pub pacing_delay: Duration,
    /// Delay after a failed fetch or a failed bulk write.
    pub retry_backoff: Duration,
    /// Interval between progress log lines.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_timeout: Duration::from_millis(1000),
            pacing_delay: Duration::from_millis(1000),
            retry_backoff: Duration::from_millis(5000),
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// Where the ingestion loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Transforming,
    Flushing,
    Committing,
    Stopped,
}

/// Running counters since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Records received from the stream source.
    pub records_received: u64,
    /// Documents the search engine accepted.
    pub documents_indexed: u64,
    /// Records skipped because they could not become documents.
    pub malformed_records: u64,
    /// Documents the search engine rejected individually.
    pub item_failures: u64,
    /// Bulk writes that failed as a whole.
    pub transport_failures: u64,
    /// Completed fetch cycles.
    pub cycles: u64,
}

/// How one cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The batch was written and the cursor advanced past every record of the cycle.
    Committed {
        indexed: usize,
        failed: usize,
        malformed: usize,
    },
    /// The bulk write failed; the source was rewound to redeliver the cycle.
    Rewound { documents: usize },
}

/// Orchestrator that runs the ingestion loop.
///
/// Owns the stream source, transformer, writer and commit cursor for one
/// subscription. Records are acknowledged only after their documents were written.
pub struct Orchestrator {
    source: Arc<dyn StreamSource>,
    transformer: DocumentTransformer,
    writer: BulkIndexWriter,
    config: OrchestratorConfig,
    state: LoopState,
    cursor: CommitCursor,
    stats: IngestStats,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(
        source: Arc<dyn StreamSource>,
        transformer: DocumentTransformer,
        writer: BulkIndexWriter,
    ) -> Self {
        Self::with_config(source, transformer, writer, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        source: Arc<dyn StreamSource>,
        transformer: DocumentTransformer,
        writer: BulkIndexWriter,
        config: OrchestratorConfig,
    ) -> Self {
        // Subscribed here so a shutdown sent before `run` is not lost
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            source,
            transformer,
            writer,
            config,
            state: LoopState::Idle,
            cursor: CommitCursor::new(),
            stats: IngestStats::default(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Share a shutdown channel created before the orchestrator.
    ///
    /// `shutdown_rx` must be subscribed to `shutdown_tx`; a signal it already
    /// holds stops the loop before the first fetch.
    pub fn with_shutdown(
        mut self,
        shutdown_tx: broadcast::Sender<()>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        self.shutdown_tx = shutdown_tx;
        self.shutdown_rx = shutdown_rx;
        self
    }

    /// Run the ingestion loop.
    ///
    /// Blocks until a shutdown signal is received, the stream ends, or the source
    /// cannot be rewound after a failed bulk write.
    #[instrument(skip(self), fields(index = %self.writer.index()))]
    pub async fn run(&mut self) -> Result<(), IngestError> {
        info!("Starting stream indexer orchestrator");

        self.source.subscribe()?;
        info!("Ready to process events from the stream");

        let source = Arc::clone(&self.source);
        let mut progress_timer = interval_at(
            Instant::now() + self.config.progress_interval,
            self.config.progress_interval,
        );
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut progress = ProgressReport::new(self.stats);

        let result = loop {
            self.state = LoopState::Fetching;

            // The fetch stays pinned across progress ticks so a partly filled batch is never dropped
            let fetch = source.fetch(self.config.batch_size, self.config.batch_timeout);
            tokio::pin!(fetch);

            let fetched = loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown_rx.recv() => break None,
                    result = &mut fetch => break Some(result),
                    _ = progress_timer.tick() => progress.log(&self.stats),
                }
            };

            let Some(fetched) = fetched else {
                info!("Received shutdown signal");
                break Ok(());
            };

            match fetched {
                Ok(Some(records)) => match self.process_cycle(records).await {
                    Ok(outcome) => {
                        self.state = LoopState::Idle;
                        let delay = match outcome {
                            CycleOutcome::Committed {
                                indexed, failed, ..
                            } if indexed + failed > 0 => self.config.pacing_delay,
                            CycleOutcome::Committed { .. } => Duration::ZERO,
                            CycleOutcome::Rewound { .. } => self.config.retry_backoff,
                        };
                        if self.pause(delay).await {
                            info!("Received shutdown signal");
                            break Ok(());
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Cannot redeliver failed batch, stopping");
                        break Err(e);
                    }
                },
                Ok(None) => {
                    info!("Stream ended");
                    break Ok(());
                }
                Err(e) => {
                    self.state = LoopState::Idle;
                    error!(error = %e, "Failed to fetch records");
                    if self.pause(self.config.retry_backoff).await {
                        info!("Received shutdown signal");
                        break Ok(());
                    }
                }
            }
        };

        self.state = LoopState::Stopped;
        info!(
            cycles = self.stats.cycles,
            records_received = self.stats.records_received,
            documents_indexed = self.stats.documents_indexed,
            malformed_records = self.stats.malformed_records,
            item_failures = self.stats.item_failures,
            transport_failures = self.stats.transport_failures,
            "Orchestrator shutdown complete"
        );
        result
    }

    /// Run one cycle over an already fetched batch.
    ///
    /// Transforms every record, flushes the resulting documents and either commits
    /// past the batch or rewinds the source to its first record in each partition.
    ///
    /// # Returns
    ///
    /// * `Ok(CycleOutcome)` - Whether the batch was committed or will be redelivered
    /// * `Err(IngestError)` - If the source could not be rewound after a failed write
    pub async fn process_cycle(
        &mut self,
        records: Vec<StreamRecord>,
    ) -> Result<CycleOutcome, IngestError> {
        self.stats.cycles += 1;
        self.stats.records_received += records.len() as u64;

        self.state = LoopState::Transforming;
        let mut malformed = 0;
        for record in &records {
            match self.transformer.transform_record(record) {
                Ok(document) => self.writer.add(document),
                Err(e) => {
                    malformed += 1;
                    warn!(
                        position = %record.position(),
                        error = %e,
                        "Skipping malformed event"
                    );
                }
            }
        }
        self.stats.malformed_records += malformed as u64;

        self.state = LoopState::Flushing;
        let documents = self.writer.pending_len();
        let results = match self.writer.flush().await {
            Ok(results) => results,
            Err(e) => {
                self.stats.transport_failures += 1;
                error!(
                    error = %e,
                    document_count = e.document_ids.len(),
                    "Bulk write failed, rewinding for redelivery"
                );

                let positions = StreamPosition::earliest_per_partition(&records);
                self.source.rewind(&positions).await?;
                return Ok(CycleOutcome::Rewound { documents });
            }
        };

        let failed = results.iter().filter(|r| !r.is_success()).count();
        let indexed = results.len() - failed;
        self.stats.documents_indexed += indexed as u64;
        self.stats.item_failures += failed as u64;

        self.state = LoopState::Committing;
        self.commit(&records).await;

        if documents > 0 {
            info!(
                record_count = records.len(),
                indexed = indexed,
                failed = failed,
                malformed = malformed,
                "Indexed batch"
            );
        }

        Ok(CycleOutcome::Committed {
            indexed,
            failed,
            malformed,
        })
    }

    async fn commit(&mut self, records: &[StreamRecord]) {
        self.cursor.advance(records);
        let positions = self.cursor.positions();

        // The next successful commit carries the cursor forward, so a failed one is only logged
        match self.source.commit(&positions).await {
            Ok(()) => debug!(partition_count = positions.len(), "Committed stream positions"),
            Err(e) => warn!(error = %e, "Failed to commit stream positions"),
        }
    }

    /// Sleep for `delay`, returning `true` if shutdown was signaled meanwhile.
    async fn pause(&mut self, delay: Duration) -> bool {
        if delay.is_zero() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.shutdown_rx.recv() => true,
            _ = sleep(delay) => false,
        }
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// The current loop state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Positions acknowledged so far.
    pub fn cursor(&self) -> &CommitCursor {
        &self.cursor
    }

    /// Counters since startup.
    pub fn stats(&self) -> IngestStats {
        self.stats
    }
}

/// Periodic progress line with rates since the previous line.
struct ProgressReport {
    previous: IngestStats,
    previous_time: Instant,
}

impl ProgressReport {
    fn new(stats: IngestStats) -> Self {
        Self {
            previous: stats,
            previous_time: Instant::now(),
        }
    }

    fn log(&mut self, stats: &IngestStats) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(self.previous_time).as_secs_f64();

        let rate = |current: u64, previous: u64| {
            if elapsed_secs > 0.0 {
                (current.saturating_sub(previous) as f64) / elapsed_secs
            } else {
                0.0
            }
        };
        let records_per_sec = rate(stats.records_received, self.previous.records_received);
        let documents_per_sec = rate(stats.documents_indexed, self.previous.documents_indexed);

        info!(
            records_received = stats.records_received,
            documents_indexed = stats.documents_indexed,
            malformed_records = stats.malformed_records,
            item_failures = stats.item_failures,
            transport_failures = stats.transport_failures,
            records_per_sec = format!("{:.2}", records_per_sec),
            documents_per_sec = format!("{:.2}", documents_per_sec),
            "Processing progress"
        );

        self.previous = *stats;
        self.previous_time = now;
    }
}

