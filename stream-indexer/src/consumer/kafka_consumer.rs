//! Kafka consumer implementation for the stream indexer.
//!
//! Consumes change events from Kafka topics with auto-commit disabled; offsets are
//! committed by the ingestion loop once the events are indexed.

use async_trait::async_trait;
use futures::StreamExt;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{BorrowedMessage, Message as KafkaMessage},
    Offset, TopicPartitionList,
};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use crate::consumer::messages::{StreamPosition, StreamRecord};
use crate::consumer::source::StreamSource;
use crate::errors::IngestError;

/// Default Kafka topic for change events.
pub const DEFAULT_TOPIC: &str = "wikimedia.recentchange";

/// How long a rewind may block while repositioning a partition.
const SEEK_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for creating a Kafka consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConsumerConfig {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topics to subscribe to
    pub topics: Vec<String>,
    /// Where a group without committed offsets starts ("latest" or "earliest")
    pub auto_offset_reset: String,
    /// SASL username (enables SASL/SSL if set)
    pub username: Option<String>,
    /// SASL password (required if username is set)
    pub password: Option<String>,
    /// Custom CA certificate in PEM format
    pub ssl_ca_pem: Option<String>,
}

impl KafkaConsumerConfig {
    /// Create a new config for the given brokers and group, subscribing to the default topic.
    pub fn new(brokers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            topics: vec![DEFAULT_TOPIC.to_string()],
            auto_offset_reset: "latest".to_string(),
            username: None,
            password: None,
            ssl_ca_pem: None,
        }
    }

    /// Set the topics to subscribe to.
    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    /// Set SASL credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Build the librdkafka client configuration.
    fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", "6000");

        // SASL/SSL for managed Kafka, plaintext for local development
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            client_config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", password);

            if let Some(ca_pem) = &self.ssl_ca_pem {
                client_config.set("ssl.ca.pem", ca_pem);
            }
        }

        client_config
    }
}

/// Kafka consumer for change events.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topics: Vec<String>,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer.
    ///
    /// # Arguments
    ///
    /// * `config` - Brokers, group, topics and optional SASL credentials
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaConsumer)` - A new consumer instance
    /// * `Err(IngestError)` - If consumer creation fails
    pub fn new(config: &KafkaConsumerConfig) -> Result<Self, IngestError> {
        if config.topics.is_empty() {
            return Err(IngestError::invalid_config("at least one topic is required"));
        }

        let consumer: StreamConsumer = config
            .client_config()
            .create()
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            topics = ?config.topics,
            auto_offset_reset = %config.auto_offset_reset,
            sasl = config.username.is_some(),
            "Created Kafka consumer"
        );

        Ok(Self {
            consumer,
            topics: config.topics.clone(),
        })
    }

    /// Copy a borrowed Kafka message into an owned record.
    fn to_record(msg: &BorrowedMessage<'_>) -> StreamRecord {
        StreamRecord {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            payload: msg.payload().map(<[u8]>::to_vec),
        }
    }
}

#[async_trait]
impl StreamSource for KafkaConsumer {
    fn subscribe(&self) -> Result<(), IngestError> {
        let topics: Vec<&str> = self.topics.iter().map(|s| s.as_str()).collect();
        self.consumer
            .subscribe(&topics)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(topics = ?self.topics, "Subscribed to Kafka topics");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch(
        &self,
        max_records: usize,
        linger: Duration,
    ) -> Result<Option<Vec<StreamRecord>>, IngestError> {
        let mut message_stream = self.consumer.stream();

        let first = match message_stream.next().await {
            Some(Ok(msg)) => Self::to_record(&msg),
            Some(Err(e)) => return Err(e.into()),
            None => {
                info!("Kafka stream ended");
                return Ok(None);
            }
        };

        let mut records = Vec::with_capacity(max_records.max(1));
        records.push(first);

        let deadline = Instant::now() + linger;
        while records.len() < max_records {
            match timeout_at(deadline, message_stream.next()).await {
                Ok(Some(Ok(msg))) => records.push(Self::to_record(&msg)),
                Ok(Some(Err(e))) => {
                    // Keep what we have; the error resurfaces on the next fetch if persistent
                    warn!(error = %e, "Kafka error while filling batch");
                    break;
                }
                Ok(None) | Err(_) => break,
            }
        }

        debug!(record_count = records.len(), "Fetched records from Kafka");
        Ok(Some(records))
    }

    async fn commit(&self, positions: &[StreamPosition]) -> Result<(), IngestError> {
        if positions.is_empty() {
            return Ok(());
        }

        // Kafka commits the offset of the next record to read
        let mut tpl = TopicPartitionList::new();
        for position in positions {
            tpl.add_partition_offset(
                &position.topic,
                position.partition,
                Offset::Offset(position.offset + 1),
            )
            .map_err(|e| IngestError::kafka(e.to_string()))?;
        }

        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        debug!(partition_count = positions.len(), "Committed offsets");
        Ok(())
    }

    async fn rewind(&self, positions: &[StreamPosition]) -> Result<(), IngestError> {
        for position in positions {
            self.consumer
                .seek(
                    &position.topic,
                    position.partition,
                    Offset::Offset(position.offset),
                    SEEK_TIMEOUT,
                )
                .map_err(|e| {
                    IngestError::rewind(format!("Failed to seek to {}: {}", position, e))
                })?;

            info!(
                topic = %position.topic,
                partition = position.partition,
                offset = position.offset,
                "Rewound partition for redelivery"
            );
        }

        Ok(())
    }
}
