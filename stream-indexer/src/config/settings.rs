//! Indexer settings read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::consumer::{KafkaConsumerConfig, DEFAULT_TOPIC};
use crate::orchestrator::OrchestratorConfig;
use crate::processor::DEFAULT_ID_POINTER;
use crate::IndexingError;
use stream_indexer_repository::IndexSettings;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "consumer-opensearch-demo";

/// Default destination index.
const DEFAULT_INDEX_NAME: &str = "wikimedia";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if the index cannot be provisioned.
    FailFast,
    /// Retry provisioning until it succeeds.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "fail-fast" if not set or invalid.
    fn parse(value: Option<String>) -> Self {
        match value.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("fail-fast") | Some("failfast") | Some("fail_fast") => Self::FailFast,
            Some("retry") => Self::Retry,
            Some(other) => {
                warn!(
                    value = %other,
                    "Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'fail-fast'"
                );
                Self::FailFast
            }
        }
    }
}

/// Complete indexer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    pub kafka: KafkaConsumerConfig,
    pub opensearch_url: String,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub index_name: String,
    pub index_settings: IndexSettings,
    pub id_pointer: String,
    pub orchestrator: OrchestratorConfig,
}

impl IndexerConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `KAFKA_BROKER`: Kafka broker address (default: localhost:9092)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: consumer-opensearch-demo)
    /// - `KAFKA_TOPIC`: Comma-separated topics (default: wikimedia.recentchange)
    /// - `KAFKA_AUTO_OFFSET_RESET`: Start position of a new group (default: latest)
    /// - `KAFKA_USERNAME` / `KAFKA_PASSWORD`: Enable SASL/SSL when both are set
    /// - `KAFKA_SSL_CA_PEM`: Custom CA certificate
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: fail-fast)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `INDEX_NAME`: Destination index (default: wikimedia)
    /// - `INDEX_SHARDS` / `INDEX_REPLICAS`: Optional index settings
    /// - `DOCUMENT_ID_POINTER`: JSON pointer of the identity field (default: /meta/id)
    /// - `BATCH_SIZE`: Max records per cycle (default: 50)
    /// - `BATCH_TIMEOUT_MS`: Linger after the first record (default: 1000)
    /// - `PACING_DELAY_MS`: Delay after each flush (default: 1000)
    /// - `RETRY_BACKOFF_MS`: Delay after a failed write (default: 5000)
    /// - `PROGRESS_INTERVAL_SECS`: Progress log interval (default: 10)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = OrchestratorConfig::default();

        let topics: Vec<String> = get("KAFKA_TOPIC")
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string())
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if topics.is_empty() {
            return Err(IndexingError::config("KAFKA_TOPIC names no topic"));
        }

        let mut kafka = KafkaConsumerConfig::new(
            get("KAFKA_BROKER").unwrap_or_else(|| DEFAULT_KAFKA_BROKER.to_string()),
            get("KAFKA_GROUP_ID").unwrap_or_else(|| DEFAULT_KAFKA_GROUP_ID.to_string()),
        )
        .with_topics(topics);
        if let Some(reset) = get("KAFKA_AUTO_OFFSET_RESET") {
            kafka.auto_offset_reset = reset;
        }
        // A lone username or password leaves the connection in plaintext
        if let (Some(username), Some(password)) = (get("KAFKA_USERNAME"), get("KAFKA_PASSWORD")) {
            kafka = kafka.with_credentials(username, password);
        }
        kafka.ssl_ca_pem = get("KAFKA_SSL_CA_PEM");

        let batch_size: usize = parse_or(&get, "BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 {
            return Err(IndexingError::config("BATCH_SIZE must be at least 1"));
        }

        let orchestrator = OrchestratorConfig {
            batch_size,
            batch_timeout: Duration::from_millis(parse_or(
                &get,
                "BATCH_TIMEOUT_MS",
                defaults.batch_timeout.as_millis() as u64,
            )?),
            pacing_delay: Duration::from_millis(parse_or(
                &get,
                "PACING_DELAY_MS",
                defaults.pacing_delay.as_millis() as u64,
            )?),
            retry_backoff: Duration::from_millis(parse_or(
                &get,
                "RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )?),
            progress_interval: Duration::from_secs(
                parse_or(
                    &get,
                    "PROGRESS_INTERVAL_SECS",
                    defaults.progress_interval.as_secs(),
                )?
                .max(1),
            ),
        };

        Ok(Self {
            kafka,
            opensearch_url: get("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            connection_mode: ConnectionMode::parse(get("OPENSEARCH_CONNECTION_MODE")),
            retry_interval: Duration::from_secs(parse_or(
                &get,
                "OPENSEARCH_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL_SECS,
            )?),
            index_name: get("INDEX_NAME").unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            index_settings: IndexSettings {
                number_of_shards: parse_opt(&get, "INDEX_SHARDS")?,
                number_of_replicas: parse_opt(&get, "INDEX_REPLICAS")?,
            },
            id_pointer: get("DOCUMENT_ID_POINTER")
                .unwrap_or_else(|| DEFAULT_ID_POINTER.to_string()),
            orchestrator,
        })
    }
}

fn parse_opt<T, G>(get: &G, key: &str) -> Result<Option<T>, IndexingError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| IndexingError::config(format!("Invalid {}={}: {}", key, raw, e)))
        })
        .transpose()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, IndexingError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(get, key)?.unwrap_or(default))
}
