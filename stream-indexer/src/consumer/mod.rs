//! Consumer module for the stream indexer ingest.
//!
//! Provides the stream source abstraction and its Kafka implementation.

mod kafka_consumer;
mod messages;
mod source;

pub use kafka_consumer::{KafkaConsumer, KafkaConsumerConfig, DEFAULT_TOPIC};
pub use messages::{StreamPosition, StreamRecord};
pub use source::StreamSource;
