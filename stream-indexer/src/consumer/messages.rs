//! Record types for the consumer.
//!
//! Defines the record and position structures that flow through the ingest.

use std::collections::BTreeMap;
use std::fmt;

/// A position in the stream: one offset within one topic partition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamPosition {
    /// The topic name.
    pub topic: String,
    /// The partition within the topic.
    pub partition: i32,
    /// The record offset within the partition.
    pub offset: i64,
}

impl StreamPosition {
    /// Create a new position.
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
        }
    }

    /// The earliest position of each partition present in `records`.
    ///
    /// Rewinding to these positions redelivers every record in the slice.
    pub fn earliest_per_partition(records: &[StreamRecord]) -> Vec<StreamPosition> {
        let mut earliest: BTreeMap<(&str, i32), i64> = BTreeMap::new();
        for record in records {
            earliest
                .entry((record.topic.as_str(), record.partition))
                .and_modify(|offset| *offset = (*offset).min(record.offset))
                .or_insert(record.offset);
        }

        earliest
            .into_iter()
            .map(|((topic, partition), offset)| StreamPosition::new(topic, partition, offset))
            .collect()
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// A record received from the stream.
///
/// Immutable once received; owned by the ingestion loop for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// The topic the record was read from.
    pub topic: String,
    /// The partition the record was read from.
    pub partition: i32,
    /// The record offset within the partition.
    pub offset: i64,
    /// The raw payload; `None` for tombstones.
    pub payload: Option<Vec<u8>>,
}

impl StreamRecord {
    /// Create a record with a payload.
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload: Some(payload.into()),
        }
    }

    /// The position of this record.
    pub fn position(&self) -> StreamPosition {
        StreamPosition::new(self.topic.clone(), self.partition, self.offset)
    }
}
