//! Commit cursor.

use std::collections::BTreeMap;

use crate::consumer::{StreamPosition, StreamRecord};

/// The latest position of each partition whose records are safe to acknowledge.
///
/// Only moves forward within a partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitCursor {
    positions: BTreeMap<(String, i32), i64>,
}

impl CommitCursor {
    /// Create an empty cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance past every record in `records`.
    pub fn advance(&mut self, records: &[StreamRecord]) {
        for record in records {
            self.positions
                .entry((record.topic.clone(), record.partition))
                .and_modify(|offset| *offset = (*offset).max(record.offset))
                .or_insert(record.offset);
        }
    }

    /// The last acknowledged offset of a partition, if any.
    pub fn position(&self, topic: &str, partition: i32) -> Option<i64> {
        self.positions
            .get(&(topic.to_string(), partition))
            .copied()
    }

    /// All tracked positions, ordered by topic and partition.
    pub fn positions(&self) -> Vec<StreamPosition> {
        self.positions
            .iter()
            .map(|((topic, partition), offset)| StreamPosition::new(topic.clone(), *partition, *offset))
            .collect()
    }

    /// Whether nothing has been acknowledged yet.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
