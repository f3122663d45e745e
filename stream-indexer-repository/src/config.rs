//! Index settings used when the destination index has to be created.

/// Settings applied when creating the destination index.
///
/// Every field is optional; an all-`None` value creates the index with the
/// engine's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSettings {
    /// Number of primary shards.
    pub number_of_shards: Option<u32>,
    /// Number of replicas per primary shard.
    pub number_of_replicas: Option<u32>,
}

impl IndexSettings {
    /// Create settings with explicit shard and replica counts.
    ///
    /// # Arguments
    ///
    /// * `number_of_shards` - Number of primary shards
    /// * `number_of_replicas` - Number of replicas per primary shard
    pub fn new(number_of_shards: u32, number_of_replicas: u32) -> Self {
        Self {
            number_of_shards: Some(number_of_shards),
            number_of_replicas: Some(number_of_replicas),
        }
    }

    /// Whether these are the engine defaults (nothing overridden).
    pub fn is_default(&self) -> bool {
        self.number_of_shards.is_none() && self.number_of_replicas.is_none()
    }
}
