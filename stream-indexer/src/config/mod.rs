//! Configuration and dependency wiring for the stream indexer.

mod dependencies;
mod settings;

pub use dependencies::{provision_index, Dependencies};
pub use settings::{ConnectionMode, IndexerConfig};
