//! OpenSearch index creation body.

use serde_json::{json, Map, Value};

use crate::config::IndexSettings;

/// Build the body of a create-index request.
///
/// Returns `None` when no setting is overridden, so the index is created with the
/// cluster defaults and dynamic mapping.
///
/// # Arguments
///
/// * `settings` - The configured index settings
pub fn create_index_body(settings: &IndexSettings) -> Option<Value> {
    if settings.is_default() {
        return None;
    }

    let mut index_settings = Map::new();
    if let Some(shards) = settings.number_of_shards {
        index_settings.insert("number_of_shards".to_string(), json!(shards));
    }
    if let Some(replicas) = settings.number_of_replicas {
        index_settings.insert("number_of_replicas".to_string(), json!(replicas));
    }

    Some(json!({ "settings": index_settings }))
}
