//! Document transformer.
//!
//! Derives the document identity from a field inside each change event and keeps
//! the event text unchanged as the document body.

use serde_json::Value;
use stream_indexer_shared::IndexDocument;
use tracing::trace;

use crate::consumer::StreamRecord;
use crate::errors::{IngestError, MalformedEventError};

/// JSON pointer to the identity field of a change event.
pub const DEFAULT_ID_POINTER: &str = "/meta/id";

/// Turns raw change events into index documents.
///
/// Stateless: the same payload always yields the same document, which is what makes
/// redelivered events overwrite rather than duplicate.
#[derive(Debug, Clone)]
pub struct DocumentTransformer {
    id_pointer: String,
}

impl DocumentTransformer {
    /// Create a transformer reading the identity from `/meta/id`.
    pub fn new() -> Self {
        Self {
            id_pointer: DEFAULT_ID_POINTER.to_string(),
        }
    }

    /// Create a transformer reading the identity from a custom JSON pointer.
    ///
    /// # Returns
    ///
    /// * `Ok(DocumentTransformer)` - A transformer using `pointer`
    /// * `Err(IngestError)` - If `pointer` is not a JSON pointer (must start with `/`)
    pub fn with_id_pointer(pointer: impl Into<String>) -> Result<Self, IngestError> {
        let pointer = pointer.into();
        if !pointer.starts_with('/') {
            return Err(IngestError::invalid_config(format!(
                "document id pointer must start with '/': {}",
                pointer
            )));
        }
        Ok(Self {
            id_pointer: pointer,
        })
    }

    /// The JSON pointer used to locate the identity field.
    pub fn id_pointer(&self) -> &str {
        &self.id_pointer
    }

    /// Transform one event payload into an index document.
    ///
    /// The body is the payload text as received; only the identity is extracted.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexDocument)` - The document keyed by the event's identity field
    /// * `Err(MalformedEventError)` - If the payload is not JSON text or has no usable identity
    pub fn transform(&self, payload: &[u8]) -> Result<IndexDocument, MalformedEventError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| MalformedEventError::InvalidEncoding(e.to_string()))?;

        let event: Value = serde_json::from_str(text)
            .map_err(|e| MalformedEventError::InvalidJson(e.to_string()))?;

        let id = match event.pointer(&self.id_pointer) {
            None | Some(Value::Null) => {
                return Err(MalformedEventError::MissingId {
                    pointer: self.id_pointer.clone(),
                })
            }
            Some(Value::String(id)) => id.clone(),
            Some(_) => {
                return Err(MalformedEventError::IdNotString {
                    pointer: self.id_pointer.clone(),
                })
            }
        };

        let document =
            IndexDocument::new(id, text).map_err(|_| MalformedEventError::EmptyId {
                pointer: self.id_pointer.clone(),
            })?;

        trace!(document_id = %document.id(), "Transformed event");
        Ok(document)
    }

    /// Transform a stream record, treating a missing payload as malformed.
    pub fn transform_record(
        &self,
        record: &StreamRecord,
    ) -> Result<IndexDocument, MalformedEventError> {
        match &record.payload {
            Some(payload) => self.transform(payload),
            None => Err(MalformedEventError::MissingPayload),
        }
    }
}

impl Default for DocumentTransformer {
    fn default() -> Self {
        Self::new()
    }
}
