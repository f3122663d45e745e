//! Index document type.
//!
//! An `IndexDocument` is what a change event becomes once its identity has been
//! extracted. The body is kept exactly as received from the stream.

use thiserror::Error;

/// A document identifier was empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("document id must not be empty")]
pub struct InvalidDocumentId;

/// A document to be upserted into the search index.
///
/// # Fields
///
/// - `id`: Identifier used as the search engine `_id`; never empty
/// - `body`: The raw JSON event payload, indexed without reshaping
///
/// Two documents built from the same event always carry the same `id`, so a
/// redelivered event overwrites the stored document instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    id: String,
    body: String,
}

impl IndexDocument {
    /// Create a new document.
    ///
    /// # Arguments
    ///
    /// * `id` - The document identifier
    /// * `body` - The raw JSON body
    ///
    /// # Example
    ///
    /// ```
    /// use stream_indexer_shared::IndexDocument;
    ///
    /// let doc = IndexDocument::new("a1b2", r#"{"meta":{"id":"a1b2"}}"#).unwrap();
    /// assert_eq!(doc.id(), "a1b2");
    /// ```
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Result<Self, InvalidDocumentId> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidDocumentId);
        }

        Ok(Self {
            id,
            body: body.into(),
        })
    }

    /// The document identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The raw JSON body.
    pub fn body(&self) -> &str {
        &self.body
    }
}
