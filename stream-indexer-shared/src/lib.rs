//! # Stream Indexer Shared
//!
//! This crate defines the document type that flows from the stream consumer to
//! the search index: a stable document identifier paired with the raw event body.

pub mod types;

pub use types::index_document::{IndexDocument, InvalidDocumentId};
