//! Shared types for the stream indexer.

pub mod index_document;
