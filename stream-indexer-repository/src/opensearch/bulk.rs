//! Bulk request construction and response parsing for OpenSearch.
//!
//! Kept separate from the provider so the per-item bookkeeping can be tested
//! without a running cluster.

use std::collections::HashMap;

use opensearch::http::request::JsonBody;
use serde::Deserialize;
use serde_json::value::{to_raw_value, RawValue};
use serde_json::{json, Value};
use stream_indexer_shared::IndexDocument;
use tracing::warn;

use crate::errors::SearchIndexError;
use crate::types::BatchResult;

/// A bulk request body plus the bookkeeping needed to map the response back.
pub(crate) struct PreparedBulk {
    /// NDJSON body lines (action, source, action, source, ...).
    pub body: Vec<JsonBody<Box<RawValue>>>,
    /// One slot per input document, in input order.
    slots: Vec<Slot>,
}

enum Slot {
    /// Sent to the engine; the response item decides the outcome.
    Submitted(String),
    /// Never sent because the body could not be encoded.
    Rejected(BatchResult),
}

impl PreparedBulk {
    /// Number of documents actually sent.
    pub fn submitted(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Submitted(_)))
            .count()
    }

    /// Results for a request that was never sent because nothing was encodable.
    pub fn into_unsent_results(self) -> Vec<BatchResult> {
        self.slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Rejected(result) => Some(result),
                Slot::Submitted(_) => None,
            })
            .collect()
    }
}

/// Build a bulk body that upserts every document by id.
///
/// Uses the `index` action with an explicit `_id`: the engine creates the document
/// if absent and replaces it otherwise. The source line is the document body as
/// received, never reparsed into a map.
pub(crate) fn prepare_bulk(documents: &[IndexDocument]) -> PreparedBulk {
    let mut body = Vec::with_capacity(documents.len() * 2);
    let mut slots = Vec::with_capacity(documents.len());

    for doc in documents {
        match encode_document(doc) {
            Ok((action, source)) => {
                body.push(JsonBody::new(action));
                body.push(JsonBody::new(source));
                slots.push(Slot::Submitted(doc.id().to_string()));
            }
            Err(e) => {
                slots.push(Slot::Rejected(BatchResult::failed(
                    doc.id(),
                    None,
                    Some("serialization_error".to_string()),
                    format!("Document body is not valid JSON: {}", e),
                )));
            }
        }
    }

    PreparedBulk { body, slots }
}

/// Encode the action and source lines of one document.
fn encode_document(
    doc: &IndexDocument,
) -> Result<(Box<RawValue>, Box<RawValue>), serde_json::Error> {
    let action = to_raw_value(&json!({ "index": { "_id": doc.id() } }))?;

    // Newlines can only be insignificant whitespace in valid JSON, and each must go
    // to keep the source on one NDJSON line
    let source = if doc.body().contains('\n') {
        RawValue::from_string(doc.body().replace('\n', " "))?
    } else {
        RawValue::from_string(doc.body().to_string())?
    };

    Ok((action, source))
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    status: Option<u16>,
    error: Option<Value>,
}

/// Map a bulk response onto the prepared slots, preserving input order.
///
/// Items are matched positionally; the engine answers in request order. A response
/// that is missing trailing items reports those documents as failed.
pub(crate) fn parse_bulk_response(
    prepared: PreparedBulk,
    response: Value,
) -> Result<Vec<BatchResult>, SearchIndexError> {
    let response: BulkResponse = serde_json::from_value(response)
        .map_err(|e| SearchIndexError::parse(format!("Invalid bulk response: {}", e)))?;

    let submitted = prepared.submitted();
    if response.items.len() != submitted {
        warn!(
            expected = submitted,
            received = response.items.len(),
            "Bulk response item count does not match request"
        );
    }

    let mut items = response.items.into_iter();
    let mut results = Vec::with_capacity(prepared.slots.len());

    for slot in prepared.slots {
        let document_id = match slot {
            Slot::Rejected(result) => {
                results.push(result);
                continue;
            }
            Slot::Submitted(document_id) => document_id,
        };

        let item = items.next().and_then(|item| item.into_values().next());
        results.push(match item {
            Some(item) => item_result(document_id, item),
            None => BatchResult::failed(
                document_id,
                None,
                None,
                "No result returned for document in bulk response",
            ),
        });
    }

    Ok(results)
}

fn item_result(document_id: String, item: BulkItem) -> BatchResult {
    let status_failed = item.status.map(|s| s >= 300).unwrap_or(false);

    match item.error {
        Some(Value::Object(error)) => BatchResult::failed(
            document_id,
            item.status,
            error
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string),
            error
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown reason")
                .to_string(),
        ),
        Some(Value::String(reason)) => BatchResult::failed(document_id, item.status, None, reason),
        Some(other) => BatchResult::failed(document_id, item.status, None, other.to_string()),
        None if status_failed => BatchResult::failed(
            document_id,
            item.status,
            None,
            "Item failed without error details",
        ),
        None => BatchResult::indexed(document_id),
    }
}
