use async_trait::async_trait;
use iamgraph_core::AppResult;
use serde_json::Value;

/// Untyped `(kind, payload)` pair pulled from the inventory stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Wire kind, e.g. `projects`.
    pub kind: String,
    /// Kind-specific payload.
    pub payload: Value,
}

impl RawRecord {
    /// Creates a raw record.
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Pull-based, single-pass inventory stream.
///
/// Implementations must emit parents before their children.
#[async_trait]
pub trait RecordSource: Send {
    /// Returns the next record, or `None` once the stream is exhausted.
    async fn next_record(&mut self) -> AppResult<Option<RawRecord>>;
}
