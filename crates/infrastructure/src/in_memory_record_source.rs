use std::collections::VecDeque;

use async_trait::async_trait;
use iamgraph_application::{RawRecord, RecordSource};
use iamgraph_core::AppResult;

/// Inventory stream over records already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    records: VecDeque<RawRecord>,
}

impl InMemoryRecordSource {
    /// Creates a stream yielding `records` in order.
    #[must_use]
    pub fn new(records: impl IntoIterator<Item = RawRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn next_record(&mut self) -> AppResult<Option<RawRecord>> {
        Ok(self.records.pop_front())
    }
}
