use std::path::Path;

use async_trait::async_trait;
use iamgraph_application::{RawRecord, RecordSource};
use iamgraph_core::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

#[derive(Debug, Deserialize)]
struct RecordLine {
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Inventory stream reading one `{"kind": …, "payload": …}` object per line.
///
/// Blank lines are skipped. Lines are read lazily, so the file is never
/// held in memory as a whole.
pub struct JsonLinesRecordSource<R> {
    origin: String,
    lines: Lines<R>,
    line_number: u64,
}

impl JsonLinesRecordSource<BufReader<File>> {
    /// Opens an inventory dump on disk.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|error| {
            AppError::Validation(format!(
                "failed to open inventory file '{}': {error}",
                path.display()
            ))
        })?;

        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<R> JsonLinesRecordSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Wraps any buffered reader; `origin` names it in error messages.
    pub fn from_reader(reader: R, origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

#[async_trait]
impl<R> RecordSource for JsonLinesRecordSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_record(&mut self) -> AppResult<Option<RawRecord>> {
        loop {
            let line = self.lines.next_line().await.map_err(|error| {
                AppError::Internal(format!(
                    "failed to read line {} of '{}': {error}",
                    self.line_number + 1,
                    self.origin
                ))
            })?;

            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            let record: RecordLine = serde_json::from_str(line.as_str()).map_err(|error| {
                AppError::Validation(format!(
                    "malformed inventory line {} of '{}': {error}",
                    self.line_number, self.origin
                ))
            })?;

            return Ok(Some(RawRecord::new(record.kind, record.payload)));
        }
    }
}
