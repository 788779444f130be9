use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use iamgraph_core::{AppResult, ModelId};
use tokio::time::Instant;
use tracing::debug;

use crate::import_ports::ModelRepository;

/// Writes the model heartbeat while a run waits on records or resolvers.
///
/// Uses the tokio clock so paused-time tests control it.
pub(super) struct Heartbeat {
    model_id: ModelId,
    model_repository: Arc<dyn ModelRepository>,
    interval: Duration,
    last_beat: Instant,
    beats: u64,
}

impl Heartbeat {
    pub(super) fn new(
        model_id: ModelId,
        model_repository: Arc<dyn ModelRepository>,
        interval: Duration,
    ) -> Self {
        Self {
            model_id,
            model_repository,
            interval,
            last_beat: Instant::now(),
            beats: 0,
        }
    }

    pub(super) async fn beat(&mut self) -> AppResult<()> {
        self.model_repository
            .refresh_heartbeat(self.model_id, Utc::now())
            .await?;
        self.last_beat = Instant::now();
        self.beats = self.beats.saturating_add(1);
        Ok(())
    }

    /// Drives `work` to completion, beating whenever an interval elapses first.
    pub(super) async fn pace<T>(
        &mut self,
        work: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        tokio::pin!(work);

        loop {
            let due = self.last_beat + self.interval;
            tokio::select! {
                biased;
                () = tokio::time::sleep_until(due) => {
                    debug!(model_id = %self.model_id, beats = self.beats, "heartbeat due");
                    self.beat().await?;
                }
                result = &mut work => return result,
            }
        }
    }

    pub(super) fn beats(&self) -> u64 {
        self.beats
    }
}
