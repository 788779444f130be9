use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use iamgraph_core::{AppError, AppResult, ModelId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of one import model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelStatus {
    /// Model created, import not started.
    Pending,
    /// Import in progress.
    Running,
    /// Import finished; graph is complete.
    Done,
    /// Import stalled and was abandoned by the watchdog.
    Broken,
}

impl ModelStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Broken => "BROKEN",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "BROKEN" => Ok(Self::Broken),
            _ => Err(AppError::Validation(format!(
                "unknown model status '{value}'"
            ))),
        }
    }
}

impl Display for ModelStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Persisted import model record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// Model identifier.
    pub model_id: ModelId,
    /// Current lifecycle status.
    pub status: ModelStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last liveness timestamp written by the importer.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Creates a fresh pending model.
    #[must_use]
    pub fn pending(model_id: ModelId, created_at: DateTime<Utc>) -> Self {
        Self {
            model_id,
            status: ModelStatus::Pending,
            created_at,
            last_heartbeat_at: None,
        }
    }

    /// Returns whether the import is complete and the graph can be relied on.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == ModelStatus::Done
    }

    /// Returns whether a running model has not heartbeated since `threshold`.
    #[must_use]
    pub fn is_stale(&self, threshold: DateTime<Utc>) -> bool {
        if self.status != ModelStatus::Running {
            return false;
        }

        self.last_heartbeat_at.unwrap_or(self.created_at) < threshold
    }
}
