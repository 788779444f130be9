use std::time::Duration;

use iamgraph_core::{AppError, AppResult};

/// Default interval between model heartbeat writes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Handling of record kinds outside both the handled and ignored sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownRecordKindPolicy {
    /// Abort the run with `UnsupportedRecordKind`.
    #[default]
    Fail,
    /// Log a warning and continue.
    Skip,
}

impl UnknownRecordKindPolicy {
    /// Returns stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Skip => "skip",
        }
    }

    /// Parses configuration value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            _ => Err(AppError::Validation(format!(
                "unknown record kind policy '{value}', expected 'fail' or 'skip'"
            ))),
        }
    }
}

/// Import source selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSource {
    /// No records; the model completes immediately.
    Empty,
    /// Deterministic fixture scenario.
    Test,
    /// Full pipeline over an inventory record stream.
    Forseti,
}

impl ImportSource {
    /// Returns stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Test => "TEST",
            Self::Forseti => "FORSETI",
        }
    }

    /// Parses configuration value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EMPTY" => Ok(Self::Empty),
            "TEST" => Ok(Self::Test),
            "FORSETI" => Ok(Self::Forseti),
            _ => Err(AppError::Validation(format!(
                "unknown import source '{value}', expected EMPTY, TEST or FORSETI"
            ))),
        }
    }
}

/// Tunables of one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSettings {
    /// Minimum time between heartbeat writes.
    pub heartbeat_interval: Duration,
    /// Treatment of unknown record kinds.
    pub unknown_kind_policy: UnknownRecordKindPolicy,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            unknown_kind_policy: UnknownRecordKindPolicy::Fail,
        }
    }
}

impl ImportSettings {
    /// Validates settings before a run.
    pub fn validate(&self) -> AppResult<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(AppError::Validation(
                "heartbeat interval must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}
