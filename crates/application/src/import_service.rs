use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use iamgraph_core::{AppError, AppResult, ModelId};
use iamgraph_domain::{Model, RecordKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::import_ports::{
    GraphCounts, GraphRepository, ImportSettings, ImportSource, ModelRepository,
    PermissionSource, RawRecord, RecordSource, UnknownRecordKindPolicy,
};

mod coordinator;
mod fixture;
mod heartbeat;
mod policies;
mod principals;
mod resources;

pub use coordinator::ImportCoordinator;
pub use policies::PolicyBindingResolver;
pub use principals::PrincipalResolver;
pub use resources::ResourceResolver;

/// Outcome of one completed import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records dispatched to a resolver.
    pub records_processed: u64,
    /// Ignored or skipped unknown records.
    pub records_skipped: u64,
    /// Heartbeat writes, including the one at run start.
    pub heartbeats: u64,
    /// Dispatched records per kind.
    pub records_by_kind: BTreeMap<RecordKind, u64>,
    /// Entity totals of the model when the run completed.
    pub counts: GraphCounts,
}

impl ImportSummary {
    fn record_handled(&mut self, kind: RecordKind) {
        self.records_processed = self.records_processed.saturating_add(1);
        let count = self.records_by_kind.entry(kind).or_default();
        *count = count.saturating_add(1);
    }
}

/// Import request resolved from an [`ImportSource`] selection.
pub enum ImportRequest {
    /// Complete the model without importing anything.
    Empty,
    /// Seed the deterministic fixture scenario.
    Test,
    /// Run the full pipeline over an inventory stream.
    Forseti(Box<dyn RecordSource>),
}

impl ImportRequest {
    /// Builds a request, requiring a stream for `FORSETI`.
    pub fn from_source(
        source: ImportSource,
        record_source: Option<Box<dyn RecordSource>>,
    ) -> AppResult<Self> {
        match (source, record_source) {
            (ImportSource::Empty, _) => Ok(Self::Empty),
            (ImportSource::Test, _) => Ok(Self::Test),
            (ImportSource::Forseti, Some(record_source)) => Ok(Self::Forseti(record_source)),
            (ImportSource::Forseti, None) => Err(AppError::Validation(
                "FORSETI import requires an inventory record source".to_owned(),
            )),
        }
    }

    /// Returns the selector this request was built from.
    #[must_use]
    pub fn source(&self) -> ImportSource {
        match self {
            Self::Empty => ImportSource::Empty,
            Self::Test => ImportSource::Test,
            Self::Forseti(_) => ImportSource::Forseti,
        }
    }
}

struct EmptyRecordSource;

#[async_trait]
impl RecordSource for EmptyRecordSource {
    async fn next_record(&mut self) -> AppResult<Option<RawRecord>> {
        Ok(None)
    }
}

/// Application service creating models and running imports into them.
#[derive(Clone)]
pub struct ImportService {
    model_repository: Arc<dyn ModelRepository>,
    graph_repository: Arc<dyn GraphRepository>,
    permission_source: Arc<dyn PermissionSource>,
    settings: ImportSettings,
}

impl ImportService {
    /// Creates an import service with default settings.
    #[must_use]
    pub fn new(
        model_repository: Arc<dyn ModelRepository>,
        graph_repository: Arc<dyn GraphRepository>,
        permission_source: Arc<dyn PermissionSource>,
    ) -> Self {
        Self {
            model_repository,
            graph_repository,
            permission_source,
            settings: ImportSettings::default(),
        }
    }

    /// Overrides run settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ImportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Persists a new pending model.
    pub async fn create_model(&self) -> AppResult<Model> {
        let model = self
            .model_repository
            .create_model(Model::pending(ModelId::new(), Utc::now()))
            .await?;

        info!(model_id = %model.model_id, "model created");
        Ok(model)
    }

    /// Returns one model or `NotFound`.
    pub async fn model(&self, model_id: ModelId) -> AppResult<Model> {
        self.model_repository
            .find_model(model_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("model '{model_id}' not found")))
    }

    /// Runs one import into an existing model until done or failed.
    pub async fn run_import(
        &self,
        model_id: ModelId,
        request: ImportRequest,
        cancellation: CancellationToken,
    ) -> AppResult<ImportSummary> {
        debug!(model_id = %model_id, source = request.source().as_str(), "running import");
        let coordinator = ImportCoordinator::new(
            model_id,
            self.model_repository.clone(),
            self.graph_repository.clone(),
            self.permission_source.clone(),
            self.settings,
            cancellation,
        );

        match request {
            ImportRequest::Empty => {
                let mut empty = EmptyRecordSource;
                coordinator.run(&mut empty).await
            }
            ImportRequest::Test => coordinator.run_fixture().await,
            ImportRequest::Forseti(mut record_source) => {
                coordinator.run(record_source.as_mut()).await
            }
        }
    }

    /// Schedules an import on the tokio runtime.
    pub fn spawn_import(
        &self,
        model_id: ModelId,
        request: ImportRequest,
        cancellation: CancellationToken,
    ) -> JoinHandle<AppResult<ImportSummary>> {
        let service = self.clone();
        tokio::spawn(async move { service.run_import(model_id, request, cancellation).await })
    }

    /// Marks running models without a heartbeat for `stale_after` as broken.
    pub async fn sweep_stale_models(&self, stale_after: Duration) -> AppResult<Vec<ModelId>> {
        let stale_after = chrono::Duration::from_std(stale_after).map_err(|error| {
            AppError::Validation(format!("invalid stale threshold: {error}"))
        })?;

        let cutoff = Utc::now().checked_sub_signed(stale_after).ok_or_else(|| {
            AppError::Validation(format!(
                "stale threshold of {}s reaches before the earliest timestamp",
                stale_after.num_seconds()
            ))
        })?;

        let broken = self
            .model_repository
            .mark_stale_models_broken(cutoff)
            .await?;

        for model_id in &broken {
            warn!(model_id = %model_id, "stale import marked broken");
        }

        Ok(broken)
    }
}

#[cfg(test)]
mod tests;
