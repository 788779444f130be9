use super::*;

use iamgraph_domain::{InventoryRecord, RecordDisposition, classify_record_kind};

use super::fixture::TestScenarioSeeder;
use super::heartbeat::Heartbeat;

/// Drives one import run: lifecycle status, record dispatch and heartbeat.
///
/// Owns the run's caches exclusively; a coordinator is consumed by its run.
pub struct ImportCoordinator {
    model_id: ModelId,
    model_repository: Arc<dyn ModelRepository>,
    graph_repository: Arc<dyn GraphRepository>,
    settings: ImportSettings,
    cancellation: CancellationToken,
    heartbeat: Heartbeat,
    dispatcher: RecordDispatcher,
}

/// Routes decoded records to the resolvers and tallies the run.
struct RecordDispatcher {
    model_id: ModelId,
    resources: ResourceResolver,
    principals: PrincipalResolver,
    policies: PolicyBindingResolver,
    unknown_kind_policy: UnknownRecordKindPolicy,
    summary: ImportSummary,
}

impl ImportCoordinator {
    /// Creates a coordinator with fresh resolvers for one model.
    #[must_use]
    pub fn new(
        model_id: ModelId,
        model_repository: Arc<dyn ModelRepository>,
        graph_repository: Arc<dyn GraphRepository>,
        permission_source: Arc<dyn PermissionSource>,
        settings: ImportSettings,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            model_id,
            dispatcher: RecordDispatcher {
                model_id,
                resources: ResourceResolver::new(model_id, graph_repository.clone()),
                principals: PrincipalResolver::new(model_id, graph_repository.clone()),
                policies: PolicyBindingResolver::new(
                    model_id,
                    graph_repository.clone(),
                    permission_source,
                ),
                unknown_kind_policy: settings.unknown_kind_policy,
                summary: ImportSummary::default(),
            },
            heartbeat: Heartbeat::new(
                model_id,
                model_repository.clone(),
                settings.heartbeat_interval,
            ),
            model_repository,
            graph_repository,
            settings,
            cancellation,
        }
    }

    /// Consumes the stream to exhaustion and marks the model done.
    ///
    /// On any error the model is left running for the watchdog.
    pub async fn run(mut self, source: &mut dyn RecordSource) -> AppResult<ImportSummary> {
        self.begin().await?;

        if let Err(error) = self.consume(source).await {
            warn!(
                model_id = %self.model_id,
                records_processed = self.dispatcher.summary.records_processed,
                error = %error,
                "import aborted; model left running"
            );
            return Err(error);
        }

        self.finish().await
    }

    /// Seeds the fixture scenario inside the same lifecycle as a stream run.
    pub(super) async fn run_fixture(mut self) -> AppResult<ImportSummary> {
        self.begin().await?;

        let seeder = TestScenarioSeeder::new(self.model_id, self.graph_repository.clone());
        self.heartbeat.pace(seeder.seed()).await?;

        self.finish().await
    }

    async fn begin(&mut self) -> AppResult<()> {
        self.settings.validate()?;
        self.model_repository.mark_in_progress(self.model_id).await?;
        self.heartbeat.beat().await?;

        info!(
            model_id = %self.model_id,
            heartbeat_interval_secs = self.settings.heartbeat_interval.as_secs(),
            unknown_kind_policy = self.settings.unknown_kind_policy.as_str(),
            "import started"
        );
        Ok(())
    }

    async fn consume(&mut self, source: &mut dyn RecordSource) -> AppResult<()> {
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancellation.cancelled() => {
                    return Err(AppError::Cancelled(format!(
                        "import of model '{}' was cancelled",
                        self.model_id
                    )));
                }
                next = self.heartbeat.pace(source.next_record()) => next?,
            };

            let Some(record) = next else {
                return Ok(());
            };

            self.heartbeat.pace(self.dispatcher.process(record)).await?;
        }
    }

    async fn finish(self) -> AppResult<ImportSummary> {
        let mut summary = self.dispatcher.summary;
        summary.counts = self.graph_repository.graph_counts(self.model_id).await?;
        summary.heartbeats = self.heartbeat.beats();
        self.model_repository.mark_done(self.model_id).await?;

        info!(
            model_id = %self.model_id,
            records_processed = summary.records_processed,
            records_skipped = summary.records_skipped,
            cached_resources = self.dispatcher.resources.cached_count(),
            resources = summary.counts.resources,
            principals = summary.counts.principals,
            roles = summary.counts.roles,
            permissions = summary.counts.permissions,
            bindings = summary.counts.bindings,
            heartbeats = summary.heartbeats,
            "import completed"
        );
        Ok(summary)
    }
}

impl RecordDispatcher {
    async fn process(&mut self, record: RawRecord) -> AppResult<()> {
        match classify_record_kind(record.kind.as_str()) {
            RecordDisposition::Handled(kind) => {
                let typed = InventoryRecord::decode(kind, record.payload)?;
                self.dispatch(typed).await?;
                self.summary.record_handled(kind);
            }
            RecordDisposition::Ignored => {
                debug!(model_id = %self.model_id, kind = %record.kind, "skipping ignored record");
                self.summary.records_skipped = self.summary.records_skipped.saturating_add(1);
            }
            RecordDisposition::Unknown => match self.unknown_kind_policy {
                UnknownRecordKindPolicy::Fail => {
                    return Err(AppError::UnsupportedRecordKind(record.kind));
                }
                UnknownRecordKindPolicy::Skip => {
                    warn!(model_id = %self.model_id, kind = %record.kind, "skipping unknown record kind");
                    self.summary.records_skipped = self.summary.records_skipped.saturating_add(1);
                }
            },
        }

        Ok(())
    }

    async fn dispatch(&mut self, record: InventoryRecord) -> AppResult<()> {
        match record {
            InventoryRecord::Organization(organization) => {
                self.resources.resolve_organization(organization).await?;
            }
            InventoryRecord::Folder(folder) => {
                self.resources.resolve_folder(folder).await?;
            }
            InventoryRecord::Project(project) => {
                self.resources.resolve_project(project).await?;
            }
            InventoryRecord::Bucket(bucket) => {
                self.resources.resolve_bucket(bucket).await?;
            }
            InventoryRecord::CloudSqlInstance(instance) => {
                self.resources.resolve_cloudsql_instance(instance).await?;
            }
            InventoryRecord::Policy(policy) => {
                self.policies.resolve_policy(&policy).await?;
            }
            InventoryRecord::Group(group) => {
                self.principals.resolve_group(&group).await?;
            }
            InventoryRecord::Membership(membership) => {
                self.principals.resolve_membership(&membership).await?;
            }
        }

        Ok(())
    }
}
