//! Authorization graph importer runtime.

#![forbid(unsafe_code)]

mod importer_config;

use std::sync::Arc;

use iamgraph_application::{ImportRequest, ImportService, ImportSource, RecordSource};
use iamgraph_core::{AppError, AppResult};
use iamgraph_infrastructure::{
    JsonLinesRecordSource, PostgresGraphRepository, PostgresModelRepository,
    StaticPermissionSource,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::importer_config::{ImporterCommand, ImporterConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ImporterConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.command == ImporterCommand::Migrate {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let service = build_import_service(pool, &config).await?;

    if config.command == ImporterCommand::Sweep {
        let broken = service.sweep_stale_models(config.stale_after).await?;
        info!(
            broken_models = broken.len(),
            stale_after_secs = config.stale_after.as_secs(),
            "stale model sweep finished"
        );
        return Ok(());
    }

    let request = build_import_request(&config).await?;
    let model = service.create_model().await?;
    info!(
        model_id = %model.model_id,
        source = config.source.as_str(),
        "import scheduled"
    );

    let cancellation = CancellationToken::new();
    let mut handle = service.spawn_import(model.model_id, request, cancellation.clone());

    let joined = tokio::select! {
        joined = &mut handle => joined,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    warn!(model_id = %model.model_id, "interrupt received; cancelling import");
                    cancellation.cancel();
                }
                Err(error) => {
                    warn!(error = %error, "failed to listen for interrupt signal");
                }
            }
            handle.await
        }
    };

    let summary = joined
        .map_err(|error| AppError::Internal(format!("import task failed: {error}")))??;

    info!(
        model_id = %model.model_id,
        records_processed = summary.records_processed,
        records_skipped = summary.records_skipped,
        heartbeats = summary.heartbeats,
        "iamgraph-importer finished"
    );

    Ok(())
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

async fn build_import_service(pool: PgPool, config: &ImporterConfig) -> AppResult<ImportService> {
    let permission_source = match config.permissions_path.as_ref() {
        Some(path) => StaticPermissionSource::from_json_file(path).await?,
        None => StaticPermissionSource::new(),
    };
    info!(
        roles = permission_source.role_count(),
        "permission catalogue loaded"
    );

    Ok(ImportService::new(
        Arc::new(PostgresModelRepository::new(pool.clone())),
        Arc::new(PostgresGraphRepository::new(pool)),
        Arc::new(permission_source),
    )
    .with_settings(config.settings()))
}

async fn build_import_request(config: &ImporterConfig) -> AppResult<ImportRequest> {
    let record_source: Option<Box<dyn RecordSource>> =
        match (config.source, config.inventory_path.as_ref()) {
            (ImportSource::Forseti, Some(path)) => {
                Some(Box::new(JsonLinesRecordSource::open(path).await?))
            }
            _ => None,
        };

    ImportRequest::from_source(config.source, record_source)
}
