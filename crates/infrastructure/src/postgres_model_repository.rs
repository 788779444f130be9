//! PostgreSQL-backed import model repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use iamgraph_application::ModelRepository;
use iamgraph_core::{AppError, AppResult, ModelId};
use iamgraph_domain::{Model, ModelStatus};

/// PostgreSQL implementation of the model lifecycle port.
#[derive(Clone)]
pub struct PostgresModelRepository {
    pool: PgPool,
}

impl PostgresModelRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn transition(
        &self,
        model_id: ModelId,
        allowed: &[ModelStatus],
        next: ModelStatus,
    ) -> AppResult<()> {
        let allowed: Vec<&str> = allowed.iter().map(ModelStatus::as_str).collect();
        let updated = sqlx::query(
            r#"
            UPDATE import_models
            SET status = $2
            WHERE model_id = $1
              AND status = ANY($3)
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(next.as_str())
        .bind(&allowed)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to move model '{model_id}' to {next}: {error}"
            ))
        })?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }

        match self.find_model(model_id).await? {
            Some(model) => Err(AppError::Validation(format!(
                "model '{model_id}' cannot move from {} to {next}",
                model.status
            ))),
            None => Err(AppError::NotFound(format!("model '{model_id}' not found"))),
        }
    }
}

#[async_trait]
impl ModelRepository for PostgresModelRepository {
    async fn create_model(&self, model: Model) -> AppResult<Model> {
        let row = sqlx::query_as::<_, ModelRow>(
            r#"
            INSERT INTO import_models (model_id, status, created_at, last_heartbeat_at)
            VALUES ($1, $2, $3, $4)
            RETURNING model_id, status, created_at, last_heartbeat_at
            "#,
        )
        .bind(model.model_id.as_uuid())
        .bind(model.status.as_str())
        .bind(model.created_at)
        .bind(model.last_heartbeat_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to create model '{}': {error}",
                model.model_id
            ))
        })?;

        Model::try_from(row)
    }

    async fn find_model(&self, model_id: ModelId) -> AppResult<Option<Model>> {
        let row = sqlx::query_as::<_, ModelRow>(
            r#"
            SELECT model_id, status, created_at, last_heartbeat_at
            FROM import_models
            WHERE model_id = $1
            "#,
        )
        .bind(model_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to find model '{model_id}': {error}")))?;

        row.map(Model::try_from).transpose()
    }

    async fn mark_in_progress(&self, model_id: ModelId) -> AppResult<()> {
        self.transition(
            model_id,
            &[ModelStatus::Pending, ModelStatus::Broken],
            ModelStatus::Running,
        )
        .await
    }

    async fn refresh_heartbeat(&self, model_id: ModelId, at: DateTime<Utc>) -> AppResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE import_models
            SET last_heartbeat_at = GREATEST(COALESCE(last_heartbeat_at, $2), $2)
            WHERE model_id = $1
              AND status = 'RUNNING'
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to refresh heartbeat of model '{model_id}': {error}"
            ))
        })?;

        if updated.rows_affected() == 0 {
            return Err(AppError::Validation(format!(
                "model '{model_id}' is not running and cannot heartbeat"
            )));
        }

        Ok(())
    }

    async fn mark_done(&self, model_id: ModelId) -> AppResult<()> {
        self.transition(model_id, &[ModelStatus::Running], ModelStatus::Done)
            .await
    }

    async fn mark_stale_models_broken(&self, threshold: DateTime<Utc>) -> AppResult<Vec<ModelId>> {
        let model_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE import_models
            SET status = 'BROKEN'
            WHERE status = 'RUNNING'
              AND COALESCE(last_heartbeat_at, created_at) < $1
            RETURNING model_id
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to sweep stale models: {error}")))?;

        let mut model_ids: Vec<ModelId> = model_ids.into_iter().map(ModelId::from_uuid).collect();
        model_ids.sort();
        Ok(model_ids)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ModelRow {
    model_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    last_heartbeat_at: Option<DateTime<Utc>>,
}

impl TryFrom<ModelRow> for Model {
    type Error = AppError;

    fn try_from(row: ModelRow) -> Result<Self, Self::Error> {
        Ok(Self {
            model_id: ModelId::from_uuid(row.model_id),
            status: ModelStatus::parse(row.status.as_str())?,
            created_at: row.created_at,
            last_heartbeat_at: row.last_heartbeat_at,
        })
    }
}
