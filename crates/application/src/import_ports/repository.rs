use async_trait::async_trait;
use chrono::{DateTime, Utc};

use iamgraph_core::{AppResult, ModelId};
use iamgraph_domain::{Binding, Model, Permission, Principal, Resource, Role};

/// Entity totals for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphCounts {
    /// Resource rows.
    pub resources: usize,
    /// Principal rows.
    pub principals: usize,
    /// Role rows.
    pub roles: usize,
    /// Permission rows.
    pub permissions: usize,
    /// Binding rows.
    pub bindings: usize,
}

/// Repository port for import model lifecycle.
#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Persists a new pending model.
    async fn create_model(&self, model: Model) -> AppResult<Model>;

    /// Finds one model.
    async fn find_model(&self, model_id: ModelId) -> AppResult<Option<Model>>;

    /// Moves a pending or broken model to running.
    async fn mark_in_progress(&self, model_id: ModelId) -> AppResult<()>;

    /// Writes the liveness timestamp of a running model.
    async fn refresh_heartbeat(&self, model_id: ModelId, at: DateTime<Utc>) -> AppResult<()>;

    /// Moves a running model to done.
    async fn mark_done(&self, model_id: ModelId) -> AppResult<()>;

    /// Marks running models whose last heartbeat predates `threshold` as broken.
    async fn mark_stale_models_broken(&self, threshold: DateTime<Utc>) -> AppResult<Vec<ModelId>>;
}

/// Repository port for authorization graph entities scoped by model.
///
/// Writes are visible as soon as each call returns.
#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// Inserts or replaces a resource keyed by its local name.
    async fn upsert_resource(&self, model_id: ModelId, resource: Resource) -> AppResult<Resource>;

    /// Finds a resource by its local `type/id` name.
    async fn find_resource(&self, model_id: ModelId, name: &str) -> AppResult<Option<Resource>>;

    /// Returns the stored principal, inserting the given one if absent.
    async fn get_or_create_principal(
        &self,
        model_id: ModelId,
        principal: Principal,
    ) -> AppResult<Principal>;

    /// Inserts or replaces a principal including its parent set.
    async fn upsert_principal(&self, model_id: ModelId, principal: Principal)
    -> AppResult<Principal>;

    /// Inserts a permission if absent.
    async fn upsert_permission(&self, model_id: ModelId, permission: &Permission) -> AppResult<()>;

    /// Finds a role by name.
    async fn find_role(&self, model_id: ModelId, name: &str) -> AppResult<Option<Role>>;

    /// Inserts a role and its permissions if absent and returns the stored role.
    async fn create_role(&self, model_id: ModelId, role: Role) -> AppResult<Role>;

    /// Appends a binding and returns its identifier.
    async fn insert_binding(&self, model_id: ModelId, binding: Binding) -> AppResult<String>;

    /// Lists resources ordered by full name.
    async fn list_resources(&self, model_id: ModelId) -> AppResult<Vec<Resource>>;

    /// Lists principals ordered by name.
    async fn list_principals(&self, model_id: ModelId) -> AppResult<Vec<Principal>>;

    /// Lists roles ordered by name.
    async fn list_roles(&self, model_id: ModelId) -> AppResult<Vec<Role>>;

    /// Lists bindings in insertion order.
    async fn list_bindings(&self, model_id: ModelId) -> AppResult<Vec<Binding>>;

    /// Counts entities per table.
    async fn graph_counts(&self, model_id: ModelId) -> AppResult<GraphCounts>;
}
