use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iamgraph_application::{GraphCounts, GraphRepository, ModelRepository};
use iamgraph_core::{AppError, AppResult, ModelId};
use iamgraph_domain::{Binding, Model, ModelStatus, Permission, Principal, Resource, Role};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory model and graph store.
///
/// Every write is visible to later reads immediately, matching the
/// eager durability of the PostgreSQL adapters.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    models: RwLock<HashMap<ModelId, Model>>,
    resources: RwLock<HashMap<(ModelId, String), Resource>>,
    principals: RwLock<HashMap<(ModelId, String), Principal>>,
    permissions: RwLock<HashMap<(ModelId, String), Permission>>,
    roles: RwLock<HashMap<(ModelId, String), Role>>,
    bindings: RwLock<Vec<(ModelId, String, Binding)>>,
}

impl InMemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn transition(
        &self,
        model_id: ModelId,
        allowed: &[ModelStatus],
        next: ModelStatus,
    ) -> AppResult<()> {
        let mut models = self.models.write().await;
        let model = models
            .get_mut(&model_id)
            .ok_or_else(|| AppError::NotFound(format!("model '{model_id}' not found")))?;

        if !allowed.contains(&model.status) {
            return Err(AppError::Validation(format!(
                "model '{model_id}' cannot move from {} to {next}",
                model.status
            )));
        }

        model.status = next;
        Ok(())
    }
}

fn scoped<'a, T: 'a>(
    model_id: ModelId,
    entries: impl IntoIterator<Item = (&'a (ModelId, String), &'a T)>,
) -> impl Iterator<Item = &'a T> {
    entries
        .into_iter()
        .filter_map(move |((owner, _), value)| (*owner == model_id).then_some(value))
}

#[async_trait]
impl ModelRepository for InMemoryGraphStore {
    async fn create_model(&self, model: Model) -> AppResult<Model> {
        let mut models = self.models.write().await;
        if models.contains_key(&model.model_id) {
            return Err(AppError::Validation(format!(
                "model '{}' already exists",
                model.model_id
            )));
        }

        models.insert(model.model_id, model.clone());
        Ok(model)
    }

    async fn find_model(&self, model_id: ModelId) -> AppResult<Option<Model>> {
        Ok(self.models.read().await.get(&model_id).cloned())
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
        let mut models = self.models.write().await;
        let model = models
            .get_mut(&model_id)
            .ok_or_else(|| AppError::NotFound(format!("model '{model_id}' not found")))?;

        if model.status != ModelStatus::Running {
            return Err(AppError::Validation(format!(
                "model '{model_id}' is {} and cannot heartbeat",
                model.status
            )));
        }

        model.last_heartbeat_at = Some(at);
        Ok(())
    }

    async fn mark_done(&self, model_id: ModelId) -> AppResult<()> {
        self.transition(model_id, &[ModelStatus::Running], ModelStatus::Done)
            .await
    }

    async fn mark_stale_models_broken(&self, threshold: DateTime<Utc>) -> AppResult<Vec<ModelId>> {
        let mut models = self.models.write().await;
        let mut broken: Vec<ModelId> = models
            .values_mut()
            .filter(|model| model.is_stale(threshold))
            .map(|model| {
                model.status = ModelStatus::Broken;
                model.model_id
            })
            .collect();
        broken.sort();

        Ok(broken)
    }
}

#[async_trait]
impl GraphRepository for InMemoryGraphStore {
    async fn upsert_resource(&self, model_id: ModelId, resource: Resource) -> AppResult<Resource> {
        self.resources
            .write()
            .await
            .insert((model_id, resource.name().to_owned()), resource.clone());
        Ok(resource)
    }

    async fn find_resource(&self, model_id: ModelId, name: &str) -> AppResult<Option<Resource>> {
        Ok(self
            .resources
            .read()
            .await
            .get(&(model_id, name.to_owned()))
            .cloned())
    }

    async fn get_or_create_principal(
        &self,
        model_id: ModelId,
        principal: Principal,
    ) -> AppResult<Principal> {
        Ok(self
            .principals
            .write()
            .await
            .entry((model_id, principal.name().to_owned()))
            .or_insert(principal)
            .clone())
    }

    async fn upsert_principal(
        &self,
        model_id: ModelId,
        principal: Principal,
    ) -> AppResult<Principal> {
        self.principals
            .write()
            .await
            .insert((model_id, principal.name().to_owned()), principal.clone());
        Ok(principal)
    }

    async fn upsert_permission(&self, model_id: ModelId, permission: &Permission) -> AppResult<()> {
        self.permissions
            .write()
            .await
            .entry((model_id, permission.as_str().to_owned()))
            .or_insert_with(|| permission.clone());
        Ok(())
    }

    async fn find_role(&self, model_id: ModelId, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .get(&(model_id, name.to_owned()))
            .cloned())
    }

    async fn create_role(&self, model_id: ModelId, role: Role) -> AppResult<Role> {
        let mut roles = self.roles.write().await;
        if let Some(existing) = roles.get(&(model_id, role.name().to_owned())) {
            return Ok(existing.clone());
        }

        let mut permissions = self.permissions.write().await;
        for permission in role.permissions() {
            permissions
                .entry((model_id, permission.as_str().to_owned()))
                .or_insert_with(|| permission.clone());
        }

        roles.insert((model_id, role.name().to_owned()), role.clone());
        Ok(role)
    }

    async fn insert_binding(&self, model_id: ModelId, binding: Binding) -> AppResult<String> {
        let binding_id = Uuid::new_v4().to_string();
        self.bindings
            .write()
            .await
            .push((model_id, binding_id.clone(), binding));
        Ok(binding_id)
    }

    async fn list_resources(&self, model_id: ModelId) -> AppResult<Vec<Resource>> {
        let resources = self.resources.read().await;
        let mut values: Vec<Resource> = scoped(model_id, resources.iter()).cloned().collect();
        values.sort_by(|left, right| left.full_name().cmp(right.full_name()));
        Ok(values)
    }

    async fn list_principals(&self, model_id: ModelId) -> AppResult<Vec<Principal>> {
        let principals = self.principals.read().await;
        let mut values: Vec<Principal> = scoped(model_id, principals.iter()).cloned().collect();
        values.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(values)
    }

    async fn list_roles(&self, model_id: ModelId) -> AppResult<Vec<Role>> {
        let roles = self.roles.read().await;
        let mut values: Vec<Role> = scoped(model_id, roles.iter()).cloned().collect();
        values.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(values)
    }

    async fn list_bindings(&self, model_id: ModelId) -> AppResult<Vec<Binding>> {
        Ok(self
            .bindings
            .read()
            .await
            .iter()
            .filter(|(owner, _, _)| *owner == model_id)
            .map(|(_, _, binding)| binding.clone())
            .collect())
    }

    async fn graph_counts(&self, model_id: ModelId) -> AppResult<GraphCounts> {
        let resources = self.resources.read().await;
        let principals = self.principals.read().await;
        let roles = self.roles.read().await;
        let permissions = self.permissions.read().await;
        let bindings = self.bindings.read().await;

        Ok(GraphCounts {
            resources: scoped(model_id, resources.iter()).count(),
            principals: scoped(model_id, principals.iter()).count(),
            roles: scoped(model_id, roles.iter()).count(),
            permissions: scoped(model_id, permissions.iter()).count(),
            bindings: bindings
                .iter()
                .filter(|(owner, _, _)| *owner == model_id)
                .count(),
        })
    }
}
