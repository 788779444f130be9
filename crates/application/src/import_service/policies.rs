use std::sync::Arc;

use iamgraph_core::{AppError, AppResult, ModelId};
use iamgraph_domain::{Binding, BindingSpec, PolicyRecord, ResourceKey, Role};
use tracing::debug;

use crate::import_ports::{GraphRepository, PermissionSource};

/// Turns policy documents into roles, permissions, principals and bindings.
pub struct PolicyBindingResolver {
    model_id: ModelId,
    graph_repository: Arc<dyn GraphRepository>,
    permission_source: Arc<dyn PermissionSource>,
}

impl PolicyBindingResolver {
    /// Creates a resolver for one run.
    #[must_use]
    pub fn new(
        model_id: ModelId,
        graph_repository: Arc<dyn GraphRepository>,
        permission_source: Arc<dyn PermissionSource>,
    ) -> Self {
        Self {
            model_id,
            graph_repository,
            permission_source,
        }
    }

    /// Resolves every binding of the policy in document order.
    ///
    /// Each call appends new bindings; nothing is deduplicated.
    pub async fn resolve_policy(&self, record: &PolicyRecord) -> AppResult<Vec<Binding>> {
        let resource_key = ResourceKey::new(record.resource_type, record.resource_id.as_str())?;
        let mut bindings = Vec::with_capacity(record.policy.bindings.len());

        for spec in &record.policy.bindings {
            bindings.push(self.resolve_binding(&resource_key, spec).await?);
        }

        Ok(bindings)
    }

    async fn resolve_binding(
        &self,
        resource_key: &ResourceKey,
        spec: &BindingSpec,
    ) -> AppResult<Binding> {
        let resource_name = resource_key.local_name();
        let resource = self
            .graph_repository
            .find_resource(self.model_id, resource_name.as_str())
            .await?
            .ok_or_else(|| {
                AppError::Resolution(format!(
                    "policy target '{resource_name}' does not exist in model '{}'",
                    self.model_id
                ))
            })?;

        let role = self.resolve_role(spec.role.trim()).await?;

        let mut members = Vec::with_capacity(spec.members.len());
        for member in spec.member_refs()? {
            let principal = self
                .graph_repository
                .get_or_create_principal(self.model_id, member.to_principal()?)
                .await?;
            members.push(principal.name().to_owned());
        }

        let binding = Binding::new(resource.name(), role.name(), members)?;
        let binding_id = self
            .graph_repository
            .insert_binding(self.model_id, binding.clone())
            .await?;
        debug!(
            model_id = %self.model_id,
            binding_id = %binding_id,
            resource = %binding.resource_name(),
            role = %binding.role_name(),
            members = binding.members().len(),
            "stored binding"
        );

        Ok(binding)
    }

    async fn resolve_role(&self, role_name: &str) -> AppResult<Role> {
        if let Some(role) = self
            .graph_repository
            .find_role(self.model_id, role_name)
            .await?
        {
            return Ok(role);
        }

        let permissions = self
            .permission_source
            .permissions_for_role(role_name)
            .await?;
        let role = Role::new(role_name, permissions)?;

        self.graph_repository.create_role(self.model_id, role).await
    }
}
