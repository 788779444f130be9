use async_trait::async_trait;
use iamgraph_core::AppResult;
use iamgraph_domain::Permission;

/// Supplies the permission set of a role the first time it is seen.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Returns the permissions granted by `role_name`.
    async fn permissions_for_role(&self, role_name: &str) -> AppResult<Vec<Permission>>;
}
