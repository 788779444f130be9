use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use iamgraph_application::PermissionSource;
use iamgraph_core::{AppError, AppResult};
use iamgraph_domain::Permission;
use tracing::debug;

/// Permission source backed by a fixed role catalogue.
///
/// Roles missing from the catalogue resolve to no permissions.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionSource {
    roles: HashMap<String, Vec<Permission>>,
}

impl StaticPermissionSource {
    /// Creates an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one role definition.
    pub fn with_role<I, P>(mut self, role_name: impl Into<String>, permissions: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let permissions = permissions
            .into_iter()
            .map(Permission::new)
            .collect::<AppResult<Vec<_>>>()?;
        self.roles.insert(role_name.into(), permissions);
        Ok(self)
    }

    /// Loads a `{ "role": ["permission", …] }` catalogue from disk.
    pub async fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|error| {
            AppError::Validation(format!(
                "failed to read permission catalogue '{}': {error}",
                path.display()
            ))
        })?;

        Self::from_json_str(content.as_str())
    }

    /// Parses a `{ "role": ["permission", …] }` catalogue.
    pub fn from_json_str(content: &str) -> AppResult<Self> {
        let catalogue: HashMap<String, Vec<String>> =
            serde_json::from_str(content).map_err(|error| {
                AppError::Validation(format!("malformed permission catalogue: {error}"))
            })?;

        catalogue
            .into_iter()
            .try_fold(Self::new(), |source, (role_name, permissions)| {
                source.with_role(role_name, permissions)
            })
    }

    /// Returns how many roles the catalogue defines.
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }
}

#[async_trait]
impl PermissionSource for StaticPermissionSource {
    async fn permissions_for_role(&self, role_name: &str) -> AppResult<Vec<Permission>> {
        match self.roles.get(role_name) {
            Some(permissions) => Ok(permissions.clone()),
            None => {
                debug!(role = %role_name, "role missing from permission catalogue");
                Ok(Vec::new())
            }
        }
    }
}
