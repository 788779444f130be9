use std::collections::HashMap;
use std::sync::Arc;

use iamgraph_core::{AppError, AppResult, ModelId};
use iamgraph_domain::{
    BucketRecord, CloudSqlInstanceRecord, FolderRecord, OrganizationRecord, ProjectRecord,
    Resource, ResourceKey, ResourceType,
};
use tracing::debug;

use crate::import_ports::GraphRepository;

/// Cache key under which the organization root is also stored.
const ORGANIZATION_ROOT_KEY: &str = "organization";

/// Resources resolved during one run, keyed by local `type/id` name.
///
/// Never evicts; bounded by the resource count of a single import.
#[derive(Debug, Default)]
struct ResourceCache {
    entries: HashMap<String, Resource>,
}

impl ResourceCache {
    fn parent(&self, parent_type: ResourceType, parent_id: Option<&str>) -> AppResult<&Resource> {
        let key = match parent_id {
            Some(parent_id) => ResourceKey::new(parent_type, parent_id)?.local_name(),
            None if parent_type == ResourceType::Organization => ORGANIZATION_ROOT_KEY.to_owned(),
            None => {
                return Err(AppError::Resolution(format!(
                    "parent of type '{parent_type}' requires an id"
                )));
            }
        };

        self.entries.get(key.as_str()).ok_or_else(|| {
            AppError::Resolution(format!(
                "parent '{key}' has not been imported yet; parents must precede their children"
            ))
        })
    }

    fn insert(&mut self, resource: Resource) {
        self.entries.insert(resource.name().to_owned(), resource);
    }

    fn insert_root(&mut self, resource: Resource) {
        self.entries
            .insert(ORGANIZATION_ROOT_KEY.to_owned(), resource.clone());
        self.insert(resource);
    }
}

/// Resolves resource records into persisted hierarchy nodes.
pub struct ResourceResolver {
    model_id: ModelId,
    graph_repository: Arc<dyn GraphRepository>,
    cache: ResourceCache,
}

impl ResourceResolver {
    /// Creates a resolver with an empty cache for one run.
    #[must_use]
    pub fn new(model_id: ModelId, graph_repository: Arc<dyn GraphRepository>) -> Self {
        Self {
            model_id,
            graph_repository,
            cache: ResourceCache::default(),
        }
    }

    /// Resolves an organization root.
    pub async fn resolve_organization(&mut self, record: OrganizationRecord) -> AppResult<Resource> {
        let key = ResourceKey::new(ResourceType::Organization, record.org_id)?;
        let organization = self
            .graph_repository
            .upsert_resource(self.model_id, Resource::root(&key, record.display_name))
            .await?;

        self.cache.insert_root(organization.clone());
        Ok(organization)
    }

    /// Resolves a folder below its declared parent.
    pub async fn resolve_folder(&mut self, record: FolderRecord) -> AppResult<Resource> {
        let key = ResourceKey::new(ResourceType::Folder, record.folder_id)?;
        self.resolve_child(
            record.parent_type,
            record.parent_id.as_deref(),
            key,
            record.display_name,
        )
        .await
    }

    /// Resolves a project below its declared parent.
    pub async fn resolve_project(&mut self, record: ProjectRecord) -> AppResult<Resource> {
        let key = ResourceKey::new(ResourceType::Project, record.project_number)?;
        let display_name = record.project_name.or(record.project_id);
        self.resolve_child(
            record.parent_type,
            record.parent_id.as_deref(),
            key,
            display_name,
        )
        .await
    }

    /// Resolves a bucket below its owning project.
    pub async fn resolve_bucket(&mut self, record: BucketRecord) -> AppResult<Resource> {
        let key = ResourceKey::new(ResourceType::Bucket, record.bucket_id)?;
        self.resolve_child(
            ResourceType::Project,
            Some(record.project_number.as_str()),
            key,
            None,
        )
        .await
    }

    /// Resolves a Cloud SQL instance below its owning project.
    pub async fn resolve_cloudsql_instance(
        &mut self,
        record: CloudSqlInstanceRecord,
    ) -> AppResult<Resource> {
        let key = ResourceKey::new(ResourceType::CloudSqlInstance, record.name)?;
        self.resolve_child(
            ResourceType::Project,
            Some(record.project_number.as_str()),
            key,
            None,
        )
        .await
    }

    /// Returns how many resources this run has cached.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.entries.len()
    }

    async fn resolve_child(
        &mut self,
        parent_type: ResourceType,
        parent_id: Option<&str>,
        key: ResourceKey,
        display_name: Option<String>,
    ) -> AppResult<Resource> {
        let child = Resource::child(self.cache.parent(parent_type, parent_id)?, &key, display_name);
        debug!(
            model_id = %self.model_id,
            full_name = %child.full_name(),
            "resolved resource"
        );

        let stored = self
            .graph_repository
            .upsert_resource(self.model_id, child)
            .await?;

        self.cache.insert(stored.clone());
        Ok(stored)
    }
}
