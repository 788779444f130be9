use std::sync::Arc;

use iamgraph_core::{AppResult, ModelId};
use iamgraph_domain::{
    Binding, Permission, Principal, PrincipalType, Resource, ResourceKey, ResourceType, Role,
};

use crate::import_ports::GraphRepository;

/// Writes the deterministic `TEST` scenario.
///
/// One project with a bucket and a SQL instance, roles `sqlreader` and
/// `sqlwriter` over two `cloudsql.table.*` permissions, groups `group1` and
/// `group2` (member of `group1`), users `felix` and `fooba` (members of
/// `group2`), and two bindings.
pub(super) struct TestScenarioSeeder {
    model_id: ModelId,
    graph_repository: Arc<dyn GraphRepository>,
}

impl TestScenarioSeeder {
    pub(super) fn new(model_id: ModelId, graph_repository: Arc<dyn GraphRepository>) -> Self {
        Self {
            model_id,
            graph_repository,
        }
    }

    pub(super) async fn seed(&self) -> AppResult<()> {
        let project = self
            .add_resource(Resource::root(
                &ResourceKey::new(ResourceType::Project, "test-project")?,
                Some("Test project".to_owned()),
            ))
            .await?;
        self.add_resource(Resource::child(
            &project,
            &ResourceKey::new(ResourceType::Bucket, "test-bucket")?,
            None,
        ))
        .await?;
        let instance = self
            .add_resource(Resource::child(
                &project,
                &ResourceKey::new(ResourceType::CloudSqlInstance, "db1")?,
                None,
            ))
            .await?;

        let read = Permission::new("cloudsql.table.read")?;
        let write = Permission::new("cloudsql.table.write")?;
        for permission in [&read, &write] {
            self.graph_repository
                .upsert_permission(self.model_id, permission)
                .await?;
        }

        let sqlreader = self
            .graph_repository
            .create_role(self.model_id, Role::new("sqlreader", [read.clone()])?)
            .await?;
        let sqlwriter = self
            .graph_repository
            .create_role(self.model_id, Role::new("sqlwriter", [read, write])?)
            .await?;

        let group1 = self
            .add_principal(Principal::new(PrincipalType::Group, "group1")?)
            .await?;
        let group2 = self
            .add_principal(Principal::new(PrincipalType::Group, "group2")?.with_parents([&group1]))
            .await?;
        for user in ["felix", "fooba"] {
            self.add_principal(Principal::new(PrincipalType::User, user)?.with_parents([&group2]))
                .await?;
        }

        self.graph_repository
            .insert_binding(
                self.model_id,
                Binding::new(
                    instance.name(),
                    sqlreader.name(),
                    [group1.name().to_owned()],
                )?,
            )
            .await?;
        self.graph_repository
            .insert_binding(
                self.model_id,
                Binding::new(project.name(), sqlwriter.name(), [group2.name().to_owned()])?,
            )
            .await?;

        Ok(())
    }

    async fn add_resource(&self, resource: Resource) -> AppResult<Resource> {
        self.graph_repository
            .upsert_resource(self.model_id, resource)
            .await
    }

    async fn add_principal(&self, principal: Principal) -> AppResult<Principal> {
        self.graph_repository
            .upsert_principal(self.model_id, principal)
            .await
    }
}
