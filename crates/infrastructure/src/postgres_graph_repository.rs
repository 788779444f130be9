//! PostgreSQL-backed authorization graph repository.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use iamgraph_application::{GraphCounts, GraphRepository};
use iamgraph_core::{AppError, AppResult, ModelId};
use iamgraph_domain::{
    Binding, Permission, Principal, PrincipalType, Resource, ResourceType, Role,
};

/// PostgreSQL implementation of the graph repository port.
///
/// Each call commits on its own; multi-row writes run in one transaction.
#[derive(Clone)]
pub struct PostgresGraphRepository {
    pool: PgPool,
}

impl PostgresGraphRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_principal(&self, model_id: ModelId, name: &str) -> AppResult<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT name, principal_type, member_name
            FROM graph_principals
            WHERE model_id = $1 AND name = $2
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to find principal '{name}' in model '{model_id}': {error}"
            ))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let parents = sqlx::query_scalar::<_, String>(
            r#"
            SELECT parent_name
            FROM graph_principal_parents
            WHERE model_id = $1 AND principal_name = $2
            ORDER BY parent_name
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to load parents of principal '{name}' in model '{model_id}': {error}"
            ))
        })?;

        row.into_principal(parents).map(Some)
    }

    async fn role_permissions(
        &self,
        model_id: ModelId,
    ) -> AppResult<HashMap<String, Vec<Permission>>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT role_name, permission_name
            FROM graph_role_permissions
            WHERE model_id = $1
            ORDER BY role_name, permission_name
            "#,
        )
        .bind(model_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to load role permissions in model '{model_id}': {error}"
            ))
        })?;

        let mut permissions: HashMap<String, Vec<Permission>> = HashMap::new();
        for (role_name, permission_name) in rows {
            permissions
                .entry(role_name)
                .or_default()
                .push(Permission::new(permission_name)?);
        }

        Ok(permissions)
    }
}

#[async_trait]
impl GraphRepository for PostgresGraphRepository {
    async fn upsert_resource(&self, model_id: ModelId, resource: Resource) -> AppResult<Resource> {
        sqlx::query(
            r#"
            INSERT INTO graph_resources (
                model_id,
                name,
                full_name,
                resource_type,
                parent_name,
                display_name
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (model_id, name)
            DO UPDATE SET
                full_name = EXCLUDED.full_name,
                resource_type = EXCLUDED.resource_type,
                parent_name = EXCLUDED.parent_name,
                display_name = EXCLUDED.display_name
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(resource.name())
        .bind(resource.full_name())
        .bind(resource.resource_type().as_str())
        .bind(resource.parent_name())
        .bind(resource.display_name())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to upsert resource '{}' in model '{model_id}': {error}",
                resource.name()
            ))
        })?;

        Ok(resource)
    }

    async fn find_resource(&self, model_id: ModelId, name: &str) -> AppResult<Option<Resource>> {
        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT name, full_name, resource_type, parent_name, display_name
            FROM graph_resources
            WHERE model_id = $1 AND name = $2
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to find resource '{name}' in model '{model_id}': {error}"
            ))
        })?;

        row.map(Resource::try_from).transpose()
    }

    async fn get_or_create_principal(
        &self,
        model_id: ModelId,
        principal: Principal,
    ) -> AppResult<Principal> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Store(format!(
                "failed to start principal transaction in model '{model_id}': {error}"
            ))
        })?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO graph_principals (model_id, name, principal_type, member_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (model_id, name) DO NOTHING
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(principal.name())
        .bind(principal.principal_type().as_str())
        .bind(principal.member_name())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to create principal '{}' in model '{model_id}': {error}",
                principal.name()
            ))
        })?
        .rows_affected()
            == 1;

        if inserted {
            for parent in principal.parents() {
                sqlx::query(
                    r#"
                    INSERT INTO graph_principal_parents (model_id, principal_name, parent_name)
                    VALUES ($1, $2, $3)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(model_id.as_uuid())
                .bind(principal.name())
                .bind(parent.as_str())
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Store(format!(
                        "failed to link principal '{}' to '{parent}' in model '{model_id}': {error}",
                        principal.name()
                    ))
                })?;
            }
        }

        transaction.commit().await.map_err(|error| {
            AppError::Store(format!(
                "failed to commit principal '{}' in model '{model_id}': {error}",
                principal.name()
            ))
        })?;

        if inserted {
            return Ok(principal);
        }

        self.find_principal(model_id, principal.name())
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "principal '{}' vanished from model '{model_id}'",
                    principal.name()
                ))
            })
    }

    async fn upsert_principal(
        &self,
        model_id: ModelId,
        principal: Principal,
    ) -> AppResult<Principal> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Store(format!(
                "failed to start principal transaction in model '{model_id}': {error}"
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO graph_principals (model_id, name, principal_type, member_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (model_id, name)
            DO UPDATE SET
                principal_type = EXCLUDED.principal_type,
                member_name = EXCLUDED.member_name
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(principal.name())
        .bind(principal.principal_type().as_str())
        .bind(principal.member_name())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to upsert principal '{}' in model '{model_id}': {error}",
                principal.name()
            ))
        })?;

        sqlx::query(
            r#"
            DELETE FROM graph_principal_parents
            WHERE model_id = $1 AND principal_name = $2
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(principal.name())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to clear parents of principal '{}' in model '{model_id}': {error}",
                principal.name()
            ))
        })?;

        for parent in principal.parents() {
            sqlx::query(
                r#"
                INSERT INTO graph_principal_parents (model_id, principal_name, parent_name)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(model_id.as_uuid())
            .bind(principal.name())
            .bind(parent.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Store(format!(
                    "failed to link principal '{}' to '{parent}' in model '{model_id}': {error}",
                    principal.name()
                ))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Store(format!(
                "failed to commit principal '{}' in model '{model_id}': {error}",
                principal.name()
            ))
        })?;

        Ok(principal)
    }

    async fn upsert_permission(&self, model_id: ModelId, permission: &Permission) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO graph_permissions (model_id, name)
            VALUES ($1, $2)
            ON CONFLICT (model_id, name) DO NOTHING
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to upsert permission '{}' in model '{model_id}': {error}",
                permission.as_str()
            ))
        })?;

        Ok(())
    }

    async fn find_role(&self, model_id: ModelId, name: &str) -> AppResult<Option<Role>> {
        let exists = sqlx::query_scalar::<_, String>(
            r#"
            SELECT name
            FROM graph_roles
            WHERE model_id = $1 AND name = $2
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to find role '{name}' in model '{model_id}': {error}"
            ))
        })?;

        let Some(role_name) = exists else {
            return Ok(None);
        };

        let permissions = sqlx::query_scalar::<_, String>(
            r#"
            SELECT permission_name
            FROM graph_role_permissions
            WHERE model_id = $1 AND role_name = $2
            ORDER BY permission_name
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to load permissions of role '{name}' in model '{model_id}': {error}"
            ))
        })?
        .into_iter()
        .map(Permission::new)
        .collect::<AppResult<Vec<_>>>()?;

        Role::new(role_name, permissions).map(Some)
    }

    async fn create_role(&self, model_id: ModelId, role: Role) -> AppResult<Role> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Store(format!(
                "failed to start role transaction in model '{model_id}': {error}"
            ))
        })?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO graph_roles (model_id, name)
            VALUES ($1, $2)
            ON CONFLICT (model_id, name) DO NOTHING
            "#,
        )
        .bind(model_id.as_uuid())
        .bind(role.name())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to create role '{}' in model '{model_id}': {error}",
                role.name()
            ))
        })?
        .rows_affected()
            == 1;

        if inserted {
            for permission in role.permissions() {
                sqlx::query(
                    r#"
                    INSERT INTO graph_permissions (model_id, name)
                    VALUES ($1, $2)
                    ON CONFLICT (model_id, name) DO NOTHING
                    "#,
                )
                .bind(model_id.as_uuid())
                .bind(permission.as_str())
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Store(format!(
                        "failed to upsert permission '{}' in model '{model_id}': {error}",
                        permission.as_str()
                    ))
                })?;

                sqlx::query(
                    r#"
                    INSERT INTO graph_role_permissions (model_id, role_name, permission_name)
                    VALUES ($1, $2, $3)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(model_id.as_uuid())
                .bind(role.name())
                .bind(permission.as_str())
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Store(format!(
                        "failed to grant '{}' to role '{}' in model '{model_id}': {error}",
                        permission.as_str(),
                        role.name()
                    ))
                })?;
            }
        }

        transaction.commit().await.map_err(|error| {
            AppError::Store(format!(
                "failed to commit role '{}' in model '{model_id}': {error}",
                role.name()
            ))
        })?;

        if inserted {
            return Ok(role);
        }

        self.find_role(model_id, role.name()).await?.ok_or_else(|| {
            AppError::Internal(format!(
                "role '{}' vanished from model '{model_id}'",
                role.name()
            ))
        })
    }

    async fn insert_binding(&self, model_id: ModelId, binding: Binding) -> AppResult<String> {
        let binding_id = Uuid::new_v4();
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Store(format!(
                "failed to start binding transaction in model '{model_id}': {error}"
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO graph_bindings (binding_id, model_id, resource_name, role_name)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(binding_id)
        .bind(model_id.as_uuid())
        .bind(binding.resource_name())
        .bind(binding.role_name())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to insert binding of role '{}' on '{}' in model '{model_id}': {error}",
                binding.role_name(),
                binding.resource_name()
            ))
        })?;

        for member in binding.members() {
            sqlx::query(
                r#"
                INSERT INTO graph_binding_members (binding_id, model_id, principal_name)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(binding_id)
            .bind(model_id.as_uuid())
            .bind(member.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Store(format!(
                    "failed to add member '{member}' to binding '{binding_id}': {error}"
                ))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Store(format!(
                "failed to commit binding '{binding_id}' in model '{model_id}': {error}"
            ))
        })?;

        Ok(binding_id.to_string())
    }

    async fn list_resources(&self, model_id: ModelId) -> AppResult<Vec<Resource>> {
        let rows = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT name, full_name, resource_type, parent_name, display_name
            FROM graph_resources
            WHERE model_id = $1
            ORDER BY full_name
            "#,
        )
        .bind(model_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to list resources in model '{model_id}': {error}"
            ))
        })?;

        rows.into_iter().map(Resource::try_from).collect()
    }

    async fn list_principals(&self, model_id: ModelId) -> AppResult<Vec<Principal>> {
        let rows = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT name, principal_type, member_name
            FROM graph_principals
            WHERE model_id = $1
            ORDER BY name
            "#,
        )
        .bind(model_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to list principals in model '{model_id}': {error}"
            ))
        })?;

        let links = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT principal_name, parent_name
            FROM graph_principal_parents
            WHERE model_id = $1
            "#,
        )
        .bind(model_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to list principal parents in model '{model_id}': {error}"
            ))
        })?;

        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        for (principal_name, parent_name) in links {
            parents.entry(principal_name).or_default().push(parent_name);
        }

        rows.into_iter()
            .map(|row| {
                let principal_parents = parents.remove(row.name.as_str()).unwrap_or_default();
                row.into_principal(principal_parents)
            })
            .collect()
    }

    async fn list_roles(&self, model_id: ModelId) -> AppResult<Vec<Role>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT name
            FROM graph_roles
            WHERE model_id = $1
            ORDER BY name
            "#,
        )
        .bind(model_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to list roles in model '{model_id}': {error}"))
        })?;

        let mut permissions = self.role_permissions(model_id).await?;
        names
            .into_iter()
            .map(|name| {
                let role_permissions = permissions.remove(name.as_str()).unwrap_or_default();
                Role::new(name, role_permissions)
            })
            .collect()
    }

    async fn list_bindings(&self, model_id: ModelId) -> AppResult<Vec<Binding>> {
        let rows = sqlx::query_as::<_, BindingRow>(
            r#"
            SELECT binding_id, resource_name, role_name
            FROM graph_bindings
            WHERE model_id = $1
            ORDER BY sequence
            "#,
        )
        .bind(model_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to list bindings in model '{model_id}': {error}"
            ))
        })?;

        let member_rows = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT binding_id, principal_name
            FROM graph_binding_members
            WHERE model_id = $1
            "#,
        )
        .bind(model_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to list binding members in model '{model_id}': {error}"
            ))
        })?;

        let mut members: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (binding_id, principal_name) in member_rows {
            members.entry(binding_id).or_default().push(principal_name);
        }

        rows.into_iter()
            .map(|row| {
                let binding_members = members.remove(&row.binding_id).unwrap_or_default();
                Binding::new(row.resource_name, row.role_name, binding_members)
            })
            .collect()
    }

    async fn graph_counts(&self, model_id: ModelId) -> AppResult<GraphCounts> {
        let row = sqlx::query_as::<_, CountsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM graph_resources WHERE model_id = $1) AS resources,
                (SELECT COUNT(*) FROM graph_principals WHERE model_id = $1) AS principals,
                (SELECT COUNT(*) FROM graph_roles WHERE model_id = $1) AS roles,
                (SELECT COUNT(*) FROM graph_permissions WHERE model_id = $1) AS permissions,
                (SELECT COUNT(*) FROM graph_bindings WHERE model_id = $1) AS bindings
            "#,
        )
        .bind(model_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to count graph entities in model '{model_id}': {error}"
            ))
        })?;

        GraphCounts::try_from(row)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResourceRow {
    name: String,
    full_name: String,
    resource_type: String,
    parent_name: Option<String>,
    display_name: Option<String>,
}

impl TryFrom<ResourceRow> for Resource {
    type Error = AppError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        Resource::from_parts(
            row.name,
            row.full_name,
            ResourceType::parse(row.resource_type.as_str())?,
            row.parent_name,
            row.display_name,
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PrincipalRow {
    name: String,
    principal_type: String,
    member_name: String,
}

impl PrincipalRow {
    fn into_principal(self, parents: Vec<String>) -> AppResult<Principal> {
        let principal_type = self.principal_type.parse::<PrincipalType>()?;
        let principal = Principal::new(principal_type, self.member_name.as_str())?;

        if principal.name() != self.name {
            return Err(AppError::Internal(format!(
                "stored principal '{}' does not match its type and member '{}'",
                self.name,
                principal.name()
            )));
        }

        Ok(principal.with_parent_names(parents))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BindingRow {
    binding_id: Uuid,
    resource_name: String,
    role_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CountsRow {
    resources: i64,
    principals: i64,
    roles: i64,
    permissions: i64,
    bindings: i64,
}

impl TryFrom<CountsRow> for GraphCounts {
    type Error = AppError;

    fn try_from(row: CountsRow) -> Result<Self, Self::Error> {
        let count = |value: i64| {
            usize::try_from(value)
                .map_err(|error| AppError::Internal(format!("invalid entity count {value}: {error}")))
        };

        Ok(Self {
            resources: count(row.resources)?,
            principals: count(row.principals)?,
            roles: count(row.roles)?,
            permissions: count(row.permissions)?,
            bindings: count(row.bindings)?,
        })
    }
}
