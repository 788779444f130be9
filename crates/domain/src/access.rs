use std::collections::BTreeSet;

use iamgraph_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Atomic named capability, e.g. `storage.buckets.get`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission(NonEmptyString);

impl Permission {
    /// Creates a validated permission.
    pub fn new(name: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(name)
            .map(Self)
            .map_err(|_| AppError::Validation("permission name must not be empty".to_owned()))
    }

    /// Returns the permission name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    name: NonEmptyString,
    permissions: BTreeSet<Permission>,
}

impl Role {
    /// Creates a role with its permission set.
    pub fn new(
        name: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> AppResult<Self> {
        let name = NonEmptyString::new(name)
            .map_err(|_| AppError::Validation("role name must not be empty".to_owned()))?;

        Ok(Self {
            name,
            permissions: permissions.into_iter().collect(),
        })
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the role's permissions.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }
}

/// Grant of one role to a set of principals on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    resource_name: String,
    role_name: String,
    members: BTreeSet<String>,
}

impl Binding {
    /// Creates a binding from resolved entity names.
    pub fn new(
        resource_name: impl Into<String>,
        role_name: impl Into<String>,
        members: impl IntoIterator<Item = String>,
    ) -> AppResult<Self> {
        let resource_name = NonEmptyString::new(resource_name)?;
        let role_name = NonEmptyString::new(role_name)?;

        Ok(Self {
            resource_name: resource_name.into(),
            role_name: role_name.into(),
            members: members.into_iter().collect(),
        })
    }

    /// Returns the bound resource's local name.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        self.resource_name.as_str()
    }

    /// Returns the bound role name.
    #[must_use]
    pub fn role_name(&self) -> &str {
        self.role_name.as_str()
    }

    /// Returns the names of bound principals.
    #[must_use]
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }
}
