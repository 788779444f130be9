use std::fmt::{Display, Formatter};
use std::str::FromStr;

use iamgraph_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Resource kinds tracked in the resource hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Hierarchy root.
    Organization,
    /// Folder below an organization or another folder.
    Folder,
    /// Project below an organization or folder.
    Project,
    /// Storage bucket owned by a project.
    Bucket,
    /// Cloud SQL instance owned by a project.
    CloudSqlInstance,
}

impl ResourceType {
    /// Returns a stable storage value for this resource type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Folder => "folder",
            Self::Project => "project",
            Self::Bucket => "bucket",
            Self::CloudSqlInstance => "cloudsqlinstance",
        }
    }

    /// Parses a storage value into a resource type.
    pub fn parse(value: &str) -> AppResult<Self> {
        Self::from_str(value)
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "organization" => Ok(Self::Organization),
            "folder" => Ok(Self::Folder),
            "project" => Ok(Self::Project),
            "bucket" => Ok(Self::Bucket),
            "cloudsqlinstance" => Ok(Self::CloudSqlInstance),
            _ => Err(AppError::Validation(format!(
                "unknown resource type '{value}'"
            ))),
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Composite `(type, id)` key naming one resource inside a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    resource_type: ResourceType,
    id: NonEmptyString,
}

impl ResourceKey {
    /// Creates a validated resource key.
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> AppResult<Self> {
        let id = NonEmptyString::new(id).map_err(|_| {
            AppError::Validation(format!("{resource_type} id must not be empty"))
        })?;

        Ok(Self { resource_type, id })
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Returns the local `type/id` name.
    #[must_use]
    pub fn local_name(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

impl Display for ResourceKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}/{}", self.resource_type, self.id)
    }
}

/// One node of the resource hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    name: String,
    full_name: String,
    resource_type: ResourceType,
    parent_name: Option<String>,
    display_name: Option<String>,
}

impl Resource {
    /// Creates a hierarchy root whose full name equals its local name.
    #[must_use]
    pub fn root(key: &ResourceKey, display_name: Option<String>) -> Self {
        let name = key.local_name();
        Self {
            full_name: name.clone(),
            name,
            resource_type: key.resource_type(),
            parent_name: None,
            display_name: normalize_display_name(display_name),
        }
    }

    /// Creates a child resource below an already resolved parent.
    #[must_use]
    pub fn child(parent: &Resource, key: &ResourceKey, display_name: Option<String>) -> Self {
        let name = key.local_name();
        Self {
            full_name: format!("{}/{}", parent.full_name, name),
            name,
            resource_type: key.resource_type(),
            parent_name: Some(parent.name.clone()),
            display_name: normalize_display_name(display_name),
        }
    }

    /// Rebuilds a resource from persisted columns.
    pub fn from_parts(
        name: impl Into<String>,
        full_name: impl Into<String>,
        resource_type: ResourceType,
        parent_name: Option<String>,
        display_name: Option<String>,
    ) -> AppResult<Self> {
        let name = NonEmptyString::new(name)?;
        let full_name = NonEmptyString::new(full_name)?;

        Ok(Self {
            name: name.into(),
            full_name: full_name.into(),
            resource_type,
            parent_name,
            display_name,
        })
    }

    /// Returns the local `type/id` name, unique within a model.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the full hierarchical name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.full_name.as_str()
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Returns the parent's local name, if any.
    #[must_use]
    pub fn parent_name(&self) -> Option<&str> {
        self.parent_name.as_deref()
    }

    /// Returns the optional display name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

fn normalize_display_name(display_name: Option<String>) -> Option<String> {
    display_name
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
