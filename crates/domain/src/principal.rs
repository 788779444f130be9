use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use iamgraph_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

const PUBLIC_MEMBERS: &[&str] = &["allUsers", "allAuthenticatedUsers"];

/// Principal categories found in memberships and policy members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrincipalType {
    /// Individual user account.
    User,
    /// Group of principals.
    Group,
    /// Workload identity.
    ServiceAccount,
    /// Every identity of one domain.
    Domain,
    /// Public pseudo-members such as `allUsers`.
    Special,
    /// Any other member prefix, kept verbatim (`projectOwner`, `deleted`, `customer`).
    Other(String),
}

impl PrincipalType {
    /// Returns a stable storage value for this principal type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::ServiceAccount => "serviceAccount",
            Self::Domain => "domain",
            Self::Special => "special",
            Self::Other(value) => value.as_str(),
        }
    }
}

impl FromStr for PrincipalType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        match value.to_ascii_lowercase().as_str() {
            "" => Err(AppError::Validation(
                "principal type must not be empty".to_owned(),
            )),
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            "serviceaccount" | "service_account" => Ok(Self::ServiceAccount),
            "domain" => Ok(Self::Domain),
            "special" => Ok(Self::Special),
            _ => Ok(Self::Other(value.to_owned())),
        }
    }
}

impl Display for PrincipalType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Parsed `type:name` policy member reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    principal_type: PrincipalType,
    member_name: NonEmptyString,
}

impl MemberRef {
    /// Parses a policy member string, splitting on the first `:`.
    pub fn parse(value: &str) -> AppResult<Self> {
        let value = value.trim();
        if PUBLIC_MEMBERS.contains(&value) {
            return Ok(Self {
                principal_type: PrincipalType::Special,
                member_name: NonEmptyString::new(value)?,
            });
        }

        let (principal_type, member_name) = value.split_once(':').ok_or_else(|| {
            AppError::Validation(format!(
                "policy member '{value}' must have the form 'type:name'"
            ))
        })?;
        let member_name = NonEmptyString::new(member_name).map_err(|_| {
            AppError::Validation(format!("policy member '{value}' has an empty name"))
        })?;

        Ok(Self {
            principal_type: PrincipalType::from_str(principal_type)?,
            member_name,
        })
    }

    /// Returns the principal type.
    #[must_use]
    pub fn principal_type(&self) -> &PrincipalType {
        &self.principal_type
    }

    /// Returns the member identifier.
    #[must_use]
    pub fn member_name(&self) -> &str {
        self.member_name.as_str()
    }

    /// Builds a parentless principal for this member.
    pub fn to_principal(&self) -> AppResult<Principal> {
        Principal::new(self.principal_type.clone(), self.member_name.as_str())
    }
}

/// Returns the `type/identifier` name used as a principal's unique key.
#[must_use]
pub fn principal_name(principal_type: &PrincipalType, member_name: &str) -> String {
    format!("{principal_type}/{member_name}")
}

/// User, group or service identity in the membership graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    name: String,
    principal_type: PrincipalType,
    member_name: String,
    parents: BTreeSet<String>,
}

impl Principal {
    /// Creates a principal without parent groups.
    pub fn new(principal_type: PrincipalType, member_name: &str) -> AppResult<Self> {
        let member_name = NonEmptyString::new(member_name.trim()).map_err(|_| {
            AppError::Validation(format!("{principal_type} principal name must not be empty"))
        })?;

        Ok(Self {
            name: principal_name(&principal_type, member_name.as_str()),
            principal_type,
            member_name: member_name.into(),
            parents: BTreeSet::new(),
        })
    }

    /// Replaces the parent group set with the given groups.
    #[must_use]
    pub fn with_parents<'a>(mut self, groups: impl IntoIterator<Item = &'a Principal>) -> Self {
        self.parents = groups
            .into_iter()
            .map(|group| group.name.clone())
            .collect();
        self
    }

    /// Replaces the parent group set with raw principal names.
    #[must_use]
    pub fn with_parent_names(mut self, parents: impl IntoIterator<Item = String>) -> Self {
        self.parents = parents.into_iter().collect();
        self
    }

    /// Returns the unique `type/identifier` name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the principal type.
    #[must_use]
    pub fn principal_type(&self) -> &PrincipalType {
        &self.principal_type
    }

    /// Returns the bare identifier, e.g. an email address.
    #[must_use]
    pub fn member_name(&self) -> &str {
        self.member_name.as_str()
    }

    /// Returns the names of direct parent groups.
    #[must_use]
    pub fn parents(&self) -> &BTreeSet<String> {
        &self.parents
    }
}
