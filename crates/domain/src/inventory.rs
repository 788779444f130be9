use std::fmt::{Display, Formatter};

use iamgraph_core::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::policy::{PolicyDocument, deserialize_policy};
use crate::resource::ResourceType;

/// Record kinds that are recognised but intentionally not imported.
pub const IGNORED_RECORD_KINDS: &[&str] = &["customer"];

/// Record kinds the importer dispatches to a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    /// Organization hierarchy roots.
    Organizations,
    /// Folders.
    Folders,
    /// Projects.
    Projects,
    /// Storage buckets.
    Buckets,
    /// Cloud SQL instances.
    CloudSqlInstances,
    /// IAM policy attached to a resource.
    Policy,
    /// Group definition.
    Group,
    /// Member-to-groups relation.
    Membership,
}

impl RecordKind {
    /// Returns the wire value emitted by the inventory stream.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organizations => "organizations",
            Self::Folders => "folders",
            Self::Projects => "projects",
            Self::Buckets => "buckets",
            Self::CloudSqlInstances => "cloudsqlinstances",
            Self::Policy => "policy",
            Self::Group => "group",
            Self::Membership => "membership",
        }
    }

    /// Parses a handled wire value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "organizations" => Some(Self::Organizations),
            "folders" => Some(Self::Folders),
            "projects" => Some(Self::Projects),
            "buckets" => Some(Self::Buckets),
            "cloudsqlinstances" => Some(Self::CloudSqlInstances),
            "policy" => Some(Self::Policy),
            "group" => Some(Self::Group),
            "membership" => Some(Self::Membership),
            _ => None,
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How the importer treats one wire kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDisposition {
    /// Dispatched to a resolver.
    Handled(RecordKind),
    /// Known and deliberately skipped.
    Ignored,
    /// Not known at all.
    Unknown,
}

/// Classifies a wire kind against the handled and ignored sets.
#[must_use]
pub fn classify_record_kind(kind: &str) -> RecordDisposition {
    if let Some(kind) = RecordKind::parse(kind) {
        return RecordDisposition::Handled(kind);
    }

    if IGNORED_RECORD_KINDS.contains(&kind) {
        return RecordDisposition::Ignored;
    }

    RecordDisposition::Unknown
}

/// Organization payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrganizationRecord {
    /// Numeric organization id.
    #[serde(deserialize_with = "deserialize_identifier")]
    pub org_id: String,
    /// Optional display name.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Folder payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FolderRecord {
    /// Folder id.
    #[serde(deserialize_with = "deserialize_identifier")]
    pub folder_id: String,
    /// Declared parent type.
    pub parent_type: ResourceType,
    /// Declared parent id; empty means the well-known root.
    #[serde(default, deserialize_with = "deserialize_optional_identifier")]
    pub parent_id: Option<String>,
    /// Optional display name.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Project payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectRecord {
    /// Project number, used as the resource id.
    #[serde(deserialize_with = "deserialize_identifier")]
    pub project_number: String,
    /// Human readable project id.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Project display name.
    #[serde(default)]
    pub project_name: Option<String>,
    /// Declared parent type.
    pub parent_type: ResourceType,
    /// Declared parent id; empty means the well-known root.
    #[serde(default, deserialize_with = "deserialize_optional_identifier")]
    pub parent_id: Option<String>,
}

/// Storage bucket payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BucketRecord {
    /// Bucket id.
    #[serde(deserialize_with = "deserialize_identifier")]
    pub bucket_id: String,
    /// Owning project number.
    #[serde(deserialize_with = "deserialize_identifier")]
    pub project_number: String,
}

/// Cloud SQL instance payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CloudSqlInstanceRecord {
    /// Instance name.
    #[serde(deserialize_with = "deserialize_identifier")]
    pub name: String,
    /// Owning project number.
    #[serde(deserialize_with = "deserialize_identifier")]
    pub project_number: String,
}

/// Policy payload attached to a `(type, id)` resource reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyRecord {
    /// Target resource type.
    pub resource_type: ResourceType,
    /// Target resource id.
    #[serde(deserialize_with = "deserialize_identifier")]
    pub resource_id: String,
    /// Parsed policy document.
    #[serde(deserialize_with = "deserialize_policy")]
    pub policy: PolicyDocument,
}

/// Group payload; accepts a bare email string or `{ "group_email": … }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "GroupPayload")]
pub struct GroupRecord {
    /// Group email.
    pub group_email: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupPayload {
    Email(String),
    Record { group_email: String },
}

impl From<GroupPayload> for GroupRecord {
    fn from(value: GroupPayload) -> Self {
        match value {
            GroupPayload::Email(group_email) | GroupPayload::Record { group_email } => {
                Self { group_email }
            }
        }
    }
}

/// Member side of a membership payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemberRecord {
    /// Member type as exported, e.g. `USER` or `GROUP`.
    pub member_type: String,
    /// Member email.
    pub member_email: String,
}

/// Membership payload: one member and every group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MembershipRecord {
    /// The member.
    pub member: MemberRecord,
    /// Direct parent groups.
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
}

/// Typed inventory record decoded from a `(kind, payload)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryRecord {
    /// Organization record.
    Organization(OrganizationRecord),
    /// Folder record.
    Folder(FolderRecord),
    /// Project record.
    Project(ProjectRecord),
    /// Bucket record.
    Bucket(BucketRecord),
    /// Cloud SQL instance record.
    CloudSqlInstance(CloudSqlInstanceRecord),
    /// Policy record.
    Policy(PolicyRecord),
    /// Group record.
    Group(GroupRecord),
    /// Membership record.
    Membership(MembershipRecord),
}

impl InventoryRecord {
    /// Decodes a payload for a handled kind.
    pub fn decode(kind: RecordKind, payload: Value) -> AppResult<Self> {
        Ok(match kind {
            RecordKind::Organizations => Self::Organization(decode_payload(kind, payload)?),
            RecordKind::Folders => Self::Folder(decode_payload(kind, payload)?),
            RecordKind::Projects => Self::Project(decode_payload(kind, payload)?),
            RecordKind::Buckets => Self::Bucket(decode_payload(kind, payload)?),
            RecordKind::CloudSqlInstances => Self::CloudSqlInstance(decode_payload(kind, payload)?),
            RecordKind::Policy => Self::Policy(decode_payload(kind, payload)?),
            RecordKind::Group => Self::Group(decode_payload(kind, payload)?),
            RecordKind::Membership => Self::Membership(decode_payload(kind, payload)?),
        })
    }
}

fn decode_payload<T: DeserializeOwned>(kind: RecordKind, payload: Value) -> AppResult<T> {
    serde_json::from_value(payload).map_err(|error| {
        AppError::Validation(format!("malformed '{kind}' record payload: {error}"))
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
    Text(String),
    Number(u64),
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        match value {
            Identifier::Text(text) => text.trim().to_owned(),
            Identifier::Number(number) => number.to_string(),
        }
    }
}

fn deserialize_identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::from(Identifier::deserialize(deserializer)?);
    if value.is_empty() {
        return Err(serde::de::Error::custom("identifier must not be empty"));
    }

    Ok(value)
}

fn deserialize_optional_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Identifier>::deserialize(deserializer)?
        .map(String::from)
        .filter(|value| !value.is_empty()))
}
