use iamgraph_core::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::principal::MemberRef;

/// IAM policy attached to one resource.
///
/// Fields other than `bindings` (`etag`, `version`, audit configs) are
/// accepted and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Bindings in document order.
    pub bindings: Vec<BindingSpec>,
}

/// One `role -> members` entry of a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSpec {
    /// Role name, e.g. `roles/viewer`.
    pub role: String,
    /// Member strings of the form `type:name`.
    pub members: Vec<String>,
}

impl PolicyDocument {
    /// Decodes a policy from a JSON object or a JSON-encoded string.
    pub fn from_value(value: Value) -> AppResult<Self> {
        let document: Self = match value {
            Value::String(encoded) => serde_json::from_str(encoded.as_str()),
            other => serde_json::from_value(other),
        }
        .map_err(|error| AppError::Validation(format!("malformed policy document: {error}")))?;

        document.validate()?;
        Ok(document)
    }

    fn validate(&self) -> AppResult<()> {
        for (index, binding) in self.bindings.iter().enumerate() {
            if binding.role.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "policy binding #{index} has an empty role"
                )));
            }
        }

        Ok(())
    }
}

impl BindingSpec {
    /// Parses every member string of this binding.
    pub fn member_refs(&self) -> AppResult<Vec<MemberRef>> {
        self.members
            .iter()
            .map(|member| MemberRef::parse(member.as_str()))
            .collect()
    }
}

/// Serde adapter for payload fields carrying a policy document.
pub(crate) fn deserialize_policy<'de, D>(deserializer: D) -> Result<PolicyDocument, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    PolicyDocument::from_value(value).map_err(serde::de::Error::custom)
}
