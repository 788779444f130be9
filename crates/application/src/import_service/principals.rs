use std::str::FromStr;
use std::sync::Arc;

use iamgraph_core::{AppResult, ModelId};
use iamgraph_domain::{GroupRecord, MembershipRecord, Principal, PrincipalType};

use crate::import_ports::GraphRepository;

/// Resolves group and membership records into persisted principals.
pub struct PrincipalResolver {
    model_id: ModelId,
    graph_repository: Arc<dyn GraphRepository>,
}

impl PrincipalResolver {
    /// Creates a resolver for one run.
    #[must_use]
    pub fn new(model_id: ModelId, graph_repository: Arc<dyn GraphRepository>) -> Self {
        Self {
            model_id,
            graph_repository,
        }
    }

    /// Ensures a group principal exists. An already known group keeps its parents.
    pub async fn resolve_group(&self, record: &GroupRecord) -> AppResult<Principal> {
        let group = Principal::new(PrincipalType::Group, record.group_email.as_str())?;
        self.graph_repository
            .get_or_create_principal(self.model_id, group)
            .await
    }

    /// Ensures every group exists, then stores the member with exactly those parents.
    pub async fn resolve_membership(&self, record: &MembershipRecord) -> AppResult<Principal> {
        let mut groups = Vec::with_capacity(record.groups.len());
        for group in &record.groups {
            groups.push(self.resolve_group(group).await?);
        }

        let member_type =
            PrincipalType::from_str(record.member.member_type.to_ascii_lowercase().as_str())?;
        let member = Principal::new(member_type, record.member.member_email.as_str())?
            .with_parents(groups.iter());

        self.graph_repository
            .upsert_principal(self.model_id, member)
            .await
    }
}
