//! Domain entities and invariants of the authorization graph.

#![forbid(unsafe_code)]

mod access;
mod inventory;
mod model;
mod policy;
mod principal;
mod resource;

pub use access::{Binding, Permission, Role};
pub use inventory::{
    BucketRecord, CloudSqlInstanceRecord, FolderRecord, GroupRecord, IGNORED_RECORD_KINDS,
    InventoryRecord, MemberRecord, MembershipRecord, OrganizationRecord, PolicyRecord,
    ProjectRecord, RecordDisposition, RecordKind, classify_record_kind,
};
pub use model::{Model, ModelStatus};
pub use policy::{BindingSpec, PolicyDocument};
pub use principal::{MemberRef, Principal, PrincipalType, principal_name};
pub use resource::{Resource, ResourceKey, ResourceType};
