mod permissions;
mod repository;
mod settings;
mod source;

pub use permissions::PermissionSource;
pub use repository::{GraphCounts, GraphRepository, ModelRepository};
pub use settings::{
    DEFAULT_HEARTBEAT_INTERVAL, ImportSettings, ImportSource, UnknownRecordKindPolicy,
};
pub use source::{RawRecord, RecordSource};
