//! Application services and ports for importing authorization graphs.

#![forbid(unsafe_code)]

mod import_ports;
mod import_service;

pub use import_ports::{
    DEFAULT_HEARTBEAT_INTERVAL, GraphCounts, GraphRepository, ImportSettings, ImportSource,
    ModelRepository, PermissionSource, RawRecord, RecordSource, UnknownRecordKindPolicy,
};
pub use import_service::{
    ImportCoordinator, ImportRequest, ImportService, ImportSummary, PolicyBindingResolver,
    PrincipalResolver, ResourceResolver,
};
