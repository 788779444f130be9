//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_graph_store;
mod in_memory_record_source;
mod json_lines_record_source;
mod postgres_graph_repository;
mod postgres_model_repository;
mod static_permission_source;

pub use in_memory_graph_store::InMemoryGraphStore;
pub use in_memory_record_source::InMemoryRecordSource;
pub use json_lines_record_source::JsonLinesRecordSource;
pub use postgres_graph_repository::PostgresGraphRepository;
pub use postgres_model_repository::PostgresModelRepository;
pub use static_permission_source::StaticPermissionSource;
