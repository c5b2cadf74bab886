//! Resource SDK: declarative REST resource layer over axum and Postgres.
//!
//! A consumer declares each resource (table, columns, filter fields,
//! relationships, hooks), registers it, and mounts the routers. The library
//! handles query-string filtering, sorting, pagination, counted envelopes,
//! CRUD with relationship saves, and streaming XLSX/CSV export.

pub mod case;
pub mod error;
pub mod export;
pub mod filter;
pub mod handlers;
pub mod query;
pub mod resource;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;

pub use case::FieldCase;
pub use error::{ApiError, FieldError, ResourceError};
pub use export::{ColumnType, ExportMode, ExportSpec};
pub use filter::FilterKind;
pub use query::{build_query, parse_request, QueryRequest, RawParams};
pub use resource::{
    ColumnDef, DefaultHooks, PkType, RelationTarget, RelationshipDescriptor, Resource,
    ResourceHooks, ResourceRegistry, SaveStrategy, ValidationRule,
};
pub use response::{entities_response, ResponseEnvelope};
pub use routes::{common_routes, common_routes_with_ready, entity_routes};
pub use service::{EntityRepository, EntitySource, PgEntitySource, RequestValidator};
pub use state::AppState;
