//! Untrusted request parameters -> bounded, parameterized SQL.

pub mod builder;
pub mod params;
pub mod request;

pub use builder::{build_query, BoundedQuery};
pub use params::PgBindValue;
pub use request::{parse_id, parse_request, QueryRequest, RawParams};
