//! Data-layer services: entity source, repository, body validation.

pub mod repository;
pub mod source;
pub mod validation;

pub use repository::EntityRepository;
pub use source::{EntitySource, PgEntitySource};
pub use validation::RequestValidator;
