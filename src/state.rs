//! Shared application state for all routes.

use crate::resource::ResourceRegistry;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Registered resources, fixed at startup.
    pub registry: Arc<ResourceRegistry>,
}

impl AppState {
    pub fn new(pool: PgPool, registry: ResourceRegistry) -> Self {
        AppState {
            pool,
            registry: Arc::new(registry),
        }
    }
}
