//! Example consumer: a separate Rust project that uses resource-sdk as a
//! dependency.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

use resource_sdk::{
    common_routes_with_ready, entity_routes, AppState, ColumnDef, DefaultHooks, FilterKind,
    Resource, ResourceRegistry,
};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_sdk=info")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/resource_demo".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let mut notes = Resource::new("Note", "notes", "notes");
    notes.columns = vec![
        ColumnDef::new("id").with_default(),
        ColumnDef::new("title"),
        ColumnDef::new("body"),
        ColumnDef::typed("created_at", "timestamptz").with_default(),
    ];
    notes.filter_fields = vec![
        ("title".into(), FilterKind::Text),
        ("created_at".into(), FilterKind::DateRange),
    ];

    let mut registry = ResourceRegistry::new();
    registry.register(notes, Arc::new(DefaultHooks))?;

    let state = AppState::new(pool, registry);
    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api/v1", entity_routes(state));

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
