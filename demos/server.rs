//! Demo server: registers two resources against an existing database and
//! mounts the common and resource routes under /api/v1.

use axum::Router;
use resource_sdk::{
    common_routes_with_ready, entity_routes, AppState, ColumnDef, ColumnType, DefaultHooks,
    ExportSpec, FieldCase, FilterKind, PkType, RelationTarget, RelationshipDescriptor, Resource,
    ResourceHooks, ResourceRegistry, SaveStrategy, ValidationRule,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

struct OrderHooks;

#[async_trait::async_trait]
impl ResourceHooks for OrderHooks {
    fn export_spec(&self, _resource: &Resource) -> ExportSpec {
        let mut spec = ExportSpec::new(vec![vec![
            "ID".into(),
            "Status".into(),
            "Total".into(),
            "Created".into(),
        ]]);
        spec.auto_width = true;
        spec.column_types = vec![(3, ColumnType::Date)];
        spec
    }

    fn export_row(&self, _resource: &Resource, entity: &serde_json::Value) -> Option<Vec<serde_json::Value>> {
        Some(vec![
            entity.get("id").cloned()?,
            entity.get("status").cloned()?,
            entity.get("total").cloned()?,
            entity.get("created_at").cloned()?,
        ])
    }
}

fn orders() -> Resource {
    let mut r = Resource::new("Order", "orders", "orders");
    r.pk_type = PkType::BigInt;
    r.field_case = Some(FieldCase::Snake);
    r.columns = vec![
        ColumnDef::new("id").with_default(),
        ColumnDef::new("status"),
        ColumnDef::typed("total", "numeric"),
        ColumnDef::typed("paid", "boolean"),
        ColumnDef::typed("created_at", "timestamptz").with_default(),
    ];
    r.filter_fields = vec![
        ("status".into(), FilterKind::Select),
        ("paid".into(), FilterKind::Bool),
        ("total".into(), FilterKind::NumRange),
        ("created_at".into(), FilterKind::DateRange),
    ];
    r.relationships = vec![RelationshipDescriptor {
        attribute: "items".into(),
        relation: RelationTarget {
            table: "order_items".into(),
            fk_column: "order_id".into(),
            pk_column: "id".into(),
        },
        strategy: SaveStrategy::Create,
        clear_before_saving: true,
    }];
    r.validation.insert(
        "status".into(),
        ValidationRule {
            required: true,
            allowed: Some(vec!["open".into(), "paid".into(), "cancelled".into()]),
            ..Default::default()
        },
    );
    r
}

fn products() -> Resource {
    let mut r = Resource::new("Product", "products", "products");
    r.pk_type = PkType::Uuid;
    r.columns = vec![
        ColumnDef::typed("id", "uuid").with_default(),
        ColumnDef::new("name"),
        ColumnDef::new("description"),
        ColumnDef::typed("active", "boolean"),
    ];
    r.filter_fields = vec![
        ("name".into(), FilterKind::Text),
        ("active".into(), FilterKind::Bool),
    ];
    r.validation.insert(
        "name".into(),
        ValidationRule {
            required: true,
            min_length: Some(2),
            max_length: Some(120),
            ..Default::default()
        },
    );
    r
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("resource_sdk=debug".parse()?))
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/resource_demo".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let mut registry = ResourceRegistry::new();
    registry.register(orders(), Arc::new(OrderHooks))?;
    registry.register(products(), Arc::new(DefaultHooks))?;

    let state = AppState::new(pool, registry);
    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api/v1", entity_routes(state))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)));

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
