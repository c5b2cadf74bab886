//! Static resource descriptors and the registry routing path segments to them.
//!
//! A `Resource` is declared once at startup; registration is fail-fast so a
//! bad declaration (unknown pk, filter field without a backing column,
//! duplicate path segment) aborts before any route is served.

use crate::case::FieldCase;
use crate::error::{ApiError, ResourceError};
use crate::export::ExportSpec;
use crate::filter::FilterKind;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Primary key type for parsing path ids.
#[derive(Clone, Debug)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnDef {
    pub name: String,
    /// PostgreSQL type name for SQL casts (e.g. "timestamptz") when binding string values.
    pub pg_type: Option<String>,
    pub has_default: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            pg_type: None,
            has_default: false,
        }
    }

    pub fn typed(name: impl Into<String>, pg_type: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            pg_type: Some(pg_type.into()),
            has_default: false,
        }
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// How a declared relationship attribute is persisted on create/update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveStrategy {
    /// Insert the payload rows into the child table with the fk set to the parent.
    Create,
    /// Point existing child rows (by id) at the parent.
    Attach,
    /// Clear the current set, then attach.
    Sync,
}

/// Child side of a relationship: which table holds the fk back to the parent.
#[derive(Clone, Debug)]
pub struct RelationTarget {
    pub table: String,
    pub fk_column: String,
    pub pk_column: String,
}

/// Maps a nested attribute in a create/update payload onto a related collection.
#[derive(Clone, Debug)]
pub struct RelationshipDescriptor {
    /// Payload attribute carrying the relationship data.
    pub attribute: String,
    pub relation: RelationTarget,
    pub strategy: SaveStrategy,
    pub clear_before_saving: bool,
}

/// Per-field validation rule for create/update bodies.
#[derive(Clone, Debug, Default)]
pub struct ValidationRule {
    pub required: bool,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub pattern: Option<String>,
    pub allowed: Option<Vec<Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct Resource {
    /// Human name used in export filenames and messages (e.g. "Product").
    pub name: String,
    /// URL segment (e.g. "products").
    pub path_segment: String,
    pub schema: String,
    pub table: String,
    pub pk_column: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnDef>,
    /// Declaration order is predicate application order.
    pub filter_fields: Vec<(String, FilterKind)>,
    /// Naming convention of backing columns, applied to client sort fields.
    pub field_case: Option<FieldCase>,
    /// Fetch-by column for show/update/delete; pk when None.
    pub get_by_field: Option<String>,
    pub relationships: Vec<RelationshipDescriptor>,
    pub validation: HashMap<String, ValidationRule>,
}

impl Resource {
    pub fn new(name: impl Into<String>, path_segment: impl Into<String>, table: impl Into<String>) -> Self {
        Resource {
            name: name.into(),
            path_segment: path_segment.into(),
            schema: "public".into(),
            table: table.into(),
            pk_column: "id".into(),
            pk_type: PkType::BigInt,
            columns: Vec::new(),
            filter_fields: Vec::new(),
            field_case: None,
            get_by_field: None,
            relationships: Vec::new(),
            validation: HashMap::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Attributes that carry relationship payloads rather than plain columns.
    pub fn relationship_attributes(&self) -> Vec<&str> {
        self.relationships.iter().map(|r| r.attribute.as_str()).collect()
    }

    fn check(&self) -> Result<(), ResourceError> {
        if !self.has_column(&self.pk_column) {
            return Err(ResourceError::UnknownPrimaryKey {
                resource: self.name.clone(),
                column: self.pk_column.clone(),
            });
        }
        for (field, _) in &self.filter_fields {
            if !self.has_column(field) {
                return Err(ResourceError::UnknownFilterField {
                    resource: self.name.clone(),
                    field: field.clone(),
                });
            }
        }
        for r in &self.relationships {
            if self.has_column(&r.attribute) {
                return Err(ResourceError::RelationshipAttributeCollision {
                    resource: self.name.clone(),
                    attribute: r.attribute.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Per-resource behavior hooks. All methods default to no-ops so a plain
/// resource needs no implementation beyond `DefaultHooks`.
#[async_trait]
pub trait ResourceHooks: Send + Sync {
    /// Maps each entity in list responses.
    fn map_entity(&self, entity: Value) -> Value {
        entity
    }

    /// Maps the single entity in create/update/delete responses.
    fn map_single_entity(&self, entity: Value) -> Value {
        entity
    }

    /// Runs before the create transaction; may rewrite attributes or reject.
    async fn pre_create(&self, _attributes: &mut Map<String, Value>) -> Result<(), ApiError> {
        Ok(())
    }

    /// Runs inside the create transaction, after the entity exists.
    async fn post_create(&self, _entity: &Value) -> Result<(), ApiError> {
        Ok(())
    }

    async fn pre_update(
        &self,
        _attributes: &mut Map<String, Value>,
        _current: &Value,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn post_update(&self, _entity: &Value) -> Result<(), ApiError> {
        Ok(())
    }

    /// Gate for show/update/delete once the entity is loaded.
    async fn entity_access(&self, _entity: &Value) -> Result<(), ApiError> {
        Ok(())
    }

    /// Additional gate for update/delete.
    async fn entity_update_access(&self, _entity: &Value) -> Result<(), ApiError> {
        Ok(())
    }

    /// Sheet layout for export.
    fn export_spec(&self, resource: &Resource) -> ExportSpec {
        ExportSpec::new(vec![resource.columns.iter().map(|c| c.name.clone()).collect()])
    }

    /// Maps one entity to a spreadsheet row. `None` skips the row.
    fn export_row(&self, resource: &Resource, entity: &Value) -> Option<Vec<Value>> {
        let obj = entity.as_object()?;
        Some(
            resource
                .columns
                .iter()
                .map(|c| obj.get(&c.name).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }
}

/// Hooks for resources with no custom behavior.
pub struct DefaultHooks;

#[async_trait]
impl ResourceHooks for DefaultHooks {}

#[derive(Clone)]
pub struct RegisteredResource {
    pub def: Arc<Resource>,
    pub hooks: Arc<dyn ResourceHooks>,
}

/// All registered resources, keyed by path segment.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    by_path: HashMap<String, RegisteredResource>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        resource: Resource,
        hooks: Arc<dyn ResourceHooks>,
    ) -> Result<(), ResourceError> {
        resource.check()?;
        let segment = resource.path_segment.clone();
        if self.by_path.contains_key(&segment) {
            return Err(ResourceError::DuplicatePathSegment(segment));
        }
        self.by_path.insert(
            segment,
            RegisteredResource {
                def: Arc::new(resource),
                hooks,
            },
        );
        Ok(())
    }

    pub fn by_path(&self, path: &str) -> Option<&RegisteredResource> {
        self.by_path.get(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Registered path segments, sorted for stable reporting.
    pub fn path_segments(&self) -> Vec<&str> {
        let mut segments: Vec<&str> = self.by_path.keys().map(String::as_str).collect();
        segments.sort_unstable();
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Resource {
        let mut r = Resource::new("Product", "products", "products");
        r.columns = vec![
            ColumnDef::new("id").with_default(),
            ColumnDef::new("name"),
            ColumnDef::typed("created_at", "timestamptz").with_default(),
        ];
        r
    }

    #[test]
    fn registers_valid_resource() {
        let mut reg = ResourceRegistry::new();
        reg.register(product(), Arc::new(DefaultHooks)).unwrap();
        assert!(reg.by_path("products").is_some());
    }

    #[test]
    fn rejects_unknown_pk() {
        let mut r = product();
        r.pk_column = "uid".into();
        let mut reg = ResourceRegistry::new();
        let err = reg.register(r, Arc::new(DefaultHooks)).unwrap_err();
        assert!(matches!(err, ResourceError::UnknownPrimaryKey { .. }));
    }

    #[test]
    fn rejects_filter_field_without_column() {
        let mut r = product();
        r.filter_fields = vec![("status".into(), FilterKind::Select)];
        let mut reg = ResourceRegistry::new();
        let err = reg.register(r, Arc::new(DefaultHooks)).unwrap_err();
        assert!(matches!(err, ResourceError::UnknownFilterField { .. }));
    }

    #[test]
    fn reports_registered_segments() {
        let mut reg = ResourceRegistry::new();
        assert!(reg.is_empty());
        reg.register(product(), Arc::new(DefaultHooks)).unwrap();
        let mut order = Resource::new("Order", "orders", "orders");
        order.columns = vec![ColumnDef::new("id").with_default()];
        reg.register(order, Arc::new(DefaultHooks)).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.path_segments(), vec!["orders", "products"]);
    }

    #[test]
    fn rejects_duplicate_path_segment() {
        let mut reg = ResourceRegistry::new();
        reg.register(product(), Arc::new(DefaultHooks)).unwrap();
        let err = reg.register(product(), Arc::new(DefaultHooks)).unwrap_err();
        assert!(matches!(err, ResourceError::DuplicatePathSegment(_)));
    }
}
