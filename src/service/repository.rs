//! CRUD over a single resource, including declared sub-relationship saves.
//!
//! Mutations take a `&mut PgConnection` so the caller owns the transaction:
//! begin before the plain-field write, commit only after every relationship
//! write succeeded, roll back on any error. The repository itself never
//! begins or commits.

use crate::error::ApiError;
use crate::query::builder::{placeholder, qualified_table, quoted, select_column_list};
use crate::query::params::PgBindValue;
use crate::resource::{RelationshipDescriptor, Resource, SaveStrategy};
use crate::service::source::row_to_json;
use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool};

fn table(resource: &Resource) -> String {
    qualified_table(&resource.schema, &resource.table)
}

pub struct EntityRepository;

impl EntityRepository {
    /// Fetch one entity by primary key, or by `by_field` when given.
    pub async fn get(
        pool: &PgPool,
        resource: &Resource,
        id: &Value,
        by_field: Option<&str>,
    ) -> Result<Value, ApiError> {
        let field = by_field.unwrap_or(&resource.pk_column);
        let cast = resource.column(field).and_then(|c| c.pg_type.as_deref());
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            select_column_list(resource),
            table(resource),
            quoted(field),
            placeholder(1, cast)
        );
        tracing::debug!(sql = %sql, "get");
        let row = sqlx::query(&sql)
            .bind(PgBindValue::from_json(id))
            .fetch_optional(pool)
            .await?;
        row.map(|r| row_to_json(&r))
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", resource.name, id)))
    }

    /// Insert the plain attributes, then apply each declared relationship.
    pub async fn create(
        tx: &mut PgConnection,
        resource: &Resource,
        attributes: &Map<String, Value>,
    ) -> Result<Value, ApiError> {
        let plain = plain_attributes(resource, attributes);
        let mut params: Vec<PgBindValue> = Vec::new();
        let mut cols = Vec::new();
        let mut placeholders = Vec::new();
        for c in &resource.columns {
            let val = plain.get(&c.name);
            if val.is_none() && (c.name == resource.pk_column || c.has_default) {
                continue;
            }
            params.push(val.map(PgBindValue::from_json).unwrap_or(PgBindValue::Null));
            placeholders.push(placeholder(params.len(), c.pg_type.as_deref()));
            cols.push(quoted(&c.name));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table(resource),
            cols.join(", "),
            placeholders.join(", "),
            select_column_list(resource)
        );
        let mut entity = execute_returning_one(tx, &sql, &params)
            .await?
            .ok_or(ApiError::Db(sqlx::Error::RowNotFound))?;

        Self::apply_relationships(tx, resource, &mut entity, attributes).await?;
        Ok(entity)
    }

    /// Update the plain attributes of an already-fetched entity, then apply
    /// each declared relationship present in the payload.
    pub async fn update(
        tx: &mut PgConnection,
        resource: &Resource,
        current: &Value,
        attributes: &Map<String, Value>,
    ) -> Result<Value, ApiError> {
        let id = current
            .get(&resource.pk_column)
            .cloned()
            .ok_or_else(|| ApiError::BusinessRule("entity should exist".into()))?;

        let plain = plain_attributes(resource, attributes);
        let mut params: Vec<PgBindValue> = Vec::new();
        let mut sets = Vec::new();
        for c in &resource.columns {
            if c.name == resource.pk_column {
                continue;
            }
            let Some(v) = plain.get(&c.name) else { continue };
            params.push(PgBindValue::from_json(v));
            sets.push(format!(
                "{} = {}",
                quoted(&c.name),
                placeholder(params.len(), c.pg_type.as_deref())
            ));
        }
        if resource.has_column("updated_at") {
            sets.push(format!("{} = NOW()", quoted("updated_at")));
        }

        let mut entity = if sets.is_empty() {
            current.clone()
        } else {
            let pk_cast = resource
                .column(&resource.pk_column)
                .and_then(|c| c.pg_type.as_deref());
            params.push(PgBindValue::from_json(&id));
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
                table(resource),
                sets.join(", "),
                quoted(&resource.pk_column),
                placeholder(params.len(), pk_cast),
                select_column_list(resource)
            );
            execute_returning_one(tx, &sql, &params)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("{} {}", resource.name, id)))?
        };

        Self::apply_relationships(tx, resource, &mut entity, attributes).await?;
        Ok(entity)
    }

    /// Delete by primary key; returns the deleted row.
    pub async fn delete(
        tx: &mut PgConnection,
        resource: &Resource,
        id: &Value,
    ) -> Result<Value, ApiError> {
        let pk_cast = resource
            .column(&resource.pk_column)
            .and_then(|c| c.pg_type.as_deref());
        let sql = format!(
            "DELETE FROM {} WHERE {} = {} RETURNING {}",
            table(resource),
            quoted(&resource.pk_column),
            placeholder(1, pk_cast),
            select_column_list(resource)
        );
        let params = vec![PgBindValue::from_json(id)];
        execute_returning_one(tx, &sql, &params)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", resource.name, id)))
    }

    /// Apply every declared relationship whose attribute is present in the
    /// payload: optional clear, then the save strategy, then refresh the
    /// relation into the entity JSON under the attribute name.
    async fn apply_relationships(
        tx: &mut PgConnection,
        resource: &Resource,
        entity: &mut Value,
        attributes: &Map<String, Value>,
    ) -> Result<(), ApiError> {
        let parent_id = entity
            .get(&resource.pk_column)
            .cloned()
            .ok_or(ApiError::Db(sqlx::Error::RowNotFound))?;

        for rel in &resource.relationships {
            let Some(payload) = attributes.get(&rel.attribute) else {
                continue;
            };
            let items: Vec<&Value> = match payload {
                Value::Array(arr) => arr.iter().collect(),
                single => vec![single],
            };

            if rel.clear_before_saving || rel.strategy == SaveStrategy::Sync {
                clear_relation(tx, rel, &parent_id).await?;
            }

            match rel.strategy {
                SaveStrategy::Create => {
                    for item in &items {
                        insert_child(tx, rel, &parent_id, item).await?;
                    }
                }
                SaveStrategy::Attach | SaveStrategy::Sync => {
                    attach_children(tx, rel, &parent_id, &items).await?;
                }
            }

            let related = load_relation(tx, rel, &parent_id).await?;
            if let Value::Object(map) = entity {
                map.insert(rel.attribute.clone(), Value::Array(related));
            }
        }
        Ok(())
    }
}

/// Attributes minus the declared relationship attributes.
fn plain_attributes(resource: &Resource, attributes: &Map<String, Value>) -> Map<String, Value> {
    let relationship_fields = resource.relationship_attributes();
    attributes
        .iter()
        .filter(|(k, _)| !relationship_fields.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

async fn execute_returning_one(
    tx: &mut PgConnection,
    sql: &str,
    params: &[PgBindValue],
) -> Result<Option<Value>, ApiError> {
    tracing::debug!(sql = %sql, params = ?params, "query (tx)");
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(p.clone());
    }
    let row = query.fetch_optional(&mut *tx).await?;
    Ok(row.map(|r| row_to_json(&r)))
}

async fn clear_relation(
    tx: &mut PgConnection,
    rel: &RelationshipDescriptor,
    parent_id: &Value,
) -> Result<(), ApiError> {
    let sql = match rel.strategy {
        // Created rows belong to the parent; clearing removes them.
        SaveStrategy::Create => format!(
            "DELETE FROM {} WHERE {} = $1",
            quoted(&rel.relation.table),
            quoted(&rel.relation.fk_column)
        ),
        // Attached rows exist independently; clearing detaches them.
        SaveStrategy::Attach | SaveStrategy::Sync => format!(
            "UPDATE {} SET {} = NULL WHERE {} = $1",
            quoted(&rel.relation.table),
            quoted(&rel.relation.fk_column),
            quoted(&rel.relation.fk_column)
        ),
    };
    tracing::debug!(sql = %sql, "clear relation");
    sqlx::query(&sql)
        .bind(PgBindValue::from_json(parent_id))
        .execute(&mut *tx)
        .await?;
    Ok(())
}

async fn insert_child(
    tx: &mut PgConnection,
    rel: &RelationshipDescriptor,
    parent_id: &Value,
    item: &Value,
) -> Result<(), ApiError> {
    let Value::Object(fields) = item else {
        return Err(ApiError::invalid(format!(
            "{} items must be objects",
            rel.attribute
        )));
    };
    let mut params = vec![PgBindValue::from_json(parent_id)];
    let mut cols = vec![quoted(&rel.relation.fk_column)];
    let mut placeholders = vec!["$1".to_string()];
    // Keys are quoted as identifiers; an unknown column surfaces as a
    // database error and rolls the transaction back.
    for (k, v) in fields {
        if *k == rel.relation.fk_column {
            continue;
        }
        params.push(PgBindValue::from_json(v));
        cols.push(quoted(k));
        placeholders.push(format!("${}", params.len()));
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(&rel.relation.table),
        cols.join(", "),
        placeholders.join(", ")
    );
    tracing::debug!(sql = %sql, "insert child");
    let mut query = sqlx::query(&sql);
    for p in &params {
        query = query.bind(p.clone());
    }
    query.execute(&mut *tx).await?;
    Ok(())
}

async fn attach_children(
    tx: &mut PgConnection,
    rel: &RelationshipDescriptor,
    parent_id: &Value,
    items: &[&Value],
) -> Result<(), ApiError> {
    if items.is_empty() {
        return Ok(());
    }
    // Items are child ids, or objects carrying the child pk.
    let mut ids: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        let id = match item {
            Value::Object(map) => map.get(&rel.relation.pk_column).cloned(),
            other => Some((*other).clone()),
        };
        ids.push(id.ok_or_else(|| {
            ApiError::invalid(format!(
                "{} items must carry '{}'",
                rel.attribute, rel.relation.pk_column
            ))
        })?);
    }
    let mut params = vec![PgBindValue::from_json(parent_id)];
    let placeholders: Vec<String> = ids
        .iter()
        .map(|id| {
            params.push(PgBindValue::from_json(id));
            format!("${}", params.len())
        })
        .collect();
    let sql = format!(
        "UPDATE {} SET {} = $1 WHERE {} IN ({})",
        quoted(&rel.relation.table),
        quoted(&rel.relation.fk_column),
        quoted(&rel.relation.pk_column),
        placeholders.join(", ")
    );
    tracing::debug!(sql = %sql, "attach children");
    let mut query = sqlx::query(&sql);
    for p in &params {
        query = query.bind(p.clone());
    }
    query.execute(&mut *tx).await?;
    Ok(())
}

async fn load_relation(
    tx: &mut PgConnection,
    rel: &RelationshipDescriptor,
    parent_id: &Value,
) -> Result<Vec<Value>, ApiError> {
    let sql = format!(
        "SELECT * FROM {} WHERE {} = $1 ORDER BY {}",
        quoted(&rel.relation.table),
        quoted(&rel.relation.fk_column),
        quoted(&rel.relation.pk_column)
    );
    let rows = sqlx::query(&sql)
        .bind(PgBindValue::from_json(parent_id))
        .fetch_all(&mut *tx)
        .await?;
    Ok(rows.iter().map(row_to_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ColumnDef, RelationTarget};

    fn post_with_comments() -> Resource {
        let mut r = Resource::new("Post", "posts", "posts");
        r.columns = vec![
            ColumnDef::new("id").with_default(),
            ColumnDef::new("title"),
            ColumnDef::new("body"),
        ];
        r.relationships = vec![RelationshipDescriptor {
            attribute: "comments".into(),
            relation: RelationTarget {
                table: "comments".into(),
                fk_column: "post_id".into(),
                pk_column: "id".into(),
            },
            strategy: SaveStrategy::Create,
            clear_before_saving: false,
        }];
        r
    }

    #[test]
    fn plain_attributes_exclude_relationship_fields() {
        let r = post_with_comments();
        let attrs: Map<String, Value> = serde_json::from_str(
            r#"{"title": "t", "body": "b", "comments": [{"text": "hi"}]}"#,
        )
        .unwrap();
        let plain = plain_attributes(&r, &attrs);
        assert!(plain.contains_key("title"));
        assert!(plain.contains_key("body"));
        assert!(!plain.contains_key("comments"));
    }
}
