//! Uniform response shapes and the list-envelope builder.

use crate::error::ApiError;
use crate::query::QueryRequest;
use crate::service::EntitySource;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

/// Caller-supplied entity-to-representation mapping.
pub type MapFn<'a> = &'a (dyn Fn(Value) -> Value + Send + Sync);

/// List envelope: `count` is the pre-pagination total, `entities` the current
/// page (empty when `onlyCount` was requested).
#[derive(Serialize, Debug, PartialEq)]
pub struct ResponseEnvelope {
    pub count: u64,
    pub entities: Vec<Value>,
}

/// Execute count-then-fetch against the source and shape the envelope.
///
/// The count query runs first; a zero count short-circuits without issuing
/// the data query at all.
pub async fn entities_response(
    req: &QueryRequest,
    source: &mut dyn EntitySource,
    map: Option<MapFn<'_>>,
) -> Result<ResponseEnvelope, ApiError> {
    let count = source.count().await?;

    if count == 0 {
        return Ok(ResponseEnvelope {
            count: 0,
            entities: Vec::new(),
        });
    }

    if req.only_count {
        return Ok(ResponseEnvelope {
            count,
            entities: Vec::new(),
        });
    }

    let rows = source.fetch_page().await?;
    let entities = match map {
        Some(f) => rows.into_iter().map(f).collect(),
        None => rows,
    };

    Ok(ResponseEnvelope { count, entities })
}

#[derive(Serialize)]
pub struct EntityModified {
    pub success: bool,
    pub entity: Value,
}

#[derive(Serialize)]
pub struct EntityDeleted {
    pub success: bool,
    pub id: Value,
    #[serde(rename = "deletedEntity")]
    pub deleted_entity: Value,
}

pub fn entity_created(entity: Value) -> (StatusCode, Json<EntityModified>) {
    (
        StatusCode::CREATED,
        Json(EntityModified {
            success: true,
            entity,
        }),
    )
}

pub fn entity_updated(entity: Value) -> (StatusCode, Json<EntityModified>) {
    (
        StatusCode::OK,
        Json(EntityModified {
            success: true,
            entity,
        }),
    )
}

pub fn entity_deleted(id: Value, deleted_entity: Value) -> (StatusCode, Json<EntityDeleted>) {
    (
        StatusCode::OK,
        Json(EntityDeleted {
            success: true,
            id,
            deleted_entity,
        }),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// In-memory source that records which reads were issued.
    pub(crate) struct FakeSource {
        pub rows: Vec<Value>,
        pub count_calls: u32,
        pub page_calls: u32,
        pub chunk_calls: u32,
    }

    impl FakeSource {
        pub(crate) fn new(rows: Vec<Value>) -> Self {
            FakeSource {
                rows,
                count_calls: 0,
                page_calls: 0,
                chunk_calls: 0,
            }
        }
    }

    #[async_trait]
    impl EntitySource for FakeSource {
        async fn count(&mut self) -> Result<u64, ApiError> {
            self.count_calls += 1;
            Ok(self.rows.len() as u64)
        }

        async fn fetch_page(&mut self) -> Result<Vec<Value>, ApiError> {
            self.page_calls += 1;
            Ok(self.rows.clone())
        }

        async fn fetch_chunk(&mut self, chunk_size: u32, offset: u64) -> Result<Vec<Value>, ApiError> {
            self.chunk_calls += 1;
            let start = (offset as usize).min(self.rows.len());
            let end = (start + chunk_size as usize).min(self.rows.len());
            Ok(self.rows[start..end].to_vec())
        }
    }

    #[tokio::test]
    async fn zero_count_skips_data_query() {
        let mut source = FakeSource::new(vec![]);
        let env = entities_response(&QueryRequest::default(), &mut source, None)
            .await
            .unwrap();
        assert_eq!(env, ResponseEnvelope { count: 0, entities: vec![] });
        assert_eq!(source.page_calls, 0);
    }

    #[tokio::test]
    async fn only_count_returns_empty_entities() {
        let mut source = FakeSource::new(vec![json!({"id": 1}), json!({"id": 2})]);
        let req = QueryRequest {
            only_count: true,
            ..QueryRequest::default()
        };
        let env = entities_response(&req, &mut source, None).await.unwrap();
        assert_eq!(env.count, 2);
        assert!(env.entities.is_empty());
        assert_eq!(source.page_calls, 0);
    }

    #[tokio::test]
    async fn mapping_applied_per_row() {
        let mut source = FakeSource::new(vec![json!({"id": 1}), json!({"id": 2})]);
        let map: MapFn = &|v| json!({"wrapped": v});
        let env = entities_response(&QueryRequest::default(), &mut source, Some(map))
            .await
            .unwrap();
        assert_eq!(env.count, 2);
        assert_eq!(env.entities[0], json!({"wrapped": {"id": 1}}));
        assert_eq!(source.page_calls, 1);
    }
}
