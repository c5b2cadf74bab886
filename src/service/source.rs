//! Read access to a bounded query: total count, the current page, or a
//! forward-only sequence of fixed-size chunks.
//!
//! The trait seam keeps the envelope builder and the exporter independent of
//! PostgreSQL, which is also what their tests exploit.

use crate::error::ApiError;
use crate::query::BoundedQuery;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

#[async_trait]
pub trait EntitySource: Send {
    /// Total rows matching the filter predicate, ignoring pagination.
    async fn count(&mut self) -> Result<u64, ApiError>;

    /// The rows of the current page.
    async fn fetch_page(&mut self) -> Result<Vec<Value>, ApiError>;

    /// One chunk of the full result set, starting at `offset`.
    async fn fetch_chunk(&mut self, chunk_size: u32, offset: u64) -> Result<Vec<Value>, ApiError>;
}

pub struct PgEntitySource<'a> {
    pool: &'a PgPool,
    query: BoundedQuery,
}

impl<'a> PgEntitySource<'a> {
    pub fn new(pool: &'a PgPool, query: BoundedQuery) -> Self {
        PgEntitySource { pool, query }
    }

    async fn fetch(&self, sql: &str) -> Result<Vec<Value>, ApiError> {
        tracing::debug!(sql = %sql, params = ?self.query.params, "query");
        let mut q = sqlx::query(sql);
        for p in &self.query.params {
            q = q.bind(p.clone());
        }
        let rows = q.fetch_all(self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

#[async_trait]
impl EntitySource for PgEntitySource<'_> {
    async fn count(&mut self) -> Result<u64, ApiError> {
        use sqlx::Row;
        let sql = self.query.count_sql();
        tracing::debug!(sql = %sql, params = ?self.query.params, "count query");
        let mut q = sqlx::query(&sql);
        for p in &self.query.params {
            q = q.bind(p.clone());
        }
        let row = q.fetch_one(self.pool).await?;
        let n: i64 = row.try_get(0)?;
        Ok(n.max(0) as u64)
    }

    async fn fetch_page(&mut self) -> Result<Vec<Value>, ApiError> {
        self.fetch(&self.query.page_sql()).await
    }

    async fn fetch_chunk(&mut self, chunk_size: u32, offset: u64) -> Result<Vec<Value>, ApiError> {
        self.fetch(&self.query.chunk_sql(chunk_size, offset)).await
    }
}

pub(crate) fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(f64::from(n)) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
