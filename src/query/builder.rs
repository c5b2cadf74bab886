//! Composes id-exclusion, filter predicates, sorting, and pagination into a
//! single bounded, parameterized query.

use crate::error::ApiError;
use crate::filter::FilterValue;
use crate::query::params::PgBindValue;
use crate::query::request::{QueryRequest, MAX_PAGE_SIZE};
use crate::resource::Resource;

/// Quote identifier for PostgreSQL (safe: only from resource declarations).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub(crate) fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub(crate) fn placeholder(n: usize, pg_type: Option<&str>) -> String {
    match pg_type {
        Some(t) => format!("${n}::{t}"),
        None => format!("${n}"),
    }
}

/// SELECT list: each column as-is, except custom enum (schema.typename) and
/// numeric as col::text so sqlx returns String.
pub(crate) fn select_column_list(resource: &Resource) -> String {
    resource
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            let pg_type = c.pg_type.as_deref().unwrap_or("");
            if pg_type.contains('.') || pg_type == "numeric" {
                format!("{q}::text")
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A filtered, sorted query whose page size is always clamped to
/// [`MAX_PAGE_SIZE`]. Owned by a single pipeline invocation.
#[derive(Clone, Debug)]
pub struct BoundedQuery {
    table: String,
    select_list: String,
    where_clause: String,
    order_clause: String,
    pub params: Vec<PgBindValue>,
    pub page: u32,
    pub page_size: u32,
}

impl BoundedQuery {
    /// Count of everything matching the filter predicate, before pagination.
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}{}", self.table, self.where_clause)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// The current page of results.
    pub fn page_sql(&self) -> String {
        format!(
            "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
            self.select_list,
            self.table,
            self.where_clause,
            self.order_clause,
            self.page_size,
            self.offset()
        )
    }

    /// One fixed-size chunk of the full (unpaginated) result, for export.
    pub fn chunk_sql(&self, chunk_size: u32, offset: u64) -> String {
        format!(
            "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
            self.select_list, self.table, self.where_clause, self.order_clause, chunk_size, offset
        )
    }
}

/// Build the bounded query for a validated request. Steps, in order:
/// id-exclusion, filters in declaration order, sort, pagination.
pub fn build_query(resource: &Resource, req: &QueryRequest) -> Result<BoundedQuery, ApiError> {
    let table = qualified_table(&resource.schema, &resource.table);
    let mut params: Vec<PgBindValue> = Vec::new();
    let mut where_parts: Vec<String> = Vec::new();

    let mut push = |params: &mut Vec<PgBindValue>, v: PgBindValue, pg_type: Option<&str>| {
        params.push(v);
        placeholder(params.len(), pg_type)
    };

    // Exclusion names the pk column explicitly, table-qualified, so it stays
    // unambiguous if the base query ever grows joins.
    if !req.exclude_ids.is_empty() {
        let pk_col = resource.column(&resource.pk_column);
        let pk_type = pk_col.and_then(|c| c.pg_type.as_deref());
        let placeholders: Vec<String> = req
            .exclude_ids
            .iter()
            .map(|id| push(&mut params, PgBindValue::from_json(id), pk_type))
            .collect();
        where_parts.push(format!(
            "{}.{} NOT IN ({})",
            table,
            quoted(&resource.pk_column),
            placeholders.join(", ")
        ));
    }

    for (field, value) in &req.filters {
        let pg_type = resource.column(field).and_then(|c| c.pg_type.as_deref());
        match value {
            FilterValue::Equals(b) => {
                let ph = push(&mut params, PgBindValue::Bool(*b), pg_type);
                where_parts.push(format!("{} = {}", quoted(field), ph));
            }
            FilterValue::Substring(s) => {
                let ph = push(&mut params, PgBindValue::String(format!("%{s}%")), None);
                where_parts.push(format!("{} ILIKE {}", quoted(field), ph));
            }
            FilterValue::OneOf(tokens) => {
                let ors: Vec<String> = tokens
                    .iter()
                    .map(|t| {
                        let ph = push(&mut params, PgBindValue::String(t.clone()), pg_type);
                        format!("{} = {}", quoted(field), ph)
                    })
                    .collect();
                where_parts.push(format!("({})", ors.join(" OR ")));
            }
            FilterValue::NumRange { min, max } => {
                if let Some(lo) = min {
                    let ph = push(&mut params, PgBindValue::I64(*lo), pg_type);
                    where_parts.push(format!("{} >= {}", quoted(field), ph));
                }
                if let Some(hi) = max {
                    let ph = push(&mut params, PgBindValue::I64(*hi), pg_type);
                    where_parts.push(format!("{} <= {}", quoted(field), ph));
                }
            }
            FilterValue::DateRange { min, max } => {
                let cast = pg_type.or(Some("timestamp"));
                if let Some(lo) = min {
                    let ph = push(&mut params, PgBindValue::Timestamp(*lo), cast);
                    where_parts.push(format!("{} >= {}", quoted(field), ph));
                }
                if let Some(hi) = max {
                    let ph = push(&mut params, PgBindValue::Timestamp(*hi), cast);
                    where_parts.push(format!("{} <= {}", quoted(field), ph));
                }
            }
        }
    }

    let order_clause = match &req.sort_by {
        Some(sort_by) => {
            let column = match resource.field_case {
                Some(case) => case.convert(sort_by),
                None => sort_by.clone(),
            };
            // Sort fields are checked against declared columns; the column
            // namespace is not exposed to arbitrary client input.
            if !resource.has_column(&column) {
                return Err(ApiError::invalid(format!("unknown sort field: {sort_by}")));
            }
            let dir = if req.descending { "DESC" } else { "ASC" };
            format!(" ORDER BY {} {}", quoted(&column), dir)
        }
        // Deterministic page order even without an explicit sort.
        None => format!(" ORDER BY {}", quoted(&resource.pk_column)),
    };

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    Ok(BoundedQuery {
        table,
        select_list: select_column_list(resource),
        where_clause,
        order_clause,
        params,
        page: req.page,
        page_size: req.items_by_page.min(MAX_PAGE_SIZE),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::FieldCase;
    use crate::filter::FilterKind;
    use crate::query::request::{parse_request, RawParams};
    use crate::resource::ColumnDef;

    fn orders() -> Resource {
        let mut r = Resource::new("Order", "orders", "orders");
        r.columns = vec![
            ColumnDef::new("id").with_default(),
            ColumnDef::new("status"),
            ColumnDef::typed("created", "timestamptz"),
            ColumnDef::new("created_at"),
        ];
        r.filter_fields = vec![
            ("status".into(), FilterKind::Select),
            ("created".into(), FilterKind::DateRange),
        ];
        r
    }

    fn build(query_string: &str) -> Result<BoundedQuery, ApiError> {
        let req = parse_request(&orders(), &RawParams::parse(query_string))?;
        build_query(&orders(), &req)
    }

    #[test]
    fn select_and_date_range_predicates() {
        let q = build(
            "status[]=open&status[]=pending&created_min=2024-01-01&created_max=2024-01-31&page=2&itemsByPage=10",
        )
        .unwrap();
        assert_eq!(
            q.page_sql(),
            "SELECT \"id\", \"status\", \"created\", \"created_at\" FROM \"public\".\"orders\" \
             WHERE (\"status\" = $1 OR \"status\" = $2) \
             AND \"created\" >= $3::timestamptz AND \"created\" <= $4::timestamptz \
             ORDER BY \"id\" LIMIT 10 OFFSET 10"
        );
        assert_eq!(q.params.len(), 4);
        assert_eq!(q.params[0], PgBindValue::String("open".into()));
        assert_eq!(q.params[1], PgBindValue::String("pending".into()));
    }

    #[test]
    fn count_sql_has_no_pagination() {
        let q = build("status[]=open&page=5&itemsByPage=10").unwrap();
        assert_eq!(
            q.count_sql(),
            "SELECT COUNT(*) FROM \"public\".\"orders\" WHERE (\"status\" = $1)"
        );
    }

    #[test]
    fn page_size_clamped_to_ceiling() {
        let q = build("itemsByPage=5000").unwrap();
        assert_eq!(q.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn first_page_starts_at_offset_zero() {
        let q = build("page=1&itemsByPage=50").unwrap();
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn no_filters_means_no_where() {
        let q = build("").unwrap();
        assert_eq!(
            q.page_sql(),
            "SELECT \"id\", \"status\", \"created\", \"created_at\" FROM \"public\".\"orders\" \
             ORDER BY \"id\" LIMIT 20 OFFSET 0"
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn exclusion_uses_qualified_pk() {
        let q = build("excludeIds[]=1&excludeIds[]=2").unwrap();
        assert!(q
            .page_sql()
            .contains("WHERE \"public\".\"orders\".\"id\" NOT IN ($1, $2)"));
    }

    #[test]
    fn sort_field_case_conversion_and_direction_default() {
        let mut r = orders();
        r.field_case = Some(FieldCase::Snake);
        let req = parse_request(&r, &RawParams::parse("sortBy=createdAt")).unwrap();
        let q = build_query(&r, &req).unwrap();
        assert!(q.page_sql().contains("ORDER BY \"created_at\" DESC"));

        let req = parse_request(&r, &RawParams::parse("sortBy=createdAt&descending=false")).unwrap();
        let q = build_query(&r, &req).unwrap();
        assert!(q.page_sql().contains("ORDER BY \"created_at\" ASC"));
    }

    #[test]
    fn unknown_sort_field_rejected() {
        let err = build("sortBy=secret_column").unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[test]
    fn typed_columns_cast_on_every_predicate_kind() {
        let mut r = Resource::new("Order", "orders", "orders");
        r.columns = vec![
            ColumnDef::new("id").with_default(),
            ColumnDef::typed("paid", "boolean"),
            ColumnDef::typed("total", "numeric"),
        ];
        r.filter_fields = vec![
            ("paid".into(), FilterKind::Bool),
            ("total".into(), FilterKind::NumRange),
        ];
        let req = parse_request(&r, &RawParams::parse("paid=true&total_min=10&total_max=50")).unwrap();
        let sql = build_query(&r, &req).unwrap().page_sql();
        assert!(sql.contains("\"paid\" = $1::boolean"));
        assert!(sql.contains("\"total\" >= $2::numeric"));
        assert!(sql.contains("\"total\" <= $3::numeric"));
    }

    #[test]
    fn chunk_sql_walks_offsets() {
        let q = build("").unwrap();
        assert!(q.chunk_sql(1000, 0).ends_with("LIMIT 1000 OFFSET 0"));
        assert!(q.chunk_sql(1000, 2000).ends_with("LIMIT 1000 OFFSET 2000"));
    }
}
