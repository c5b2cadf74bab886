//! Parse and validate raw query-string parameters into a `QueryRequest`.
//!
//! Validation is all-or-nothing: every violation is collected as a field-level
//! message and the request is rejected before any SQL is built.

use crate::error::{ApiError, FieldError};
use crate::filter::{parse_bool, parse_filter, FilterValue};
use crate::resource::{PkType, Resource};
use serde_json::Value;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MIN_PAGE_SIZE: u32 = 4;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Decoded query-string pairs, preserving repeats (`k[]=a&k[]=b`).
#[derive(Clone, Debug, Default)]
pub struct RawParams {
    pairs: Vec<(String, String)>,
}

impl RawParams {
    pub fn parse(query: &str) -> Self {
        RawParams {
            pairs: url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        RawParams {
            pairs: pairs.into_iter().collect(),
        }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// All values for `key` or `key[]`, in arrival order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        let bracketed = format!("{key}[]");
        self.pairs
            .iter()
            .filter(|(k, _)| k == key || *k == bracketed)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Values for the array form `key[]` only; a bare `key` does not count.
    pub fn get_array(&self, key: &str) -> Vec<&str> {
        let bracketed = format!("{key}[]");
        self.pairs
            .iter()
            .filter(|(k, _)| *k == bracketed)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Validated list/export request parameters. Never mutated after parse.
#[derive(Clone, Debug)]
pub struct QueryRequest {
    /// (field, value) in the resource's filter declaration order.
    pub filters: Vec<(String, FilterValue)>,
    /// Client-supplied sort field; converted and checked at query-build time.
    pub sort_by: Option<String>,
    pub descending: bool,
    pub page: u32,
    pub items_by_page: u32,
    pub exclude_ids: Vec<Value>,
    pub only_count: bool,
}

impl Default for QueryRequest {
    fn default() -> Self {
        QueryRequest {
            filters: Vec::new(),
            sort_by: None,
            descending: true,
            page: 1,
            items_by_page: DEFAULT_PAGE_SIZE,
            exclude_ids: Vec::new(),
            only_count: false,
        }
    }
}

/// Parse an id path segment / exclusion token into a bindable value.
pub fn parse_id(pk_type: &PkType, s: &str) -> Option<Value> {
    match pk_type {
        PkType::Uuid => uuid::Uuid::parse_str(s).ok().map(|u| Value::String(u.to_string())),
        PkType::BigInt | PkType::Int => s.parse::<i64>().ok().map(|n| Value::Number(n.into())),
        PkType::Text => Some(Value::String(s.to_string())),
    }
}

pub fn parse_request(resource: &Resource, params: &RawParams) -> Result<QueryRequest, ApiError> {
    let mut errors: Vec<FieldError> = Vec::new();
    let mut req = QueryRequest::default();

    if let Some(raw) = params.get("onlyCount") {
        match parse_bool(raw) {
            Some(b) => req.only_count = b,
            None => errors.push(FieldError::new("onlyCount", "onlyCount must be a boolean")),
        }
    }

    if let Some(sort_by) = params.get("sortBy") {
        if sort_by.is_empty() {
            errors.push(FieldError::new("sortBy", "sortBy must not be empty"));
        } else {
            req.sort_by = Some(sort_by.to_string());
        }
    }

    if let Some(raw) = params.get("descending") {
        match parse_bool(raw) {
            Some(b) => req.descending = b,
            None => errors.push(FieldError::new("descending", "descending must be a boolean")),
        }
    }

    if let Some(raw) = params.get("page") {
        match raw.parse::<u32>() {
            Ok(p) if p >= 1 => req.page = p,
            _ => errors.push(FieldError::new("page", "page must be an integer >= 1")),
        }
    }

    if let Some(raw) = params.get("itemsByPage") {
        match raw.parse::<u32>() {
            Ok(n) if n >= MIN_PAGE_SIZE => req.items_by_page = n,
            _ => errors.push(FieldError::new(
                "itemsByPage",
                format!("itemsByPage must be an integer >= {MIN_PAGE_SIZE}"),
            )),
        }
    }

    for raw in params.get_all("excludeIds") {
        match parse_id(&resource.pk_type, raw) {
            Some(v) => req.exclude_ids.push(v),
            None => {
                errors.push(FieldError::new("excludeIds", format!("excludeIds contains an invalid id: {raw}")));
            }
        }
    }

    for (field, kind) in &resource.filter_fields {
        if let Some(value) = parse_filter(field, *kind, params, &mut errors) {
            req.filters.push((field.clone(), value));
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::validation("validation failed", errors));
    }
    Ok(req)
}
