//! Declarative filter spec: field kind -> validation rules + typed filter value.
//!
//! Filtering is all-or-nothing per request: any malformed filter parameter
//! rejects the whole request before SQL is built.

use crate::error::FieldError;
use crate::query::request::RawParams;
use chrono::{NaiveDate, NaiveDateTime};

pub const STRING_MIN_LEN: usize = 3;
pub const STRING_MAX_LEN: usize = 255;
pub const SELECT_MAX_TOKENS: usize = 20;
pub const SELECT_TOKEN_MAX_LEN: usize = 100;

/// How a declared field filters its column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    /// Boolean equality. Absent -> no predicate.
    Bool,
    /// Case-insensitive substring match, query length 3-255.
    Text,
    /// OR-of-equality over up to 20 alphanumeric/dash tokens.
    Select,
    /// `{field}_min` / `{field}_max` integer bounds.
    NumRange,
    /// `{field}_min` / `{field}_max` date bounds, normalized to start/end of day.
    DateRange,
}

/// Validated filter value, ready to become a predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Equals(bool),
    Substring(String),
    OneOf(Vec<String>),
    NumRange {
        min: Option<i64>,
        max: Option<i64>,
    },
    DateRange {
        min: Option<NaiveDateTime>,
        max: Option<NaiveDateTime>,
    },
}

/// Parse and validate one declared filter field against the raw parameters.
/// Returns `None` (no predicate) when the field is absent or empty; pushes
/// field-level messages into `errors` on violation.
pub fn parse_filter(
    field: &str,
    kind: FilterKind,
    params: &RawParams,
    errors: &mut Vec<FieldError>,
) -> Option<FilterValue> {
    match kind {
        FilterKind::Bool => {
            let raw = params.get(field)?;
            match parse_bool(raw) {
                Some(b) => Some(FilterValue::Equals(b)),
                None => {
                    errors.push(FieldError::new(field, format!("{field} must be a boolean")));
                    None
                }
            }
        }
        FilterKind::Text => {
            let raw = params.get(field)?;
            if raw.is_empty() {
                return None;
            }
            let len = raw.chars().count();
            if !(STRING_MIN_LEN..=STRING_MAX_LEN).contains(&len) {
                errors.push(FieldError::new(
                    field,
                    format!("{field} must be {STRING_MIN_LEN}-{STRING_MAX_LEN} characters"),
                ));
                return None;
            }
            Some(FilterValue::Substring(raw.to_string()))
        }
        FilterKind::Select => {
            // Only the array form selects; a bare `field=v` is not a predicate.
            let tokens = params.get_array(field);
            if tokens.is_empty() {
                return None;
            }
            if tokens.len() > SELECT_MAX_TOKENS {
                errors.push(FieldError::new(
                    field,
                    format!("{field} accepts at most {SELECT_MAX_TOKENS} values"),
                ));
                return None;
            }
            let mut ok = true;
            for t in &tokens {
                let len = t.chars().count();
                if len == 0 || len > SELECT_TOKEN_MAX_LEN || !is_alpha_dash(t) {
                    errors.push(FieldError::new(
                        field,
                        format!("{field} values must be 1-{SELECT_TOKEN_MAX_LEN} alphanumeric/dash characters"),
                    ));
                    ok = false;
                    break;
                }
            }
            if !ok {
                return None;
            }
            Some(FilterValue::OneOf(tokens.iter().map(|s| s.to_string()).collect()))
        }
        FilterKind::NumRange => {
            let min = parse_bound(field, "min", params, errors, |s| s.parse::<i64>().ok());
            let max = parse_bound(field, "max", params, errors, |s| s.parse::<i64>().ok());
            if let (Some(lo), Some(hi)) = (min, max) {
                if hi < lo {
                    errors.push(FieldError::new(
                        format!("{field}_max"),
                        format!("{field}_max must be greater than or equal to {field}_min"),
                    ));
                    return None;
                }
            }
            if min.is_none() && max.is_none() {
                return None;
            }
            Some(FilterValue::NumRange { min, max })
        }
        FilterKind::DateRange => {
            let min = parse_bound(field, "min", params, errors, parse_date);
            let max = parse_bound(field, "max", params, errors, parse_date);
            if let (Some(lo), Some(hi)) = (min, max) {
                if hi < lo {
                    errors.push(FieldError::new(
                        format!("{field}_max"),
                        format!("{field}_max must be greater than or equal to {field}_min"),
                    ));
                    return None;
                }
            }
            if min.is_none() && max.is_none() {
                return None;
            }
            Some(FilterValue::DateRange {
                min: min.map(start_of_day),
                max: max.map(end_of_day),
            })
        }
    }
}

fn parse_bound<T>(
    field: &str,
    suffix: &str,
    params: &RawParams,
    errors: &mut Vec<FieldError>,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let key = format!("{field}_{suffix}");
    let raw = params.get(&key)?;
    if raw.is_empty() {
        return None;
    }
    match parse(raw) {
        Some(v) => Some(v),
        None => {
            errors.push(FieldError::new(&key, format!("{key} is malformed")));
            None
        }
    }
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" => Some(true),
        "0" => Some(false),
        _ if s.eq_ignore_ascii_case("true") => Some(true),
        _ if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn is_alpha_dash(s: &str) -> bool {
    s.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok().map(|dt| dt.date()))
}

fn start_of_day(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_opt(0, 0, 0).unwrap_or_else(|| d.and_time(chrono::NaiveTime::MIN))
}

fn end_of_day(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_opt(23, 59, 59).unwrap_or_else(|| d.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> RawParams {
        RawParams::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn absent_field_yields_no_predicate() {
        let p = params(&[]);
        let mut errors = Vec::new();
        for kind in [
            FilterKind::Bool,
            FilterKind::Text,
            FilterKind::Select,
            FilterKind::NumRange,
            FilterKind::DateRange,
        ] {
            assert_eq!(parse_filter("f", kind, &p, &mut errors), None);
        }
        assert!(errors.is_empty());
    }

    #[test]
    fn bool_coercion() {
        let mut errors = Vec::new();
        let p = params(&[("active", "1")]);
        assert_eq!(
            parse_filter("active", FilterKind::Bool, &p, &mut errors),
            Some(FilterValue::Equals(true))
        );
        let p = params(&[("active", "maybe")]);
        assert_eq!(parse_filter("active", FilterKind::Bool, &p, &mut errors), None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn string_length_bounds() {
        let mut errors = Vec::new();
        let p = params(&[("name", "ab")]);
        assert_eq!(parse_filter("name", FilterKind::Text, &p, &mut errors), None);
        assert_eq!(errors.len(), 1);

        errors.clear();
        let p = params(&[("name", "abc")]);
        assert_eq!(
            parse_filter("name", FilterKind::Text, &p, &mut errors),
            Some(FilterValue::Substring("abc".into()))
        );
    }

    #[test]
    fn empty_string_is_not_a_predicate() {
        let mut errors = Vec::new();
        let p = params(&[("name", "")]);
        assert_eq!(parse_filter("name", FilterKind::Text, &p, &mut errors), None);
        assert!(errors.is_empty());
    }

    #[test]
    fn select_tokens() {
        let mut errors = Vec::new();
        let p = params(&[("status[]", "open"), ("status[]", "pending")]);
        assert_eq!(
            parse_filter("status", FilterKind::Select, &p, &mut errors),
            Some(FilterValue::OneOf(vec!["open".into(), "pending".into()]))
        );

        let p = params(&[("status[]", "not ok!")]);
        assert_eq!(parse_filter("status", FilterKind::Select, &p, &mut errors), None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn select_ignores_bare_non_array_param() {
        let mut errors = Vec::new();
        let p = params(&[("status", "open")]);
        assert_eq!(parse_filter("status", FilterKind::Select, &p, &mut errors), None);
        assert!(errors.is_empty());
    }

    #[test]
    fn select_token_limit() {
        let mut errors = Vec::new();
        let pairs: Vec<(String, String)> =
            (0..21).map(|i| ("status[]".to_string(), format!("v{i}"))).collect();
        let p = RawParams::from_pairs(pairs);
        assert_eq!(parse_filter("status", FilterKind::Select, &p, &mut errors), None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn num_range_one_sided() {
        let mut errors = Vec::new();
        let p = params(&[("price_min", "10")]);
        assert_eq!(
            parse_filter("price", FilterKind::NumRange, &p, &mut errors),
            Some(FilterValue::NumRange {
                min: Some(10),
                max: None
            })
        );
    }

    #[test]
    fn range_min_greater_than_max_fails() {
        let mut errors = Vec::new();
        let p = params(&[("price_min", "10"), ("price_max", "5")]);
        assert_eq!(parse_filter("price", FilterKind::NumRange, &p, &mut errors), None);
        assert_eq!(errors.len(), 1);

        errors.clear();
        let p = params(&[("created_min", "2024-02-01"), ("created_max", "2024-01-01")]);
        assert_eq!(parse_filter("created", FilterKind::DateRange, &p, &mut errors), None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn date_range_normalized_to_day_bounds() {
        let mut errors = Vec::new();
        let p = params(&[("created_min", "2024-01-01"), ("created_max", "2024-01-31")]);
        let v = parse_filter("created", FilterKind::DateRange, &p, &mut errors).unwrap();
        match v {
            FilterValue::DateRange { min, max } => {
                assert_eq!(min.unwrap().to_string(), "2024-01-01 00:00:00");
                assert_eq!(max.unwrap().to_string(), "2024-01-31 23:59:59");
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
