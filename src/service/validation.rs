//! Body validation against per-resource field rules. Violations are
//! collected across all fields before failing, so a client sees the full
//! list at once.

use crate::error::{ApiError, FieldError};
use crate::resource::ValidationRule;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a full body. Required fields must be present and non-null.
    pub fn validate(
        body: &Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        for (field, rule) in rules {
            let val = body.get(field);
            if rule.required && (val.is_none() || val == Some(&Value::Null)) {
                errors.push(FieldError::new(field, format!("{field} is required")));
                continue;
            }
            if let Some(v) = val {
                check_field(field, v, rule, &mut errors);
            }
        }
        finish(errors)
    }

    /// Validate only the fields present in the body. Missing required fields
    /// are not an error here; partial updates leave them untouched.
    pub fn validate_partial(
        body: &Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        for (field, v) in body {
            if let Some(rule) = rules.get(field) {
                check_field(field, v, rule, &mut errors);
            }
        }
        finish(errors)
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation("validation failed", errors))
    }
}

fn check_field(field: &str, v: &Value, rule: &ValidationRule, errors: &mut Vec<FieldError>) {
    if v.is_null() {
        return;
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                errors.push(FieldError::new(
                    field,
                    format!("{field} must be at least {min} characters"),
                ));
            }
        }
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                errors.push(FieldError::new(
                    field,
                    format!("{field} must be at most {max} characters"),
                ));
            }
        }
    }
    if let Some(pattern) = &rule.pattern {
        match Regex::new(pattern) {
            Ok(re) => {
                if let Some(s) = v.as_str() {
                    if !re.is_match(s) {
                        errors.push(FieldError::new(
                            field,
                            format!("{field} does not match the required pattern"),
                        ));
                    }
                }
            }
            Err(_) => {
                errors.push(FieldError::new(field, format!("invalid pattern for {field}")));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(FieldError::new(
                field,
                format!(
                    "{field} must be one of: {:?}",
                    allowed.iter().take(5).collect::<Vec<_>>()
                ),
            ));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                errors.push(FieldError::new(field, format!("{field} must be at least {min}")));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                errors.push(FieldError::new(field, format!("{field} must be at most {max}")));
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> HashMap<String, ValidationRule> {
        let mut rules = HashMap::new();
        rules.insert(
            "name".to_string(),
            ValidationRule {
                required: true,
                min_length: Some(3),
                max_length: Some(10),
                ..Default::default()
            },
        );
        rules.insert(
            "status".to_string(),
            ValidationRule {
                allowed: Some(vec![json!("open"), json!("closed")]),
                ..Default::default()
            },
        );
        rules.insert(
            "amount".to_string(),
            ValidationRule {
                minimum: Some(0.0),
                maximum: Some(100.0),
                ..Default::default()
            },
        );
        rules
    }

    fn body(s: &str) -> Map<String, Value> {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn valid_body_passes() {
        let b = body(r#"{"name": "alice", "status": "open", "amount": 50}"#);
        assert!(RequestValidator::validate(&b, &rules()).is_ok());
    }

    #[test]
    fn all_violations_collected() {
        let b = body(r#"{"name": "ab", "status": "weird", "amount": 200}"#);
        let err = RequestValidator::validate(&b, &rules()).unwrap_err();
        match err {
            ApiError::Validation { errors, .. } => {
                assert_eq!(errors.len(), 3);
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"name"));
                assert!(fields.contains(&"status"));
                assert!(fields.contains(&"amount"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn missing_required_field_fails_full_but_not_partial() {
        let b = body(r#"{"status": "open"}"#);
        assert!(RequestValidator::validate(&b, &rules()).is_err());
        assert!(RequestValidator::validate_partial(&b, &rules()).is_ok());
    }

    #[test]
    fn null_skips_rules_other_than_required() {
        let b = body(r#"{"name": "alice", "amount": null}"#);
        assert!(RequestValidator::validate(&b, &rules()).is_ok());
    }

    #[test]
    fn pattern_enforced() {
        let mut rules = HashMap::new();
        rules.insert(
            "code".to_string(),
            ValidationRule {
                pattern: Some("^[A-Z]{3}-\\d+$".to_string()),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&body(r#"{"code": "ABC-42"}"#), &rules).is_ok());
        assert!(RequestValidator::validate(&body(r#"{"code": "abc42"}"#), &rules).is_err());
    }
}
