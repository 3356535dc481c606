//! Record validation from declarative rules.

use crate::config::ValidationRule;
use crate::error::ValidationErrors;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate record attributes against per-field rules, collecting every failure.
    pub fn validate(
        attributes: &Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, rule) in rules {
            let val = attributes.get(field);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                errors.add(field, format!("{} is required", field));
                continue;
            }
            if let Some(v) = val {
                validate_field(field, v, rule, &mut errors);
            }
        }
        errors.into_result()
    }
}

fn validate_field(field: &str, v: &Value, rule: &ValidationRule, errors: &mut ValidationErrors) {
    if v.is_null() {
        return;
    }
    if let Some(format) = &rule.format {
        validate_format(field, v, format, errors);
    }
    if let (Some(max), Some(s)) = (rule.max_length, v.as_str()) {
        if s.chars().count() > max as usize {
            errors.add(field, format!("{} must be at most {} characters", field, max));
        }
    }
    if let (Some(min), Some(s)) = (rule.min_length, v.as_str()) {
        if s.chars().count() < min as usize {
            errors.add(field, format!("{} must be at least {} characters", field, min));
        }
    }
    if let Some(ref pattern) = rule.pattern {
        match Regex::new(pattern) {
            Ok(re) => {
                if let Some(s) = v.as_str() {
                    if !re.is_match(s) {
                        errors.add(field, format!("{} does not match required pattern", field));
                    }
                }
            }
            Err(_) => errors.add(field, format!("invalid pattern for {}", field)),
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.add(
                field,
                format!(
                    "{} must be one of: {:?}",
                    field,
                    allowed.iter().take(5).collect::<Vec<_>>()
                ),
            );
        }
    }
    if let (Some(min), Some(n)) = (rule.minimum, v.as_f64()) {
        if n < min {
            errors.add(field, format!("{} must be at least {}", field, min));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, v.as_f64()) {
        if n > max {
            errors.add(field, format!("{} must be at most {}", field, max));
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(field: &str, v: &Value, format: &str, errors: &mut ValidationErrors) {
    let Some(s) = v.as_str() else {
        return;
    };
    match format.to_lowercase().as_str() {
        "email" => {
            if !s.contains('@') || s.len() < 3 {
                errors.add(field, format!("{} must be a valid email", field));
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                errors.add(field, format!("{} must be a valid UUID", field));
            }
        }
        _ => {}
    }
}
