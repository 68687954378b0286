//! Input templates and JMESPath evaluation against a context scope.
//!
//! A template is any JSON value. Strings starting with `$` are JMESPath
//! expressions over the scope (`{ "<step name>": <output>, ... }`); objects
//! and arrays are resolved element by element; everything else is literal.

use serde_json::{Map, Value};

use crate::CoreError;

/// Prefix marking a template string as an expression
pub const EXPRESSION_PREFIX: char = '$';

/// Evaluate a JMESPath expression against `scope`
pub fn search(expression: &str, scope: &Value) -> Result<Value, CoreError> {
    let compiled = jmespath::compile(expression).map_err(|e| {
        CoreError::ExpressionError(format!(
            "Failed to compile JMESPath expression: {}: {}",
            expression, e
        ))
    })?;

    let result = compiled.search(scope).map_err(|e| {
        CoreError::ExpressionError(format!(
            "Failed to evaluate JMESPath expression: {}: {}",
            expression, e
        ))
    })?;

    Ok(serde_json::to_value(&*result)?)
}

/// Evaluate a JMESPath expression and apply JMESPath truthiness
pub fn search_truthy(expression: &str, scope: &Value) -> Result<bool, CoreError> {
    let compiled = jmespath::compile(expression).map_err(|e| {
        CoreError::ExpressionError(format!(
            "Failed to compile JMESPath expression: {}: {}",
            expression, e
        ))
    })?;

    compiled
        .search(scope)
        .map(|result| result.is_truthy())
        .map_err(|e| {
            CoreError::ExpressionError(format!(
                "Failed to evaluate JMESPath expression: {}: {}",
                expression, e
            ))
        })
}

/// Resolve a template against `scope`
pub fn resolve(template: &Value, scope: &Value) -> Result<Value, CoreError> {
    match template {
        Value::String(s) => match s.strip_prefix(EXPRESSION_PREFIX) {
            Some(expression) => search(expression, scope),
            None => Ok(template.clone()),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(fields) => {
            let mut resolved = Map::with_capacity(fields.len());
            for (key, value) in fields {
                resolved.insert(key.clone(), resolve(value, scope)?);
            }
            Ok(Value::Object(resolved))
        }
        _ => Ok(template.clone()),
    }
}
