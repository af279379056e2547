//! Request validation for handler payloads.
//!
//! Rejections are `Validation` handler errors and surface as 400.

use dossier_core::{HandlerError, Record};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Checks that `body` is an object carrying every field in `required`.
///
/// A field set to `null` or to an empty string counts as missing.
///
/// # Errors
///
/// Returns a `Validation` error naming every missing field.
pub fn require_fields<'a>(
    body: &'a Value,
    required: &[&str],
) -> Result<&'a Map<String, Value>, HandlerError> {
    let Some(object) = body.as_object() else {
        return Err(HandlerError::validation("request body must be a JSON object"));
    };
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| match object.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect();
    if missing.is_empty() {
        Ok(object)
    } else {
        Err(HandlerError::validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Validates `body` against `T::REQUIRED_FIELDS` and decodes it.
///
/// # Errors
///
/// Returns a `Validation` error for missing fields or fields of the wrong type.
pub fn parse_record<T: Record>(body: Value) -> Result<T, HandlerError> {
    require_fields(&body, T::REQUIRED_FIELDS)?;
    decode(body)
}

/// Decodes `body` into `T`, reporting shape mismatches as validation errors.
///
/// # Errors
///
/// Returns a `Validation` error carrying the decoder's message.
pub fn decode<T: DeserializeOwned>(body: Value) -> Result<T, HandlerError> {
    serde_json::from_value(body).map_err(|e| HandlerError::validation(format!("invalid payload: {e}")))
}

/// Extracts a positive numeric `field` from `body`.
///
/// # Errors
///
/// Returns a `Validation` error when the field is absent, not an unsigned
/// integer, or zero.
pub fn require_id(body: &Value, field: &str) -> Result<u64, HandlerError> {
    match body.get(field).and_then(Value::as_u64) {
        Some(id) if id > 0 => Ok(id),
        _ => Err(HandlerError::validation(format!(
            "'{field}' must be a positive integer"
        ))),
    }
}
