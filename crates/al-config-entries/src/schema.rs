//! Form schemas for flow steps
//!
//! A [`Schema`] describes the fields a form step accepts. The flow manager
//! validates submitted input against the schema of the form it last showed,
//! so a step handler only ever sees input that passed validation, with
//! defaults filled in.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub const ERROR_REQUIRED: &str = "required";
pub const ERROR_EMPTY: &str = "empty";
pub const ERROR_INVALID_TYPE: &str = "invalid_type";
pub const ERROR_TOO_SMALL: &str = "value_too_small";
pub const ERROR_TOO_LARGE: &str = "value_too_large";
pub const ERROR_EXTRA_KEY: &str = "extra_keys_not_allowed";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String,
    /// Whole number with inclusive bounds
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Field {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    /// Value used when the field is left out of the submission
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn check(&self, value: &Value) -> Result<Value, &'static str> {
        match &self.field_type {
            FieldType::String => match value {
                Value::String(s) if self.required && s.trim().is_empty() => Err(ERROR_EMPTY),
                Value::String(_) => Ok(value.clone()),
                _ => Err(ERROR_INVALID_TYPE),
            },
            FieldType::Integer { min, max } => {
                let n = as_integer(value).ok_or(ERROR_INVALID_TYPE)?;
                if min.is_some_and(|min| n < min) {
                    return Err(ERROR_TOO_SMALL);
                }
                if max.is_some_and(|max| n > max) {
                    return Err(ERROR_TOO_LARGE);
                }
                Ok(Value::from(n))
            }
        }
    }
}

/// Integers, integral floats and numeric strings coerce; nothing else does
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| is_whole_i64(*f)).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `as` saturates, so anything outside `i64` must be refused first
fn is_whole_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Submitted input failed validation; maps field name to error code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid form input: {errors:?}")]
pub struct SchemaError {
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Validate input, returning it coerced and with defaults applied
    pub fn validate(&self, input: &Map<String, Value>) -> Result<Map<String, Value>, SchemaError> {
        let mut output = Map::new();
        let mut errors = BTreeMap::new();

        for field in &self.fields {
            let value = match input.get(&field.name) {
                Some(Value::Null) | None => field.default.as_ref(),
                Some(value) => Some(value),
            };
            match value {
                Some(value) => match field.check(value) {
                    Ok(value) => {
                        output.insert(field.name.clone(), value);
                    }
                    Err(code) => {
                        errors.insert(field.name.clone(), code.to_string());
                    }
                },
                None if field.required => {
                    errors.insert(field.name.clone(), ERROR_REQUIRED.to_string());
                }
                None => {}
            }
        }

        for key in input.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                errors.insert(key.clone(), ERROR_EXTRA_KEY.to_string());
            }
        }

        if errors.is_empty() {
            Ok(output)
        } else {
            Err(SchemaError { errors })
        }
    }
}
