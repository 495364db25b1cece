//! JSON to record conversion and the bulk loader

use std::rc::Rc;

use serde_json::{Map, Number, Value};
use tracing::{debug, trace, warn};

use super::kind;
use crate::collection::Collection;
use crate::record::{FieldValue, Record, RecordError, RecordResult};
use crate::schema::{FieldDescriptor, FieldFlags, FieldType, Schema};

impl Record {
    /// Convert a JSON value to the field's type and write it
    ///
    /// Scalars are coerced permissively: a JSON kind other than the field's
    /// natural one is converted best-effort and logged. List and iterator
    /// fields take an array of objects, each becoming a new child record of
    /// the field's child schema.
    pub fn json_to_field(&mut self, name: &str, value: &Value) -> RecordResult<()> {
        let (_, field) = self.resolve(name)?;

        match field.ty {
            FieldType::List | FieldType::Iterator => {
                let schema = field.schema.ok_or_else(|| {
                    warn!(field = field.name, "Collection field has no child schema");
                    RecordError::NoChildSchema(field.name.to_string())
                })?;
                let collection = self.get_collection(field.name)?;
                bulk_load(&collection, schema, value, None).map(drop)
            }
            FieldType::Json => self
                .write(field.name, FieldValue::Json(Some(Rc::new(value.clone()))))
                .map(drop),
            FieldType::Pointer
            | FieldType::Resource
            | FieldType::Command
            | FieldType::Auth
            | FieldType::Sentinel => {
                warn!(field = field.name, ty = %field.ty, "Field cannot be loaded from JSON");
                Err(RecordError::Unsupported {
                    field: field.name.to_string(),
                    ty: field.ty,
                })
            }
            FieldType::Int32
            | FieldType::UInt32
            | FieldType::Int64
            | FieldType::UInt64
            | FieldType::Float
            | FieldType::Double
            | FieldType::Bool
            | FieldType::String => {
                let converted = scalar_from_json(field, value)?;
                self.write(field.name, converted).map(drop)
            }
        }
    }

    /// Apply every key of a JSON object to the matching field
    ///
    /// Keys with no matching field are passed to `not_found` and skipped.
    /// Unless `filter` is [`FieldFlags::all()`], only fields carrying one of
    /// its flags are applied. A field that fails to load is logged and
    /// skipped. Returns the number of fields applied.
    pub fn json_to_record(
        &mut self,
        value: &Value,
        filter: FieldFlags,
        not_found: Option<&mut dyn FnMut(&str)>,
    ) -> RecordResult<usize> {
        let Value::Object(map) = value else {
            warn!(schema = self.schema().name(), found = kind(value), "Record input is not an object");
            return Err(RecordError::UnexpectedJson {
                expected: "object",
                found: kind(value),
            });
        };

        let mut ignore = |_: &str| {};
        let not_found: &mut dyn FnMut(&str) = match not_found {
            Some(callback) => callback,
            None => &mut ignore,
        };
        self.apply_object(map, filter, not_found)
    }

    fn apply_object(
        &mut self,
        map: &Map<String, Value>,
        filter: FieldFlags,
        not_found: &mut dyn FnMut(&str),
    ) -> RecordResult<usize> {
        let schema = self.schema();
        let mut applied = 0;

        for (key, value) in map {
            let Some((_, field)) = schema.field(key) else {
                debug!(schema = schema.name(), key = %key, "Key has no matching field");
                not_found(key.as_str());
                continue;
            };
            if filter != FieldFlags::all() && !field.flags.intersects(filter) {
                trace!(field = field.name, "Field skipped by filter");
                continue;
            }
            match self.json_to_field(field.name, value) {
                Ok(()) => applied += 1,
                Err(RecordError::Destroyed) => return Err(RecordError::Destroyed),
                Err(e) => warn!(field = field.name, error = %e, "Field not loaded"),
            }
        }

        Ok(applied)
    }
}

/// Create one record of `schema` per object in a JSON array and append them
///
/// After each record is loaded, every `REQUIRED` field absent from its
/// object is reported through `not_found`, as are keys with no matching
/// field. Returns the number of records created.
pub fn bulk_load(
    collection: &Collection,
    schema: &'static Schema,
    value: &Value,
    not_found: Option<&mut dyn FnMut(&str)>,
) -> RecordResult<usize> {
    let Value::Array(items) = value else {
        warn!(schema = schema.name(), found = kind(value), "Bulk input is not an array");
        return Err(RecordError::UnexpectedJson {
            expected: "array",
            found: kind(value),
        });
    };

    let mut ignore = |_: &str| {};
    let not_found: &mut dyn FnMut(&str) = match not_found {
        Some(callback) => callback,
        None => &mut ignore,
    };

    let mut created = 0;
    for item in items {
        let Value::Object(map) = item else {
            warn!(schema = schema.name(), found = kind(item), "Bulk element is not an object");
            continue;
        };

        let mut record = Record::new(schema)?;
        record.apply_object(map, FieldFlags::all(), &mut *not_found)?;

        for field in schema.fields() {
            if field.flags.contains(FieldFlags::REQUIRED) && !present(field, map) {
                warn!(schema = schema.name(), field = field.name, "Required field missing");
                not_found(field.name);
            }
        }

        collection.push(record.into_ref());
        created += 1;
    }

    debug!(schema = schema.name(), created, "Bulk load complete");
    Ok(created)
}

fn present(field: &FieldDescriptor, map: &Map<String, Value>) -> bool {
    map.keys().any(|key| field.answers_to(key))
}

/// Convert a JSON value into the scalar kind of `field`
fn scalar_from_json(field: &FieldDescriptor, value: &Value) -> RecordResult<FieldValue> {
    if field.ty.is_numeric() {
        let number = match value {
            Value::Number(n) => Some((n.clone(), true)),
            Value::String(s) => s.trim().parse::<Number>().ok().map(|n| (n, false)),
            _ => None,
        };
        if let Some((n, natural)) = number {
            return number_for(field, &n, kind(value), natural);
        }
        let real = matches!(field.ty, FieldType::Float | FieldType::Double);
        if value.is_string() && !real {
            warn!(field = field.name, ty = %field.ty, "String is not an integer");
            return Err(RecordError::UnexpectedJson {
                expected: field.ty.name(),
                found: kind(value),
            });
        }
    }

    let (candidate, exact) = match value {
        Value::Null if field.ty == FieldType::String => (FieldValue::String(None), true),
        Value::Null => {
            warn!(field = field.name, "Null for a scalar field; writing zero");
            return FieldValue::zero(field.ty).ok_or_else(|| RecordError::Unsupported {
                field: field.name.to_string(),
                ty: field.ty,
            });
        }
        Value::Bool(b) => (FieldValue::Bool(*b), field.ty == FieldType::Bool),
        Value::Number(n) => {
            let candidate = if let Some(v) = n.as_u64() {
                FieldValue::UInt64(v)
            } else if let Some(v) = n.as_i64() {
                FieldValue::Int64(v)
            } else {
                FieldValue::Double(n.as_f64().unwrap_or_default())
            };
            (candidate, false)
        }
        Value::String(s) => (FieldValue::String(Some(s.clone())), field.ty == FieldType::String),
        Value::Array(_) | Value::Object(_) if field.ty == FieldType::String => {
            (FieldValue::String(Some(value.to_string())), false)
        }
        Value::Array(_) | Value::Object(_) => {
            warn!(field = field.name, ty = %field.ty, found = kind(value), "Structured JSON for a scalar field");
            return Err(RecordError::UnexpectedJson {
                expected: field.ty.name(),
                found: kind(value),
            });
        }
    };

    let found = kind(value);
    let converted = candidate.coerce(field.ty).ok_or_else(|| {
        warn!(field = field.name, ty = %field.ty, found, "JSON value not convertible");
        RecordError::UnexpectedJson {
            expected: field.ty.name(),
            found,
        }
    })?;
    if !exact {
        warn!(field = field.name, ty = %field.ty, found, "JSON value converted to field type");
    }
    Ok(converted)
}

/// Range-checked conversion of a JSON number into a numeric field
///
/// Integer fields reject values outside their range and reals with a
/// fractional part. `Float` rejects values beyond `f32` range and warns when
/// precision is lost.
fn number_for(
    field: &FieldDescriptor,
    n: &Number,
    found: &'static str,
    natural: bool,
) -> RecordResult<FieldValue> {
    let reject = || {
        warn!(field = field.name, ty = %field.ty, value = %n, "JSON number does not fit field");
        RecordError::UnexpectedJson {
            expected: field.ty.name(),
            found,
        }
    };

    let integral = || -> Option<i128> {
        if let Some(v) = n.as_i64() {
            return Some(v.into());
        }
        if let Some(v) = n.as_u64() {
            return Some(v.into());
        }
        let f = n.as_f64()?;
        (f.fract() == 0.0 && f.abs() < 2f64.powi(64)).then_some(f as i128)
    };

    let mut exact = natural && !n.is_f64();
    let converted = match field.ty {
        FieldType::Int32 => integral().and_then(|v| i32::try_from(v).ok()).map(FieldValue::Int32),
        FieldType::UInt32 => integral().and_then(|v| u32::try_from(v).ok()).map(FieldValue::UInt32),
        FieldType::Int64 => integral().and_then(|v| i64::try_from(v).ok()).map(FieldValue::Int64),
        FieldType::UInt64 => integral().and_then(|v| u64::try_from(v).ok()).map(FieldValue::UInt64),
        FieldType::Double => {
            exact = natural;
            n.as_f64().map(FieldValue::Double)
        }
        FieldType::Float => n.as_f64().and_then(|v| {
            let narrowed = v as f32;
            exact = natural && f64::from(narrowed) == v;
            narrowed.is_finite().then_some(FieldValue::Float(narrowed))
        }),
        _ => None,
    };

    let converted = converted.ok_or_else(reject)?;
    if !exact {
        warn!(field = field.name, ty = %field.ty, found, "JSON value converted to field type");
    }
    Ok(converted)
}
