//! Type dispatch engine
//!
//! Read, write, default and clear for every field kind. Each operation is one
//! exhaustive `match` on the declared [`FieldType`], so adding a kind means
//! the compiler points at every place that has to learn about it.

use std::ffi::c_void;
use std::rc::Rc;

use serde_json::Value;
use tracing::{trace, warn};

use super::{FieldValue, Record, RecordError, RecordRef, RecordResult};
use crate::collection::Collection;
use crate::schema::{FieldDescriptor, FieldFlags, FieldType};

impl Record {
    /// Write a value and return the previous one
    ///
    /// Owned strings are replaced; JSON values are stored as the record's own
    /// `Rc` handle so the caller's handle stays valid; pointers are stored
    /// verbatim and never freed. A value of a different scalar kind is
    /// converted best-effort with a warning. Collection and nested kinds
    /// cannot be written.
    ///
    /// After the store, the write observer runs, then the stats observer if
    /// the field is tracked for statistics.
    pub fn write(&mut self, name: &str, value: FieldValue) -> RecordResult<FieldValue> {
        let (index, field) = self.resolve(name)?;
        let value = admit(field, value)?;
        let old = std::mem::replace(&mut self.slots[index].value, value);
        trace!(field = field.name, "Field written");
        self.notify_write(index, field, &old);
        Ok(old)
    }

    /// Read a field value
    ///
    /// Collection kinds return a handle sharing the live collection. The
    /// read observer, if any, may replace the value.
    pub fn read(&self, name: &str) -> RecordResult<FieldValue> {
        let (index, field) = self.resolve(name)?;
        let value = self.slots[index].value.clone();
        Ok(match &self.on_read {
            Some(observer) => observer(self, field.name, value),
            None => value,
        })
    }

    /// Re-apply the declared default of a field
    pub fn apply_default(&mut self, name: &str) -> RecordResult<()> {
        let (index, _) = self.resolve(name)?;
        self.apply_default_at(index)
    }

    /// Release whatever the field owns and reset it to its zero value
    ///
    /// List and iterator contents are handed to the field's free function
    /// (pure children without one are destroyed); the container itself stays.
    pub fn clear(&mut self, name: &str) -> RecordResult<()> {
        let (index, _) = self.resolve(name)?;
        self.clear_at(index)
    }

    pub(crate) fn apply_default_at(&mut self, index: usize) -> RecordResult<()> {
        let field = &self.schema.fields()[index];

        if field.flags.is_statistics() {
            self.slots[index].meta |= super::STATS_TRACK_BIT;
        }

        match field.ty {
            FieldType::List | FieldType::Iterator => {
                let collection = self.collection_at(index);
                if !collection.is_empty() {
                    warn!(
                        field = field.name,
                        len = collection.len(),
                        "Default applied to a non-empty collection field"
                    );
                    release_children(field, &collection);
                }
                Ok(())
            }
            FieldType::Resource | FieldType::Command | FieldType::Auth => {
                self.slots[index].value = FieldValue::Nested(field.ty, None);
                Ok(())
            }
            FieldType::Sentinel => Err(RecordError::Unsupported {
                field: field.name.to_string(),
                ty: field.ty,
            }),
            FieldType::Int32
            | FieldType::UInt32
            | FieldType::Int64
            | FieldType::UInt64
            | FieldType::Float
            | FieldType::Double
            | FieldType::Bool
            | FieldType::String
            | FieldType::Json
            | FieldType::Pointer => {
                let value = FieldValue::from_default(field.name, field.ty, &field.default)
                    .ok_or_else(|| RecordError::Unsupported {
                        field: field.name.to_string(),
                        ty: field.ty,
                    })?;
                self.store_at(index, value);
                Ok(())
            }
        }
    }

    pub(crate) fn clear_at(&mut self, index: usize) -> RecordResult<()> {
        let field = &self.schema.fields()[index];

        match field.ty {
            FieldType::List | FieldType::Iterator => {
                let collection = self.collection_at(index);
                release_children(field, &collection);
                Ok(())
            }
            FieldType::Resource | FieldType::Command | FieldType::Auth => {
                self.slots[index].value = FieldValue::Nested(field.ty, None);
                Ok(())
            }
            FieldType::Sentinel => Err(RecordError::Unsupported {
                field: field.name.to_string(),
                ty: field.ty,
            }),
            FieldType::Int32
            | FieldType::UInt32
            | FieldType::Int64
            | FieldType::UInt64
            | FieldType::Float
            | FieldType::Double
            | FieldType::Bool
            | FieldType::String
            | FieldType::Json
            | FieldType::Pointer => {
                let zero = FieldValue::zero(field.ty).ok_or_else(|| RecordError::Unsupported {
                    field: field.name.to_string(),
                    ty: field.ty,
                })?;
                self.store_at(index, zero);
                Ok(())
            }
        }
    }

    /// Store a scalar value and notify observers unless destroyed
    fn store_at(&mut self, index: usize, value: FieldValue) {
        let field = &self.schema.fields()[index];
        let old = std::mem::replace(&mut self.slots[index].value, value);
        self.notify_write(index, field, &old);
    }

    fn notify_write(&self, index: usize, field: &FieldDescriptor, old: &FieldValue) {
        if self.destroyed {
            return;
        }
        if let Some(observer) = &self.on_write {
            observer(self, field.name);
        }
        let tracked = self.slots[index].meta & super::STATS_TRACK_BIT != 0
            || field.flags.is_statistics();
        if tracked {
            if let Some(observer) = &self.on_stats {
                observer(self, field.name, old, &self.slots[index].value);
            }
        }
    }

    fn collection_at(&self, index: usize) -> Collection {
        match &self.slots[index].value {
            FieldValue::List(c) | FieldValue::Iterator(c) => c.clone(),
            _ => Collection::new(),
        }
    }

    // ==================== TYPED GETTERS ====================

    fn typed<T>(
        &self,
        name: &str,
        expected: FieldType,
        extract: impl FnOnce(&FieldValue) -> Option<T>,
    ) -> RecordResult<T> {
        let value = self.read(name)?;
        let found = value.field_type();
        if found != expected {
            warn!(
                field = name,
                expected = %expected,
                found = %found,
                "Typed read against a field of a different type"
            );
        }
        extract(&value).ok_or_else(|| RecordError::TypeMismatch {
            field: name.to_string(),
            expected,
            found,
        })
    }

    pub fn get_i32(&self, name: &str) -> RecordResult<i32> {
        self.typed(name, FieldType::Int32, |v| v.as_i64().map(|v| v as i32))
    }

    pub fn get_u32(&self, name: &str) -> RecordResult<u32> {
        self.typed(name, FieldType::UInt32, |v| v.as_u64().map(|v| v as u32))
    }

    pub fn get_i64(&self, name: &str) -> RecordResult<i64> {
        self.typed(name, FieldType::Int64, FieldValue::as_i64)
    }

    pub fn get_u64(&self, name: &str) -> RecordResult<u64> {
        self.typed(name, FieldType::UInt64, FieldValue::as_u64)
    }

    pub fn get_f32(&self, name: &str) -> RecordResult<f32> {
        self.typed(name, FieldType::Float, |v| v.as_f64().map(|v| v as f32))
    }

    pub fn get_f64(&self, name: &str) -> RecordResult<f64> {
        self.typed(name, FieldType::Double, FieldValue::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> RecordResult<bool> {
        self.typed(name, FieldType::Bool, FieldValue::as_bool)
    }

    /// Get a string field (`None` when unset)
    pub fn get_str(&self, name: &str) -> RecordResult<Option<String>> {
        self.typed(name, FieldType::String, |v| match v {
            FieldValue::String(s) => Some(s.clone()),
            other => other.scalar_text().map(Some),
        })
    }

    /// Get a JSON field as a shared handle (`None` when unset)
    pub fn get_json(&self, name: &str) -> RecordResult<Option<Rc<Value>>> {
        self.typed(name, FieldType::Json, |v| match v {
            FieldValue::Json(j) => Some(j.clone()),
            _ => None,
        })
    }

    pub fn get_pointer(&self, name: &str) -> RecordResult<*mut c_void> {
        self.typed(name, FieldType::Pointer, |v| match v {
            FieldValue::Pointer(p) => Some(*p),
            _ => None,
        })
    }

    /// Get the live collection behind a list or iterator field
    pub fn get_collection(&self, name: &str) -> RecordResult<Collection> {
        let value = self.read(name)?;
        match value {
            FieldValue::List(c) | FieldValue::Iterator(c) => Ok(c),
            other => {
                warn!(field = name, found = %other.field_type(), "Field is not a collection");
                Err(RecordError::TypeMismatch {
                    field: name.to_string(),
                    expected: FieldType::List,
                    found: other.field_type(),
                })
            }
        }
    }

    /// Get the record linked from a nested resource/command/auth field
    pub fn get_nested(&self, name: &str) -> RecordResult<Option<RecordRef>> {
        let value = self.read(name)?;
        match value {
            FieldValue::Nested(_, linked) => Ok(linked),
            other => Err(RecordError::TypeMismatch {
                field: name.to_string(),
                expected: FieldType::Resource,
                found: other.field_type(),
            }),
        }
    }

    /// Link a record into a nested field without notifying observers
    pub fn set_nested(&mut self, name: &str, linked: Option<RecordRef>) -> RecordResult<()> {
        let (index, field) = self.resolve(name)?;
        if !field.ty.is_nested() {
            warn!(field = field.name, ty = %field.ty, "Field is not a nested marker");
            return Err(RecordError::Unsupported {
                field: field.name.to_string(),
                ty: field.ty,
            });
        }
        self.slots[index].value = FieldValue::Nested(field.ty, linked);
        Ok(())
    }

    // ==================== TYPED SETTERS ====================

    pub fn set_i32(&mut self, name: &str, value: i32) -> RecordResult<()> {
        self.write(name, FieldValue::Int32(value)).map(drop)
    }

    pub fn set_u32(&mut self, name: &str, value: u32) -> RecordResult<()> {
        self.write(name, FieldValue::UInt32(value)).map(drop)
    }

    pub fn set_i64(&mut self, name: &str, value: i64) -> RecordResult<()> {
        self.write(name, FieldValue::Int64(value)).map(drop)
    }

    pub fn set_u64(&mut self, name: &str, value: u64) -> RecordResult<()> {
        self.write(name, FieldValue::UInt64(value)).map(drop)
    }

    pub fn set_f32(&mut self, name: &str, value: f32) -> RecordResult<()> {
        self.write(name, FieldValue::Float(value)).map(drop)
    }

    pub fn set_f64(&mut self, name: &str, value: f64) -> RecordResult<()> {
        self.write(name, FieldValue::Double(value)).map(drop)
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> RecordResult<()> {
        self.write(name, FieldValue::Bool(value)).map(drop)
    }

    /// Set a string field; the record keeps its own copy
    pub fn set_str<'a>(&mut self, name: &str, value: impl Into<Option<&'a str>>) -> RecordResult<()> {
        let value = value.into().map(str::to_owned);
        self.write(name, FieldValue::String(value)).map(drop)
    }

    /// Set a JSON field; the record retains its own share of `value`
    pub fn set_json(&mut self, name: &str, value: &Rc<Value>) -> RecordResult<()> {
        self.write(name, FieldValue::Json(Some(Rc::clone(value)))).map(drop)
    }

    /// Set a pointer field; the record never frees it
    pub fn set_pointer(&mut self, name: &str, value: *mut c_void) -> RecordResult<()> {
        self.write(name, FieldValue::Pointer(value)).map(drop)
    }
}

/// Type-check (and if needed convert) a value about to be written
fn admit(field: &FieldDescriptor, value: FieldValue) -> RecordResult<FieldValue> {
    match field.ty {
        FieldType::List
        | FieldType::Iterator
        | FieldType::Resource
        | FieldType::Command
        | FieldType::Auth
        | FieldType::Sentinel => {
            warn!(field = field.name, ty = %field.ty, "Write to a field kind that cannot be written");
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
        | FieldType::String
        | FieldType::Json
        | FieldType::Pointer => {
            let found = value.field_type();
            if found == field.ty {
                return Ok(value);
            }
            match value.coerce(field.ty) {
                Some(converted) => {
                    warn!(
                        field = field.name,
                        expected = %field.ty,
                        found = %found,
                        "Write converted to the field type"
                    );
                    Ok(converted)
                }
                None => {
                    warn!(
                        field = field.name,
                        expected = %field.ty,
                        found = %found,
                        "Write rejected: incompatible value"
                    );
                    Err(RecordError::TypeMismatch {
                        field: field.name.to_string(),
                        expected: field.ty,
                        found,
                    })
                }
            }
        }
    }
}

/// Release every element of a collection field
fn release_children(field: &FieldDescriptor, collection: &Collection) {
    for child in collection.take_all() {
        if let Some(free) = field.free_fn {
            free(child);
        } else if field.flags.contains(FieldFlags::PURE_CHILD) {
            match child.try_borrow_mut() {
                Ok(mut record) if !record.is_destroyed() => {
                    let _ = record.destroy();
                }
                Ok(_) => {}
                Err(_) => warn!(field = field.name, "Pure child is borrowed; left to its owner"),
            }
        }
    }
}
