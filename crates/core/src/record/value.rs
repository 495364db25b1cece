//! Field values
//!
//! `FieldValue` is the sum type every dispatch operation matches on. Owned
//! kinds carry their owned payload (`String`, `Rc<serde_json::Value>`); the
//! pointer kind carries a raw pointer the record never frees; collection
//! kinds carry a shared [`Collection`] handle.

use std::ffi::c_void;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::warn;

use super::RecordRef;
use crate::collection::Collection;
use crate::schema::{DefaultValue, FieldType};

/// A value stored in (or destined for) one record field
#[derive(Clone)]
pub enum FieldValue {
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(Option<String>),
    Json(Option<Rc<Value>>),
    Pointer(*mut c_void),
    List(Collection),
    Iterator(Collection),
    /// Resource, command and auth markers
    Nested(FieldType, Option<RecordRef>),
}

impl FieldValue {
    /// The field type this value naturally belongs to
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int32(_) => FieldType::Int32,
            Self::UInt32(_) => FieldType::UInt32,
            Self::Int64(_) => FieldType::Int64,
            Self::UInt64(_) => FieldType::UInt64,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
            Self::Bool(_) => FieldType::Bool,
            Self::String(_) => FieldType::String,
            Self::Json(_) => FieldType::Json,
            Self::Pointer(_) => FieldType::Pointer,
            Self::List(_) => FieldType::List,
            Self::Iterator(_) => FieldType::Iterator,
            Self::Nested(ty, _) => *ty,
        }
    }

    /// Zero value for a type; `None` for the sentinel
    pub fn zero(ty: FieldType) -> Option<Self> {
        Some(match ty {
            FieldType::Int32 => Self::Int32(0),
            FieldType::UInt32 => Self::UInt32(0),
            FieldType::Int64 => Self::Int64(0),
            FieldType::UInt64 => Self::UInt64(0),
            FieldType::Float => Self::Float(0.0),
            FieldType::Double => Self::Double(0.0),
            FieldType::Bool => Self::Bool(false),
            FieldType::String => Self::String(None),
            FieldType::Json => Self::Json(None),
            FieldType::Pointer => Self::Pointer(std::ptr::null_mut()),
            FieldType::List => Self::List(Collection::new()),
            FieldType::Iterator => Self::Iterator(Collection::new()),
            FieldType::Resource | FieldType::Command | FieldType::Auth => Self::Nested(ty, None),
            FieldType::Sentinel => return None,
        })
    }

    /// Build the value a declared default produces for a type
    ///
    /// Defaults that do not fit the type are converted best-effort and logged.
    /// Collection and nested kinds always start empty.
    pub fn from_default(field: &str, ty: FieldType, default: &DefaultValue) -> Option<Self> {
        let zero = Self::zero(ty)?;
        let value = match (ty, default) {
            (_, DefaultValue::None) => zero,
            (FieldType::List | FieldType::Iterator, _)
            | (FieldType::Resource | FieldType::Command | FieldType::Auth, _)
            | (FieldType::Pointer, _) => {
                warn!(field, ty = %ty, ?default, "Default ignored for non-scalar field");
                zero
            }
            (FieldType::String, DefaultValue::Str(s)) => Self::String(Some((*s).to_string())),
            (FieldType::String, other) => Self::String(default_text(other)),
            (FieldType::Json, DefaultValue::Json(text) | DefaultValue::Str(text)) => {
                match serde_json::from_str::<Value>(text) {
                    Ok(parsed) => Self::Json(Some(Rc::new(parsed))),
                    Err(e) => {
                        warn!(field, error = %e, "Default is not valid JSON");
                        zero
                    }
                }
            }
            (FieldType::Json, other) => Self::Json(default_json(other).map(Rc::new)),
            (_, DefaultValue::Int(v)) => Self::Int64(*v).coerce(ty).unwrap_or(zero),
            (_, DefaultValue::UInt(v)) => Self::UInt64(*v).coerce(ty).unwrap_or(zero),
            (_, DefaultValue::Float(v)) => Self::Double(*v).coerce(ty).unwrap_or(zero),
            (_, DefaultValue::Bool(v)) => Self::Bool(*v).coerce(ty).unwrap_or(zero),
            (_, DefaultValue::Str(s) | DefaultValue::Json(s)) => {
                match Self::String(Some((*s).to_string())).coerce(ty) {
                    Some(v) => v,
                    None => {
                        warn!(field, ty = %ty, default = *s, "Default does not parse for field type");
                        zero
                    }
                }
            }
        };
        Some(value)
    }

    /// Best-effort conversion to another scalar type
    ///
    /// Numeric and boolean kinds convert among each other with `as`
    /// semantics; strings parse into numbers and booleans. Returns `None`
    /// when no meaningful conversion exists.
    pub fn coerce(self, ty: FieldType) -> Option<Self> {
        if self.field_type() == ty {
            return Some(self);
        }
        match ty {
            FieldType::Int32 => self.as_i64().map(|v| Self::Int32(v as i32)),
            FieldType::UInt32 => self.as_u64().map(|v| Self::UInt32(v as u32)),
            FieldType::Int64 => self.as_i64().map(Self::Int64),
            FieldType::UInt64 => self.as_u64().map(Self::UInt64),
            FieldType::Float => self.as_f64().map(|v| Self::Float(v as f32)),
            FieldType::Double => self.as_f64().map(Self::Double),
            FieldType::Bool => self.as_bool().map(Self::Bool),
            FieldType::String => self.scalar_text().map(|s| Self::String(Some(s))),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(v) => Some(*v as i64),
            Self::UInt32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => Some(*v as i64),
            Self::Float(v) => Some(*v as i64),
            Self::Double(v) => Some(*v as i64),
            Self::Bool(v) => Some(*v as i64),
            Self::String(Some(s)) => parse_i64(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int32(v) => Some(*v as u64),
            Self::UInt32(v) => Some(*v as u64),
            Self::Int64(v) => Some(*v as u64),
            Self::UInt64(v) => Some(*v),
            Self::Float(v) => Some(*v as u64),
            Self::Double(v) => Some(*v as u64),
            Self::Bool(v) => Some(*v as u64),
            Self::String(Some(s)) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| parse_i64(s).map(|v| v as u64))
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int32(v) => Some(*v as f64),
            Self::UInt32(v) => Some(*v as f64),
            Self::Int64(v) => Some(*v as f64),
            Self::UInt64(v) => Some(*v as f64),
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::String(Some(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::String(Some(s)) => parse_bool(s),
            Self::Float(v) => Some(*v != 0.0),
            Self::Double(v) => Some(*v != 0.0),
            other => other.as_i64().map(|v| v != 0),
        }
    }

    /// Text form of a scalar value; `None` for null strings and non-scalars
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Int32(v) => Some(v.to_string()),
            Self::UInt32(v) => Some(v.to_string()),
            Self::Int64(v) => Some(v.to_string()),
            Self::UInt64(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Double(v) => Some(v.to_string()),
            Self::Bool(v) => Some(v.to_string()),
            Self::String(s) => s.clone(),
            _ => None,
        }
    }

    /// Compare against a key given as text, using the value's own type
    ///
    /// Strings compare case-insensitively and verbatim; numbers parse the
    /// trimmed key at the field's full width. A key that does not parse
    /// matches nothing.
    pub fn matches_key(&self, key: &str) -> bool {
        if let Self::String(Some(s)) = self {
            return s.eq_ignore_ascii_case(key);
        }
        let key = key.trim();
        match self {
            Self::Int32(v) => key.parse::<i32>().is_ok_and(|k| k == *v),
            Self::UInt32(v) => key.parse::<u32>().is_ok_and(|k| k == *v),
            Self::Int64(v) => key.parse::<i64>().is_ok_and(|k| k == *v),
            Self::UInt64(v) => key.parse::<u64>().is_ok_and(|k| k == *v),
            Self::Float(v) => key.parse::<f32>().is_ok_and(|k| k == *v),
            Self::Double(v) => key.parse::<f64>().is_ok_and(|k| k == *v),
            Self::Bool(v) => parse_bool(key) == Some(*v),
            _ => false,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::UInt32(a), Self::UInt32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::UInt64(a), Self::UInt64(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Pointer(a), Self::Pointer(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Iterator(a), Self::Iterator(b)) => a.ptr_eq(b),
            (Self::Nested(ta, a), Self::Nested(tb, b)) => {
                ta == tb
                    && match (a, b) {
                        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                        (None, None) => true,
                        _ => false,
                    }
            }
            _ => false,
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32(v) => write!(f, "Int32({v})"),
            Self::UInt32(v) => write!(f, "UInt32({v})"),
            Self::Int64(v) => write!(f, "Int64({v})"),
            Self::UInt64(v) => write!(f, "UInt64({v})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Double(v) => write!(f, "Double({v})"),
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::String(v) => write!(f, "String({v:?})"),
            Self::Json(v) => write!(f, "Json({:?})", v.as_deref()),
            Self::Pointer(p) => write!(f, "Pointer({p:p})"),
            Self::List(c) => write!(f, "List({c:?})"),
            Self::Iterator(c) => write!(f, "Iterator({c:?})"),
            Self::Nested(ty, r) => write!(f, "Nested({ty}, set={})", r.is_some()),
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(Some(v.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(Some(v))
    }
}

impl From<Rc<Value>> for FieldValue {
    fn from(v: Rc<Value>) -> Self {
        Self::Json(Some(v))
    }
}

fn parse_i64(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if ["true", "yes", "on", "1"].iter().any(|t| s.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if ["false", "no", "off", "0"].iter().any(|t| s.eq_ignore_ascii_case(t)) {
        Some(false)
    } else {
        None
    }
}

fn default_text(default: &DefaultValue) -> Option<String> {
    match default {
        DefaultValue::None => None,
        DefaultValue::Int(v) => Some(v.to_string()),
        DefaultValue::UInt(v) => Some(v.to_string()),
        DefaultValue::Float(v) => Some(v.to_string()),
        DefaultValue::Bool(v) => Some(v.to_string()),
        DefaultValue::Str(s) | DefaultValue::Json(s) => Some((*s).to_string()),
    }
}

/// JSON rendering of a declared default, as used in descriptor documents
pub(crate) fn default_json(default: &DefaultValue) -> Option<Value> {
    match default {
        DefaultValue::None => None,
        DefaultValue::Int(v) => Some(Value::from(*v)),
        DefaultValue::UInt(v) => Some(Value::from(*v)),
        DefaultValue::Float(v) => serde_json::Number::from_f64(*v).map(Value::Number),
        DefaultValue::Bool(v) => Some(Value::Bool(*v)),
        DefaultValue::Str(s) => Some(Value::String((*s).to_string())),
        DefaultValue::Json(text) => Some(
            serde_json::from_str(text).unwrap_or_else(|_| Value::String((*text).to_string())),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert_eq!(FieldValue::zero(FieldType::Int32), Some(FieldValue::Int32(0)));
        assert_eq!(FieldValue::zero(FieldType::String), Some(FieldValue::String(None)));
        assert!(FieldValue::zero(FieldType::Sentinel).is_none());
        assert_eq!(
            FieldValue::zero(FieldType::Command).map(|v| v.field_type()),
            Some(FieldType::Command)
        );
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(
            FieldValue::Int64(-1).coerce(FieldType::Int32),
            Some(FieldValue::Int32(-1))
        );
        assert_eq!(
            FieldValue::Bool(true).coerce(FieldType::UInt64),
            Some(FieldValue::UInt64(1))
        );
        assert_eq!(
            FieldValue::from("42").coerce(FieldType::Int32),
            Some(FieldValue::Int32(42))
        );
        assert_eq!(FieldValue::from("abc").coerce(FieldType::Int32), None);
        assert_eq!(FieldValue::Pointer(std::ptr::null_mut()).coerce(FieldType::Int32), None);
    }

    #[test]
    fn test_coerce_to_string() {
        assert_eq!(
            FieldValue::UInt32(7).coerce(FieldType::String),
            Some(FieldValue::from("7"))
        );
    }

    #[test]
    fn test_from_default() {
        assert_eq!(
            FieldValue::from_default("f", FieldType::UInt32, &DefaultValue::UInt(9)),
            Some(FieldValue::UInt32(9))
        );
        assert_eq!(
            FieldValue::from_default("f", FieldType::String, &DefaultValue::Str("x")),
            Some(FieldValue::from("x"))
        );
        assert_eq!(
            FieldValue::from_default("f", FieldType::Int32, &DefaultValue::Str("-5")),
            Some(FieldValue::Int32(-5))
        );
        assert_eq!(
            FieldValue::from_default("f", FieldType::Int32, &DefaultValue::Str("nope")),
            Some(FieldValue::Int32(0))
        );
        let json = FieldValue::from_default("f", FieldType::Json, &DefaultValue::Json("[1,2]"));
        assert_eq!(
            json,
            Some(FieldValue::Json(Some(Rc::new(serde_json::json!([1, 2])))))
        );
    }

    #[test]
    fn test_matches_key() {
        assert!(FieldValue::from("Alpha").matches_key("alpha"));
        assert!(!FieldValue::from("Alpha").matches_key("beta"));
        assert!(FieldValue::UInt64(u64::MAX).matches_key(&u64::MAX.to_string()));
        assert!(!FieldValue::UInt64(1).matches_key("x"));
        assert!(FieldValue::Int32(-3).matches_key(" -3 "));
        assert!(!FieldValue::String(None).matches_key(""));
        assert!(FieldValue::from(" x1").matches_key(" X1"));
        assert!(!FieldValue::from("x1").matches_key(" x1"));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
