//! JSON bridge
//!
//! Converts records and single fields to `serde_json::Value` and back.
//! Output is filtered by an include and an exclude flag mask (see
//! [`FieldFlags::passes`]). Child collections render as arrays of the
//! children's primary keys unless the explicit `*_nested` forms are used.
//! Nested rendering shows a record already on the current path by its
//! primary key, so cyclic links terminate.

mod load;

use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

pub use load::bulk_load;

use crate::record::{FieldValue, Record, RecordError, RecordRef, RecordResult};
use crate::schema::{FieldDescriptor, FieldFlags};

/// How child records of collection fields are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Children {
    /// Primary key of each child
    Keys,
    /// Full filtered object of each child
    Nested {
        include: FieldFlags,
        exclude: FieldFlags,
    },
}

/// Name of a JSON value's kind, for diagnostics
pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Record {
    /// Render one field
    ///
    /// Collection fields render as arrays of their children's primary keys.
    /// Values with no JSON form render as `null`. The flags filter what
    /// [`field_to_json_nested`](Self::field_to_json_nested) shows of children;
    /// here they only gate the named field itself.
    pub fn field_to_json(&self, name: &str, include: FieldFlags, exclude: FieldFlags) -> Value {
        self.render_field(name, include, exclude, Children::Keys, &mut Vec::new())
    }

    /// Render one field, expanding collection children into full objects
    pub fn field_to_json_nested(
        &self,
        name: &str,
        include: FieldFlags,
        exclude: FieldFlags,
    ) -> Value {
        let mut path = vec![self as *const Record];
        self.render_field(name, include, exclude, Children::Nested { include, exclude }, &mut path)
    }

    /// Render every field that passes the filter into an object
    pub fn to_json(&self, include: FieldFlags, exclude: FieldFlags) -> Value {
        self.render(include, exclude, Children::Keys, &mut Vec::new())
    }

    /// Like [`to_json`](Self::to_json), expanding children into full objects
    pub fn to_json_nested(&self, include: FieldFlags, exclude: FieldFlags) -> Value {
        let mut path = vec![self as *const Record];
        self.render(include, exclude, Children::Nested { include, exclude }, &mut path)
    }

    /// Render only the named fields (subject to the same filter)
    ///
    /// Fails without partial output if any name is not in the schema.
    pub fn to_json_keys(
        &self,
        include: FieldFlags,
        exclude: FieldFlags,
        keys: &[&str],
    ) -> RecordResult<Value> {
        let schema = self.schema();
        let mut fields = Vec::with_capacity(keys.len());
        for key in keys {
            match schema.field(key) {
                Some((_, field)) => fields.push(field),
                None => {
                    warn!(schema = schema.name(), field = *key, "Requested key not in schema");
                    return Err(RecordError::UnknownField(key.to_string()));
                }
            }
        }

        let mut map = Map::new();
        for field in fields {
            if field.flags.passes(include, exclude) {
                let value = self.render_value(field, Children::Keys, &mut Vec::new());
                map.insert(field.name.to_string(), value);
            }
        }
        Ok(Value::Object(map))
    }

    /// Primary key value as JSON (`null` when there is none)
    pub fn primary_key_json(&self) -> Value {
        match self.schema().primary_key() {
            Some((_, field)) => self.render_value(field, Children::Keys, &mut Vec::new()),
            None => Value::Null,
        }
    }

    /// `path` holds the records being rendered above this one
    fn render(
        &self,
        include: FieldFlags,
        exclude: FieldFlags,
        children: Children,
        path: &mut Vec<*const Record>,
    ) -> Value {
        let mut map = Map::new();
        for field in self.schema().fields() {
            if field.flags.passes(include, exclude) {
                map.insert(field.name.to_string(), self.render_value(field, children, path));
            }
        }
        Value::Object(map)
    }

    fn render_field(
        &self,
        name: &str,
        include: FieldFlags,
        exclude: FieldFlags,
        children: Children,
        path: &mut Vec<*const Record>,
    ) -> Value {
        let Some((_, field)) = self.schema().field(name) else {
            warn!(schema = self.schema().name(), field = name, "Unknown field");
            return Value::Null;
        };
        if !field.flags.passes(include, exclude) {
            debug!(field = field.name, "Field filtered out");
            return Value::Null;
        }
        self.render_value(field, children, path)
    }

    fn render_value(
        &self,
        field: &FieldDescriptor,
        children: Children,
        path: &mut Vec<*const Record>,
    ) -> Value {
        let value = match self.read(field.name) {
            Ok(value) => value,
            Err(e) => {
                debug!(field = field.name, error = %e, "Field not readable; rendered as null");
                return Value::Null;
            }
        };

        match value {
            FieldValue::Int32(v) => Value::from(v),
            FieldValue::UInt32(v) => Value::from(v),
            FieldValue::Int64(v) => Value::from(v),
            FieldValue::UInt64(v) => Value::from(v),
            FieldValue::Float(v) => float(field, v as f64),
            FieldValue::Double(v) => float(field, v),
            FieldValue::Bool(v) => Value::Bool(v),
            FieldValue::String(s) => s.map(Value::String).unwrap_or(Value::Null),
            FieldValue::Json(j) => j.map(|j| (*j).clone()).unwrap_or(Value::Null),
            FieldValue::List(c) | FieldValue::Iterator(c) => Value::Array(
                c.iter()
                    .map(|child| render_child(field, &child, children, path))
                    .collect(),
            ),
            FieldValue::Nested(_, Some(child)) => render_child(field, &child, children, path),
            FieldValue::Nested(_, None) => {
                debug!(field = field.name, "No linked record; rendered as null");
                Value::Null
            }
            FieldValue::Pointer(_) => {
                warn!(field = field.name, "Pointer field has no JSON form");
                Value::Null
            }
        }
    }
}

fn float(field: &FieldDescriptor, v: f64) -> Value {
    match Number::from_f64(v) {
        Some(n) => Value::Number(n),
        None => {
            warn!(field = field.name, value = v, "Non-finite number rendered as null");
            Value::Null
        }
    }
}

fn render_child(
    field: &FieldDescriptor,
    child: &RecordRef,
    children: Children,
    path: &mut Vec<*const Record>,
) -> Value {
    let Ok(child) = child.try_borrow() else {
        warn!(field = field.name, "Child record is busy; rendered as null");
        return Value::Null;
    };
    let Children::Nested { include, exclude } = children else {
        return child.primary_key_json();
    };

    let address = &*child as *const Record;
    if path.contains(&address) {
        warn!(field = field.name, schema = child.schema().name(), "Cyclic link; rendered as key");
        return child.primary_key_json();
    }
    path.push(address);
    let rendered = child.render(include, exclude, children, path);
    path.pop();
    rendered
}

#[cfg(test)]
mod tests {
    use std::ffi::c_void;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::schema::{DefaultValue, FieldType, Schema};

    static CHILD_FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::new(FieldType::String, "id", FieldFlags::PRIMARY_KEY),
        FieldDescriptor::new(FieldType::UInt32, "weight", FieldFlags::PERSIST),
    ];
    static CHILD: Schema = Schema::new("child", CHILD_FIELDS);

    static FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::new(FieldType::String, "name", FieldFlags::PERSIST)
            .with_default(DefaultValue::Str("a")),
        FieldDescriptor::new(FieldType::Int32, "count", FieldFlags::PERSIST)
            .with_default(DefaultValue::Int(3)),
        FieldDescriptor::new(FieldType::Double, "ratio", FieldFlags::VOLATILE)
            .with_default(DefaultValue::Float(0.5)),
        FieldDescriptor::new(FieldType::Bool, "enabled", FieldFlags::WRITABLE),
        FieldDescriptor::new(FieldType::Json, "extra", FieldFlags::empty()),
        FieldDescriptor::new(FieldType::Pointer, "handle", FieldFlags::NOT_ACCESSIBLE),
        FieldDescriptor::new(FieldType::List, "children", FieldFlags::PURE_CHILD)
            .with_schema(&CHILD),
    ];
    static SCHEMA: Schema = Schema::new("json_test", FIELDS);

    static NODE_FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::new(FieldType::String, "id", FieldFlags::PRIMARY_KEY),
        FieldDescriptor::new(FieldType::List, "links", FieldFlags::FOREIGN_KEY)
            .with_schema(&NODE),
        FieldDescriptor::new(FieldType::Resource, "next", FieldFlags::FOREIGN_KEY)
            .with_schema(&NODE),
    ];
    static NODE: Schema = Schema::new("node", NODE_FIELDS);

    fn node(id: &str) -> RecordRef {
        let mut record = Record::new(&NODE).unwrap();
        record.set_str("id", id).unwrap();
        record.into_ref()
    }

    fn child(id: &str, weight: u32) -> RecordRef {
        let mut record = Record::new(&CHILD).unwrap();
        record.set_str("id", id).unwrap();
        record.set_u32("weight", weight).unwrap();
        record.into_ref()
    }

    #[test]
    fn test_persist_only() {
        let record = Record::new(&SCHEMA).unwrap();
        assert_eq!(
            record.to_json(FieldFlags::PERSIST, FieldFlags::empty()),
            json!({"name": "a", "count": 3})
        );
    }

    #[test]
    fn test_all_with_exclusion() {
        let record = Record::new(&SCHEMA).unwrap();
        let value = record.to_json(FieldFlags::all(), FieldFlags::NOT_ACCESSIBLE);
        assert_eq!(
            value,
            json!({
                "name": "a",
                "count": 3,
                "ratio": 0.5,
                "enabled": false,
                "extra": null,
                "children": []
            })
        );
    }

    #[test]
    fn test_children_render_as_keys() {
        let record = Record::new(&SCHEMA).unwrap();
        let children = record.get_collection("children").unwrap();
        children.push(child("x", 1));
        children.push(child("y", 2));

        assert_eq!(
            record.field_to_json("children", FieldFlags::all(), FieldFlags::empty()),
            json!(["x", "y"])
        );
        assert_eq!(
            record.field_to_json_nested("children", FieldFlags::all(), FieldFlags::empty()),
            json!([{"id": "x", "weight": 1}, {"id": "y", "weight": 2}])
        );
    }

    #[test]
    fn test_nested_self_link_renders_key() {
        let a = node("a");
        let links = a.borrow().get_collection("links").unwrap();
        links.push(Rc::clone(&a));

        assert_eq!(
            a.borrow().to_json_nested(FieldFlags::all(), FieldFlags::empty()),
            json!({"id": "a", "links": ["a"], "next": null})
        );
        assert_eq!(
            a.borrow().field_to_json_nested("links", FieldFlags::all(), FieldFlags::empty()),
            json!(["a"])
        );
        links.take_all();
    }

    #[test]
    fn test_nested_cycle_stops_at_repeat() {
        let a = node("a");
        let b = node("b");
        a.borrow_mut().set_nested("next", Some(Rc::clone(&b))).unwrap();
        b.borrow_mut().set_nested("next", Some(Rc::clone(&a))).unwrap();

        let value = a.borrow().to_json_nested(FieldFlags::all(), FieldFlags::empty());
        assert_eq!(
            value,
            json!({"id": "a", "links": [], "next": {"id": "b", "links": [], "next": "a"}})
        );

        // Shared but acyclic children still expand each time
        let c = node("c");
        a.borrow().get_collection("links").unwrap().push(Rc::clone(&c));
        a.borrow().get_collection("links").unwrap().push(Rc::clone(&c));
        assert_eq!(
            a.borrow().field_to_json_nested("links", FieldFlags::all(), FieldFlags::empty()),
            json!([
                {"id": "c", "links": [], "next": null},
                {"id": "c", "links": [], "next": null}
            ])
        );

        b.borrow_mut().set_nested("next", None).unwrap();
    }

    #[test]
    fn test_unlinked_nested_is_null() {
        let record = node("a");
        assert_eq!(
            record.borrow().field_to_json("next", FieldFlags::all(), FieldFlags::empty()),
            Value::Null
        );
    }

    #[test]
    fn test_json_field_rendered_as_value() {
        let mut record = Record::new(&SCHEMA).unwrap();
        record.set_json("extra", &Rc::new(json!({"k": [1, 2]}))).unwrap();
        assert_eq!(
            record.field_to_json("extra", FieldFlags::all(), FieldFlags::empty()),
            json!({"k": [1, 2]})
        );
    }

    #[test]
    fn test_pointer_renders_null() {
        let mut record = Record::new(&SCHEMA).unwrap();
        let mut target = 0u8;
        record
            .set_pointer("handle", &mut target as *mut u8 as *mut c_void)
            .unwrap();
        assert_eq!(
            record.field_to_json("handle", FieldFlags::all(), FieldFlags::empty()),
            Value::Null
        );
    }

    #[test]
    fn test_keys_subset() {
        let record = Record::new(&SCHEMA).unwrap();
        let value = record
            .to_json_keys(FieldFlags::all(), FieldFlags::empty(), &["COUNT", "enabled"])
            .unwrap();
        assert_eq!(value, json!({"count": 3, "enabled": false}));
    }

    #[test]
    fn test_keys_fail_atomically() {
        let record = Record::new(&SCHEMA).unwrap();
        let result = record.to_json_keys(FieldFlags::all(), FieldFlags::empty(), &["count", "zzz"]);
        assert!(matches!(result, Err(RecordError::UnknownField(k)) if k == "zzz"));
    }

    #[test]
    fn test_non_finite_float_is_null() {
        let mut record = Record::new(&SCHEMA).unwrap();
        record.set_f64("ratio", f64::NAN).unwrap();
        assert_eq!(
            record.field_to_json("ratio", FieldFlags::all(), FieldFlags::empty()),
            Value::Null
        );
    }
}
