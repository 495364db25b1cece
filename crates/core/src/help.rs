//! Command and authorization descriptor documents
//!
//! Renders schemas into the JSON consumed by help output:
//!
//! ```json
//! [
//!     {
//!         "id": "reload",
//!         "alias": ["r"],
//!         "description": "Reload the configuration",
//!         "flag": "writable|requires-execute-authorization",
//!         "parameters": [
//!             {"id": "path", "type": "string", "description": "", "flag": "required"}
//!         ]
//!     }
//! ]
//! ```

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::record::default_json;
use crate::schema::{FieldDescriptor, FieldFlags, FieldType, Schema};

/// Pipe-joined lowercase flag names, in bit order
pub fn render_flags(flags: FieldFlags) -> String {
    flags
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase().replace('_', "-"))
        .collect::<Vec<_>>()
        .join("|")
}

/// One descriptor object per field of `schema`
pub fn describe_parameters(schema: &Schema) -> Value {
    Value::Array(schema.fields().iter().map(describe_parameter).collect())
}

/// Descriptor array for the command and auth fields of `schema`
///
/// Each command's parameters come from the field's child schema. `include`
/// filters which commands are listed ([`FieldFlags::all()`] lists every one).
pub fn describe_commands(schema: &Schema, include: FieldFlags) -> Value {
    let commands: Vec<Value> = schema
        .fields()
        .iter()
        .filter(|field| matches!(field.ty, FieldType::Command | FieldType::Auth))
        .filter(|field| field.flags.passes(include, FieldFlags::empty()))
        .map(describe_command)
        .collect();
    debug!(schema = schema.name(), commands = commands.len(), "Commands described");
    Value::Array(commands)
}

fn describe_command(field: &FieldDescriptor) -> Value {
    let mut object = Map::new();
    object.insert("id".into(), json!(field.name));
    if !field.aliases.is_empty() {
        object.insert("alias".into(), json!(field.aliases));
    }
    object.insert("description".into(), json!(field.description));
    object.insert("flag".into(), json!(render_flags(field.flags)));
    let parameters = field
        .schema
        .map(describe_parameters)
        .unwrap_or_else(|| Value::Array(Vec::new()));
    object.insert("parameters".into(), parameters);
    Value::Object(object)
}

fn describe_parameter(field: &FieldDescriptor) -> Value {
    let mut object = Map::new();
    object.insert("id".into(), json!(field.name));
    object.insert("type".into(), json!(field.ty.name()));
    if let Some(default) = default_json(&field.default) {
        object.insert("default_value".into(), default);
    }
    object.insert("description".into(), json!(field.description));
    object.insert("flag".into(), json!(render_flags(field.flags)));
    Value::Object(object)
}
