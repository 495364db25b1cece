//! Layout calculator
//!
//! Packs each field as a metadata word followed by its storage, in schema
//! order. The result is computed once per schema and cached; see
//! [`Schema::layout`](super::Schema::layout).

use std::collections::HashMap;

use tracing::{debug, error};

use super::hash::name_key;
use super::{FieldDescriptor, FieldFlags};

/// Size of the per-field metadata word
pub const METADATA_WORD_SIZE: usize = std::mem::size_of::<u32>();

/// Error type for schema layout
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Unknown type for field: {0}")]
    UnknownType(String),

    #[error("Duplicate field name in {schema}: {field}")]
    DuplicateField { schema: String, field: String },

    #[error("Schema {schema} declares more than one primary key: {first}, {second}")]
    DuplicatePrimaryKey {
        schema: String,
        first: String,
        second: String,
    },
}

/// Computed placement of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    /// Byte position of the field storage, just past its metadata word
    pub offset: usize,
    /// Metadata word plus storage
    pub length: usize,
    /// 1-based position in the schema
    pub ordinal: usize,
}

/// Computed layout of a whole schema
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    fields: Vec<FieldLayout>,
    size: usize,
    index: HashMap<u64, usize>,
    primary_key: Option<usize>,
}

impl Layout {
    /// Total record size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Per-field layouts in schema order
    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    /// Layout of the field at a 0-based index
    pub fn field(&self, index: usize) -> Option<&FieldLayout> {
        self.fields.get(index)
    }

    /// 0-based index of the primary key field
    pub fn primary_key(&self) -> Option<usize> {
        self.primary_key
    }

    /// Candidate 0-based index for a name or alias; callers verify the name
    pub(crate) fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(&name_key(name)).copied()
    }
}

/// Compute the layout for a list of fields (already cut at the sentinel)
pub fn compute_layout(schema_name: &str, fields: &[FieldDescriptor]) -> Result<Layout, SchemaError> {
    let mut layouts = Vec::with_capacity(fields.len());
    let mut index: HashMap<u64, usize> = HashMap::with_capacity(fields.len());
    let mut primary_key: Option<usize> = None;
    let mut offset = 0usize;

    for (i, field) in fields.iter().enumerate() {
        let Some(storage) = field.ty.storage_size() else {
            error!(
                schema = schema_name,
                field = field.name,
                ty = ?field.ty,
                "Unrecognized field type in schema"
            );
            return Err(SchemaError::UnknownType(field.name.to_string()));
        };

        offset += METADATA_WORD_SIZE;
        layouts.push(FieldLayout {
            offset,
            length: METADATA_WORD_SIZE + storage,
            ordinal: i + 1,
        });
        offset += storage;

        for name in std::iter::once(&field.name).chain(field.aliases.iter()) {
            match index.get(&name_key(name)) {
                Some(&existing) if fields[existing].answers_to(name) => {
                    error!(schema = schema_name, field = *name, "Duplicate field name");
                    return Err(SchemaError::DuplicateField {
                        schema: schema_name.to_string(),
                        field: name.to_string(),
                    });
                }
                // Hash collision between distinct names: lookups fall back to a scan
                Some(_) => {}
                None => {
                    index.insert(name_key(name), i);
                }
            }
        }

        if field.flags.contains(FieldFlags::PRIMARY_KEY) {
            if let Some(first) = primary_key {
                error!(
                    schema = schema_name,
                    first = fields[first].name,
                    second = field.name,
                    "More than one primary key"
                );
                return Err(SchemaError::DuplicatePrimaryKey {
                    schema: schema_name.to_string(),
                    first: fields[first].name.to_string(),
                    second: field.name.to_string(),
                });
            }
            primary_key = Some(i);
        }
    }

    debug!(
        schema = schema_name,
        fields = layouts.len(),
        size = offset,
        "Computed schema layout"
    );

    Ok(Layout {
        fields: layouts,
        size: offset,
        index,
        primary_key,
    })
}

/// Length of the field list before the first sentinel
pub(crate) fn effective_len(fields: &[FieldDescriptor]) -> usize {
    fields
        .iter()
        .position(|f| f.name.is_empty())
        .unwrap_or(fields.len())
}
