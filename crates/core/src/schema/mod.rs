//! Schema System - static field descriptors and their computed layout
//!
//! A [`Schema`] is an ordered, immutable list of [`FieldDescriptor`]s that
//! describes one record shape. Schemas are normally declared as statics and
//! shared by every record created from them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  static FIELDS: &[FieldDescriptor]   (caller-owned, const)  │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  static SCHEMA: Schema                                      │
//! │   - layout(): OnceLock<Layout>, computed on first record    │
//! │   - offsets / lengths / ordinals per field                  │
//! │   - case-insensitive name + alias index (FNV-1a)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use resrec_core::schema::{DefaultValue, FieldDescriptor, FieldFlags, FieldType, Schema};
//!
//! static USER_FIELDS: &[FieldDescriptor] = &[
//!     FieldDescriptor::new(FieldType::String, "id", FieldFlags::PRIMARY_KEY),
//!     FieldDescriptor::new(FieldType::UInt32, "logins", FieldFlags::PERSIST)
//!         .with_default(DefaultValue::UInt(0)),
//! ];
//!
//! static USER: Schema = Schema::new("user", USER_FIELDS);
//! ```

pub mod hash;
pub mod layout;
pub mod types;

use std::sync::OnceLock;

use tracing::trace;

pub use hash::fnv1a_64_nocase;
pub use layout::{compute_layout, FieldLayout, Layout, SchemaError, METADATA_WORD_SIZE};
pub use types::{DefaultValue, DisplayMeta, FieldFlags, FieldType};

use crate::record::RecordRef;

/// Release hook for the contents of a list or iterator field
pub type FreeFn = fn(RecordRef);

/// One schema entry
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub ty: FieldType,
    pub name: &'static str,
    pub flags: FieldFlags,
    pub default: DefaultValue,
    pub description: &'static str,
    pub aliases: &'static [&'static str],
    /// Schema of child records (list/iterator) or of the nested descriptor
    pub schema: Option<&'static Schema>,
    pub free_fn: Option<FreeFn>,
    pub display: Option<DisplayMeta>,
}

impl FieldDescriptor {
    /// Terminator entry; everything after it is ignored
    pub const SENTINEL: Self = Self::new(FieldType::Sentinel, "", FieldFlags::empty());

    pub const fn new(ty: FieldType, name: &'static str, flags: FieldFlags) -> Self {
        Self {
            ty,
            name,
            flags,
            default: DefaultValue::None,
            description: "",
            aliases: &[],
            schema: None,
            free_fn: None,
            display: None,
        }
    }

    pub const fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = default;
        self
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub const fn with_schema(mut self, schema: &'static Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub const fn with_free_fn(mut self, free_fn: FreeFn) -> Self {
        self.free_fn = Some(free_fn);
        self
    }

    pub const fn with_display(mut self, header: &'static str, width: u16) -> Self {
        self.display = Some(DisplayMeta { header, width });
        self
    }

    /// Case-insensitive match against the name or any alias
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags.contains(FieldFlags::PRIMARY_KEY)
    }

    pub fn is_persistent(&self) -> bool {
        self.flags.contains(FieldFlags::PERSIST)
    }
}

/// An immutable record shape
///
/// The layout is computed lazily on first use and cached in a `OnceLock`,
/// so every record created from the same schema shares one layout.
#[derive(Debug)]
pub struct Schema {
    name: &'static str,
    fields: &'static [FieldDescriptor],
    layout: OnceLock<Layout>,
}

impl Schema {
    /// Create a schema
    ///
    /// Fields after the first sentinel (empty name) are ignored. Nothing is
    /// validated until [`layout`](Self::layout) is first called.
    pub const fn new(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self {
            name,
            fields,
            layout: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fields up to (not including) the sentinel
    pub fn fields(&self) -> &'static [FieldDescriptor] {
        &self.fields[..layout::effective_len(self.fields)]
    }

    /// Resolve the layout (cached after first successful call)
    pub fn layout(&self) -> Result<&Layout, SchemaError> {
        if let Some(layout) = self.layout.get() {
            return Ok(layout);
        }

        let computed = compute_layout(self.name, self.fields())?;
        trace!(schema = self.name, size = computed.size(), "Caching schema layout");

        // Another caller may have won the race; either layout is identical
        Ok(self.layout.get_or_init(|| computed))
    }

    /// Check if the layout has been computed
    pub fn is_resolved(&self) -> bool {
        self.layout.get().is_some()
    }

    /// Find a field by name or alias, case-insensitively
    ///
    /// Returns the 0-based index and the descriptor.
    pub fn field(&self, name: &str) -> Option<(usize, &'static FieldDescriptor)> {
        let fields = self.fields();
        if let Ok(layout) = self.layout() {
            if let Some(i) = layout.lookup(name) {
                if fields[i].answers_to(name) {
                    return Some((i, &fields[i]));
                }
            }
        }
        fields.iter().enumerate().find(|(_, f)| f.answers_to(name))
    }

    /// The primary key descriptor, if the schema declares one
    pub fn primary_key(&self) -> Option<(usize, &'static FieldDescriptor)> {
        let fields = self.fields();
        fields.iter().enumerate().find(|(_, f)| f.is_primary_key())
    }

    /// Total record size in bytes (0 when the layout is invalid)
    pub fn size(&self) -> usize {
        self.layout().map(|l| l.size()).unwrap_or(0)
    }
}
