//! Records - one instance of a schema
//!
//! A record owns one slot per schema field. Each slot carries the field's
//! runtime metadata word (see [`stats`]) and its current [`FieldValue`].
//!
//! # Lifecycle
//!
//! ```text
//! Record::builder(&SCHEMA)      defaults applied in schema order
//!     .on_write(..)             observers installed only after defaults,
//!     .on_stats(..)             so construction never notifies
//!     .build()?
//!         │
//!         ▼
//!  write / read / clear ...     typed access through the dispatch engine
//!         │
//!         ▼
//!  destroy()                    destroyed flag first, then every owned
//!                               value released with observers suppressed
//! ```
//!
//! Records placed in a [`Collection`](crate::Collection) are shared as
//! [`RecordRef`] (`Rc<RefCell<Record>>`).

mod dispatch;
pub mod stats;
mod value;

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, warn};

use crate::config::CoreConfig;
use crate::schema::{FieldDescriptor, Schema, SchemaError};

pub use stats::STATS_TRACK_BIT;
pub use value::FieldValue;
pub(crate) use value::default_json;

/// Shared handle to a record living in a collection
pub type RecordRef = Rc<RefCell<Record>>;

/// Called after every successful write with the field name
pub type WriteObserver = Box<dyn Fn(&Record, &str)>;

/// Given the chance to transform a value before `read` returns it
pub type ReadObserver = Box<dyn Fn(&Record, &str, FieldValue) -> FieldValue>;

/// Called after writes to statistics-tracked fields with old and new values
pub type StatsObserver = Box<dyn Fn(&Record, &str, &FieldValue, &FieldValue)>;

/// Default bound on resource names, in bytes
pub const MAX_RESOURCE_NAME_LEN: usize = 64;

/// Error type for record operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Type mismatch on {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: crate::schema::FieldType,
        found: crate::schema::FieldType,
    },

    #[error("Unsupported operation on {field} ({ty})")]
    Unsupported {
        field: String,
        ty: crate::schema::FieldType,
    },

    #[error("Record has been destroyed")]
    Destroyed,

    #[error("Record already destroyed")]
    AlreadyDestroyed,

    #[error("Schema {0} declares no primary key")]
    NoPrimaryKey(String),

    #[error("Field {0} has no child schema")]
    NoChildSchema(String),

    #[error("Expected a JSON {expected}, found {found}")]
    UnexpectedJson {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Record is borrowed elsewhere")]
    Borrowed,
}

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Per-field storage
pub(crate) struct Slot {
    pub meta: u32,
    pub value: FieldValue,
}

/// One instance of a schema
pub struct Record {
    schema: &'static Schema,
    slots: Vec<Slot>,
    context: Option<Box<dyn Any>>,
    on_write: Option<WriteObserver>,
    on_read: Option<ReadObserver>,
    on_stats: Option<StatsObserver>,
    name: String,
    max_name_len: usize,
    destroyed: bool,
}

/// Builder for [`Record`]
pub struct RecordBuilder {
    schema: &'static Schema,
    context: Option<Box<dyn Any>>,
    on_write: Option<WriteObserver>,
    on_read: Option<ReadObserver>,
    on_stats: Option<StatsObserver>,
    name: String,
    max_name_len: usize,
}

impl RecordBuilder {
    /// Attach a user context, retrievable with [`Record::context`]
    pub fn context<T: Any>(mut self, context: T) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    pub fn on_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record, &str) + 'static,
    {
        self.on_write = Some(Box::new(f));
        self
    }

    pub fn on_read<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record, &str, FieldValue) -> FieldValue + 'static,
    {
        self.on_read = Some(Box::new(f));
        self
    }

    pub fn on_stats<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record, &str, &FieldValue, &FieldValue) + 'static,
    {
        self.on_stats = Some(Box::new(f));
        self
    }

    /// Resource name, truncated to the configured bound
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Take limits from a loaded configuration
    pub fn config(self, config: &CoreConfig) -> Self {
        self.max_name_len(config.max_resource_name_len)
    }

    /// Create the record
    ///
    /// Fails if the schema layout is invalid.
    pub fn build(self) -> RecordResult<Record> {
        let schema = self.schema;
        let layout = schema.layout().map_err(|e| {
            error!(schema = schema.name(), error = %e, "Cannot create record");
            e
        })?;

        let mut slots = Vec::with_capacity(layout.fields().len());
        for field in schema.fields() {
            let value = FieldValue::zero(field.ty)
                .ok_or_else(|| SchemaError::UnknownType(field.name.to_string()))?;
            slots.push(Slot { meta: 0, value });
        }

        let mut record = Record {
            schema,
            slots,
            context: self.context,
            on_write: None,
            on_read: None,
            on_stats: None,
            name: bounded_name(self.name, self.max_name_len),
            max_name_len: self.max_name_len,
            destroyed: false,
        };

        for index in 0..record.slots.len() {
            record.apply_default_at(index)?;
        }

        record.on_write = self.on_write;
        record.on_read = self.on_read;
        record.on_stats = self.on_stats;

        debug!(
            schema = schema.name(),
            name = %record.name,
            size = layout.size(),
            "Record created"
        );
        Ok(record)
    }
}

impl Record {
    pub fn builder(schema: &'static Schema) -> RecordBuilder {
        RecordBuilder {
            schema,
            context: None,
            on_write: None,
            on_read: None,
            on_stats: None,
            name: String::new(),
            max_name_len: MAX_RESOURCE_NAME_LEN,
        }
    }

    /// Create a record with no context, observers or name
    pub fn new(schema: &'static Schema) -> RecordResult<Self> {
        Self::builder(schema).build()
    }

    /// Wrap into a shared handle for use in collections
    pub fn into_ref(self) -> RecordRef {
        Rc::new(RefCell::new(self))
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename, truncated to the bound the record was built with
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = bounded_name(name.into(), self.max_name_len);
    }

    pub fn context<T: Any>(&self) -> Option<&T> {
        self.context.as_ref()?.downcast_ref::<T>()
    }

    pub fn context_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.context.as_mut()?.downcast_mut::<T>()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Size of the packed layout this record follows
    pub fn buffer_size(&self) -> usize {
        self.schema.size()
    }

    /// Destroy the record, releasing every owned value
    ///
    /// The destroyed flag is set before anything is released, so no observer
    /// runs during teardown. A second call is rejected.
    pub fn destroy(&mut self) -> RecordResult<()> {
        if self.destroyed {
            warn!(
                schema = self.schema.name(),
                name = %self.name,
                "Destroy called on an already destroyed record"
            );
            return Err(RecordError::AlreadyDestroyed);
        }
        self.destroyed = true;

        for index in 0..self.slots.len() {
            self.clear_at(index)?;
        }
        self.slots.clear();
        self.on_write = None;
        self.on_read = None;
        self.on_stats = None;

        debug!(schema = self.schema.name(), name = %self.name, "Record destroyed");
        Ok(())
    }

    /// Resolve a field name (or alias) to its slot index
    pub(crate) fn resolve(&self, name: &str) -> RecordResult<(usize, &'static FieldDescriptor)> {
        if self.destroyed {
            warn!(field = name, "Access to a destroyed record");
            return Err(RecordError::Destroyed);
        }
        self.schema.field(name).ok_or_else(|| {
            warn!(schema = self.schema.name(), field = name, "Unknown field");
            RecordError::UnknownField(name.to_string())
        })
    }

    /// Index of the primary key field
    pub(crate) fn primary_key_index(&self) -> RecordResult<(usize, &'static FieldDescriptor)> {
        self.schema.primary_key().ok_or_else(|| {
            warn!(schema = self.schema.name(), "Schema has no primary key");
            RecordError::NoPrimaryKey(self.schema.name().to_string())
        })
    }

    /// Primary key value rendered as text (persistence keys)
    pub fn primary_key_string(&self) -> RecordResult<Option<String>> {
        let (_, field) = self.primary_key_index()?;
        Ok(self.read(field.name)?.scalar_text())
    }
}

impl Drop for Record {
    fn drop(&mut self) {
        if !self.destroyed {
            let _ = self.destroy();
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("schema", &self.schema.name())
            .field("name", &self.name)
            .field("fields", &self.slots.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

fn bounded_name(mut name: String, max: usize) -> String {
    if name.len() > max {
        let mut cut = max;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        warn!(name = %name, max, "Resource name truncated");
        name.truncate(cut);
    }
    name
}
