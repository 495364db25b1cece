//! resrec - schema-driven structured records
//!
//! A static [`Schema`] describes one record shape. Records created from it
//! get typed read/write access, flag-filtered JSON conversion, file-backed
//! persistence of `PERSIST` fields, and search/match/sort over collections.
//!
//! # Modules
//!
//! - [`schema`] - field descriptors, flags and the computed layout
//! - [`record`] - record lifecycle, type dispatch, statistics tracking
//! - [`collection`] - shared ordered groups of records
//! - [`json`] - record/JSON bridge and the bulk loader
//! - [`persist`] - JSON files for single records and keyed collections
//! - [`search`] - primary key lookup, predicate matching, sort by id
//! - [`help`] - command and authorization descriptor documents
//! - [`config`] / [`logging`] - host-side setup
//!
//! # Example
//!
//! ```ignore
//! use resrec_core::{FieldDescriptor, FieldFlags, FieldType, Record, Schema};
//!
//! static FIELDS: &[FieldDescriptor] = &[
//!     FieldDescriptor::new(FieldType::String, "name", FieldFlags::PERSIST),
//!     FieldDescriptor::new(FieldType::Int32, "count", FieldFlags::PERSIST),
//! ];
//! static COUNTER: Schema = Schema::new("counter", FIELDS);
//!
//! let mut record = Record::new(&COUNTER)?;
//! record.set_i32("count", 3)?;
//! resrec_core::persist::save_persistent(&record, "counter.json")?;
//! ```

pub mod collection;
pub mod config;
pub mod help;
pub mod json;
pub mod logging;
pub mod persist;
pub mod record;
pub mod schema;
pub mod search;

// Re-export commonly used items
pub use collection::Collection;
pub use config::{ConfigError, ConfigResult, CoreConfig};
pub use json::bulk_load;
pub use persist::{
    load_persistent, load_persistent_collection, save_persistent, save_persistent_collection,
    PersistError, PersistResult,
};
pub use record::{
    FieldValue, Record, RecordBuilder, RecordError, RecordRef, RecordResult, STATS_TRACK_BIT,
};
pub use schema::{
    DefaultValue, FieldDescriptor, FieldFlags, FieldType, Layout, Schema, SchemaError,
};
pub use search::{
    find_by_primary_key, match_collection, matches, sort_by_id, EqualityMatcher, Matcher,
};
