//! File-backed persistence of `PERSIST` fields
//!
//! A single record is stored as an object of its persisted fields. A
//! collection is stored as one object keyed by each record's primary key
//! rendered as a string:
//!
//! ```json
//! {
//!     "x1": {
//!         "n": 1
//!     },
//!     "x2": {
//!         "n": 2
//!     }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::collection::Collection;
use crate::config::CoreConfig;
use crate::json::kind;
use crate::record::{Record, RecordError};
use crate::schema::FieldFlags;
use crate::search::find_by_primary_key;

/// Indentation used when no configuration is given
pub const DEFAULT_INDENT: usize = 4;

/// Error type for persistence operations
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Persistence file not found: {0}")]
    NotFound(PathBuf),

    #[error("Persistence file does not hold an object: {0}")]
    NotAnObject(PathBuf),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Result type for persistence operations
pub type PersistResult<T> = Result<T, PersistError>;

/// Save the persisted fields of one record
///
/// Nothing is written when the record has no persisted fields.
pub fn save_persistent(record: &Record, path: impl AsRef<Path>) -> PersistResult<()> {
    save_record(record, path.as_ref(), DEFAULT_INDENT)
}

/// [`save_persistent`] with the indentation from `config`
pub fn save_persistent_with(
    record: &Record,
    path: impl AsRef<Path>,
    config: &CoreConfig,
) -> PersistResult<()> {
    save_record(record, path.as_ref(), config.persist_indent)
}

/// Merge the persisted fields stored at `path` into a record
///
/// Returns the number of fields applied.
pub fn load_persistent(record: &mut Record, path: impl AsRef<Path>) -> PersistResult<usize> {
    let path = path.as_ref();
    let value = read_object(path)?;
    let applied = record.json_to_record(&value, FieldFlags::PERSIST, None)?;
    info!(path = %path.display(), applied, "Loaded persistent record");
    Ok(applied)
}

/// Save the persisted fields of every record, keyed by primary key
///
/// Records without a primary key value are skipped. Nothing is written when
/// the result would be empty.
pub fn save_persistent_collection(
    collection: &Collection,
    path: impl AsRef<Path>,
) -> PersistResult<()> {
    save_collection(collection, path.as_ref(), DEFAULT_INDENT)
}

/// [`save_persistent_collection`] with the indentation from `config`
pub fn save_persistent_collection_with(
    collection: &Collection,
    path: impl AsRef<Path>,
    config: &CoreConfig,
) -> PersistResult<()> {
    save_collection(collection, path.as_ref(), config.persist_indent)
}

/// Merge stored fields into the records of a collection by primary key
///
/// Keys with no matching record are skipped. Returns the number of records
/// updated.
pub fn load_persistent_collection(
    collection: &Collection,
    path: impl AsRef<Path>,
) -> PersistResult<usize> {
    let path = path.as_ref();
    let Value::Object(entries) = read_object(path)? else {
        return Err(PersistError::NotAnObject(path.to_path_buf()));
    };

    let mut updated = 0;
    for (key, fields) in &entries {
        let Some(record) = find_by_primary_key(collection, key)? else {
            debug!(path = %path.display(), key = %key, "No record for stored key");
            continue;
        };
        let Ok(mut record) = record.try_borrow_mut() else {
            warn!(key = %key, "Record is borrowed; stored fields not applied");
            continue;
        };
        record.json_to_record(fields, FieldFlags::PERSIST, None)?;
        updated += 1;
    }

    info!(path = %path.display(), updated, "Loaded persistent collection");
    Ok(updated)
}

fn save_record(record: &Record, path: &Path, indent: usize) -> PersistResult<()> {
    let value = record.to_json(FieldFlags::PERSIST, FieldFlags::empty());
    if value.as_object().is_some_and(Map::is_empty) {
        debug!(path = %path.display(), "No persisted fields; nothing written");
        return Ok(());
    }
    write_pretty(path, &value, indent)
}

fn save_collection(collection: &Collection, path: &Path, indent: usize) -> PersistResult<()> {
    let mut entries = Map::new();
    for record in collection {
        let Ok(record) = record.try_borrow() else {
            warn!(path = %path.display(), "Record is borrowed; not saved");
            continue;
        };
        let Some(key) = record.primary_key_string()? else {
            warn!(schema = record.schema().name(), "Record has no primary key value; not saved");
            continue;
        };
        entries.insert(key, record.to_json(FieldFlags::PERSIST, FieldFlags::empty()));
    }

    if entries.is_empty() {
        debug!(path = %path.display(), "Empty collection; nothing written");
        return Ok(());
    }
    write_pretty(path, &Value::Object(entries), indent)
}

fn write_pretty(path: &Path, value: &Value, indent: usize) -> PersistResult<()> {
    let indent = vec![b' '; indent];
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
    value.serialize(&mut serializer)?;
    out.push(b'\n');

    fs::write(path, out).map_err(|e| {
        error!(path = %path.display(), error = %e, "Failed to write persistence file");
        PersistError::Io(e)
    })?;
    debug!(path = %path.display(), "Persistence file written");
    Ok(())
}

fn read_object(path: &Path) -> PersistResult<Value> {
    if !path.exists() {
        error!(path = %path.display(), "Persistence file not found");
        return Err(PersistError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        error!(path = %path.display(), error = %e, "Failed to parse persistence file");
        PersistError::Parse(e)
    })?;

    if !value.is_object() {
        error!(path = %path.display(), found = kind(&value), "Persistence file is not an object");
        return Err(PersistError::NotAnObject(path.to_path_buf()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::record::RecordRef;
    use crate::schema::{FieldDescriptor, FieldType, Schema};

    static FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::new(FieldType::String, "name", FieldFlags::PERSIST),
        FieldDescriptor::new(FieldType::Int32, "count", FieldFlags::PERSIST),
        FieldDescriptor::new(FieldType::Int32, "scratch", FieldFlags::VOLATILE),
    ];
    static SCHEMA: Schema = Schema::new("persist_test", FIELDS);

    static KEYED_FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::new(FieldType::String, "id", FieldFlags::PRIMARY_KEY),
        FieldDescriptor::new(FieldType::UInt32, "n", FieldFlags::PERSIST),
    ];
    static KEYED: Schema = Schema::new("keyed", KEYED_FIELDS);

    static VOLATILE_FIELDS: &[FieldDescriptor] = &[FieldDescriptor::new(
        FieldType::Int32,
        "x",
        FieldFlags::VOLATILE,
    )];
    static VOLATILE: Schema = Schema::new("volatile", VOLATILE_FIELDS);

    fn keyed(id: &str, n: u32) -> RecordRef {
        let mut record = Record::new(&KEYED).unwrap();
        record.set_str("id", id).unwrap();
        record.set_u32("n", n).unwrap();
        record.into_ref()
    }

    #[test]
    fn test_record_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");

        let mut record = Record::new(&SCHEMA).unwrap();
        record.set_str("name", "a").unwrap();
        record.set_i32("count", 3).unwrap();
        record.set_i32("scratch", 99).unwrap();
        save_persistent(&record, &path).unwrap();

        let stored: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, json!({"name": "a", "count": 3}));

        let mut fresh = Record::new(&SCHEMA).unwrap();
        assert_eq!(load_persistent(&mut fresh, &path).unwrap(), 2);
        assert_eq!(fresh.get_str("name").unwrap().as_deref(), Some("a"));
        assert_eq!(fresh.get_i32("count").unwrap(), 3);
        assert_eq!(fresh.get_i32("scratch").unwrap(), 0);
    }

    #[test]
    fn test_four_space_indent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");
        let record = Record::new(&SCHEMA).unwrap();
        save_persistent(&record, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"count\": 0"));
    }

    #[test]
    fn test_configured_indent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");
        let config = CoreConfig {
            persist_indent: 2,
            ..CoreConfig::default()
        };
        let record = Record::new(&SCHEMA).unwrap();
        save_persistent_with(&record, &path, &config).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"count\": 0"));
    }

    #[test]
    fn test_nothing_written_without_persisted_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        let record = Record::new(&VOLATILE).unwrap();
        save_persistent(&record, &path).unwrap();
        assert!(!path.exists());

        save_persistent_collection(&Collection::new(), &path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let mut record = Record::new(&SCHEMA).unwrap();

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_persistent(&mut record, &missing),
            Err(PersistError::NotFound(_))
        ));

        let malformed = dir.path().join("bad.json");
        fs::write(&malformed, "{ not json").unwrap();
        assert!(matches!(
            load_persistent(&mut record, &malformed),
            Err(PersistError::Parse(_))
        ));

        let array = dir.path().join("array.json");
        fs::write(&array, "[1, 2]").unwrap();
        assert!(matches!(
            load_persistent(&mut record, &array),
            Err(PersistError::NotAnObject(_))
        ));
    }

    #[test]
    fn test_collection_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collection.json");

        let saved = Collection::from_records(vec![keyed("x1", 1), keyed("x2", 2)]);
        save_persistent_collection(&saved, &path).unwrap();

        let stored: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, json!({"x1": {"n": 1}, "x2": {"n": 2}}));

        // Recreated collection: x2 matches, x3 has no stored entry, x1 absent
        let restored = Collection::from_records(vec![keyed("X2", 0), keyed("x3", 7)]);
        assert_eq!(load_persistent_collection(&restored, &path).unwrap(), 1);

        let x2 = restored.get(0).unwrap();
        let x3 = restored.get(1).unwrap();
        assert_eq!(x2.borrow().get_u32("n").unwrap(), 2);
        assert_eq!(x3.borrow().get_u32("n").unwrap(), 7);
    }

    #[test]
    fn test_collection_keys_with_whitespace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("padded.json");

        let saved = Collection::from_records(vec![keyed(" x1", 1), keyed("x1", 2)]);
        save_persistent_collection(&saved, &path).unwrap();

        let restored = Collection::from_records(vec![keyed("x1", 0), keyed(" x1", 0)]);
        assert_eq!(load_persistent_collection(&restored, &path).unwrap(), 2);
        assert_eq!(restored.get(0).unwrap().borrow().get_u32("n").unwrap(), 2);
        assert_eq!(restored.get(1).unwrap().borrow().get_u32("n").unwrap(), 1);
    }
}
