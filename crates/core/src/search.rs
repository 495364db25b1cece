//! Search, match and sort over collections

use serde_json::Value;
use tracing::{debug, warn};

use crate::collection::Collection;
use crate::record::{Record, RecordError, RecordRef, RecordResult};
use crate::schema::{FieldFlags, FieldType};

/// Decides whether a record's JSON form satisfies a predicate
pub trait Matcher {
    fn matches(&self, record: &Value, predicate: &Value) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&Value, &Value) -> bool,
{
    fn matches(&self, record: &Value, predicate: &Value) -> bool {
        self(record, predicate)
    }
}

/// Default matcher
///
/// An object predicate matches when every one of its keys is present in the
/// record (case-insensitively) with an equal value. Any other predicate must
/// equal the whole record.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityMatcher;

impl Matcher for EqualityMatcher {
    fn matches(&self, record: &Value, predicate: &Value) -> bool {
        let (Value::Object(record), Value::Object(predicate)) = (record, predicate) else {
            return record == predicate;
        };
        predicate.iter().all(|(key, expected)| {
            let actual = record
                .get(key)
                .or_else(|| record.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v));
            actual == Some(expected)
        })
    }
}

/// Find the first record whose primary key equals `key`
///
/// String keys compare case-insensitively and untrimmed; numeric keys are
/// parsed at the field's width. Fails if a record's schema has no primary key.
pub fn find_by_primary_key(collection: &Collection, key: &str) -> RecordResult<Option<RecordRef>> {
    for candidate in collection {
        let found = {
            let record = candidate.try_borrow().map_err(|_| {
                warn!(key, "Record is borrowed during primary key search");
                RecordError::Borrowed
            })?;
            let (_, field) = record.primary_key_index()?;
            record.read(field.name)?.matches_key(key)
        };
        if found {
            return Ok(Some(candidate));
        }
    }
    debug!(key, "No record with primary key");
    Ok(None)
}

/// Test one record against a predicate
///
/// The record is rendered with [`Record::to_json`] under the given filter and
/// handed to `matcher`, or [`EqualityMatcher`] when none is given.
pub fn matches(
    record: &Record,
    include: FieldFlags,
    exclude: FieldFlags,
    predicate: &Value,
    matcher: Option<&dyn Matcher>,
) -> bool {
    let rendered = record.to_json(include, exclude);
    matcher.unwrap_or(&EqualityMatcher).matches(&rendered, predicate)
}

/// Collect every record that matches into a new collection
///
/// The input is left untouched; the result may be empty.
pub fn match_collection(
    collection: &Collection,
    include: FieldFlags,
    exclude: FieldFlags,
    predicate: &Value,
    matcher: Option<&dyn Matcher>,
) -> Collection {
    let matched: Collection = collection
        .iter()
        .filter(|candidate| match candidate.try_borrow() {
            Ok(record) => matches(&record, include, exclude, predicate, matcher),
            Err(_) => {
                warn!("Record is borrowed; skipped by match");
                false
            }
        })
        .collect();
    debug!(total = collection.len(), matched = matched.len(), "Collection matched");
    matched
}

/// Sort by the unsigned 64-bit `id` field, ascending
///
/// Returns a new collection holding the same records. The input is returned
/// unchanged when it is empty or any record lacks a readable `u64` id.
pub fn sort_by_id(collection: Collection) -> Collection {
    if collection.is_empty() {
        warn!("Nothing to sort");
        return collection;
    }

    let mut keyed = Vec::with_capacity(collection.len());
    for candidate in &collection {
        let Some(id) = read_id(&candidate) else {
            return collection;
        };
        keyed.push((id, candidate));
    }

    keyed.sort_by_key(|(id, _)| *id);
    keyed.into_iter().map(|(_, record)| record).collect()
}

fn read_id(candidate: &RecordRef) -> Option<u64> {
    let Ok(record) = candidate.try_borrow() else {
        warn!("Record is borrowed; cannot sort");
        return None;
    };
    match record.schema().field("id") {
        Some((_, field)) if field.ty == FieldType::UInt64 => record.get_u64(field.name).ok(),
        Some((_, field)) => {
            warn!(schema = record.schema().name(), ty = %field.ty, "Sort id is not a u64");
            None
        }
        None => {
            warn!(schema = record.schema().name(), "Record has no id to sort by");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::schema::{FieldDescriptor, Schema};

    static NAMED_FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::new(FieldType::String, "name", FieldFlags::PRIMARY_KEY),
        FieldDescriptor::new(FieldType::Int32, "level", FieldFlags::PERSIST),
        FieldDescriptor::new(FieldType::String, "secret", FieldFlags::NOT_ACCESSIBLE),
    ];
    static NAMED: Schema = Schema::new("named", NAMED_FIELDS);

    static ID_FIELDS: &[FieldDescriptor] = &[FieldDescriptor::new(
        FieldType::UInt64,
        "id",
        FieldFlags::PRIMARY_KEY,
    )];
    static IDS: Schema = Schema::new("ids", ID_FIELDS);

    static SIGNED_FIELDS: &[FieldDescriptor] =
        &[FieldDescriptor::new(FieldType::Int32, "id", FieldFlags::empty())];
    static SIGNED: Schema = Schema::new("signed", SIGNED_FIELDS);

    fn named(name: &str, level: i32) -> RecordRef {
        let mut record = Record::new(&NAMED).unwrap();
        record.set_str("name", name).unwrap();
        record.set_i32("level", level).unwrap();
        record.set_str("secret", "hidden").unwrap();
        record.into_ref()
    }

    fn with_id(id: u64) -> RecordRef {
        let mut record = Record::new(&IDS).unwrap();
        record.set_u64("id", id).unwrap();
        record.into_ref()
    }

    fn ids(collection: &Collection) -> Vec<u64> {
        collection
            .iter()
            .map(|r| r.borrow().get_u64("id").unwrap())
            .collect()
    }

    #[test]
    fn test_find_string_key_case_insensitive() {
        let collection = Collection::from_records(vec![named("a", 1), named("b", 2), named("c", 3)]);
        let found = find_by_primary_key(&collection, "B").unwrap().unwrap();
        assert_eq!(found.borrow().get_i32("level").unwrap(), 2);
        assert!(find_by_primary_key(&collection, "z").unwrap().is_none());
    }

    #[test]
    fn test_find_string_key_keeps_whitespace() {
        let collection = Collection::from_records(vec![named("x1", 5), named(" x1", 9)]);
        let found = find_by_primary_key(&collection, " x1").unwrap().unwrap();
        assert_eq!(found.borrow().get_i32("level").unwrap(), 9);
        let found = find_by_primary_key(&collection, "x1").unwrap().unwrap();
        assert_eq!(found.borrow().get_i32("level").unwrap(), 5);
        assert!(find_by_primary_key(&collection, "x1 ").unwrap().is_none());
    }

    #[test]
    fn test_find_numeric_key() {
        let collection = Collection::from_records(vec![with_id(7), with_id(u64::MAX)]);
        let found = find_by_primary_key(&collection, &u64::MAX.to_string())
            .unwrap()
            .unwrap();
        assert!(Rc::ptr_eq(&found, &collection.get(1).unwrap()));
        assert!(find_by_primary_key(&collection, "seven").unwrap().is_none());
    }

    #[test]
    fn test_find_without_primary_key_fails() {
        let mut record = Record::new(&SIGNED).unwrap();
        record.set_i32("id", 1).unwrap();
        let collection = Collection::from_records(vec![record.into_ref()]);
        assert!(matches!(
            find_by_primary_key(&collection, "1"),
            Err(RecordError::NoPrimaryKey(_))
        ));
    }

    #[test]
    fn test_equality_matcher() {
        let record = named("a", 5);
        let record = record.borrow();
        let all = FieldFlags::all();
        let none = FieldFlags::empty();

        assert!(matches(&record, all, none, &json!({"level": 5}), None));
        assert!(matches(&record, all, none, &json!({"LEVEL": 5, "name": "a"}), None));
        assert!(!matches(&record, all, none, &json!({"level": 6}), None));
        assert!(!matches(
            &record,
            all,
            FieldFlags::NOT_ACCESSIBLE,
            &json!({"secret": "hidden"}),
            None
        ));
    }

    #[test]
    fn test_closure_matcher() {
        let record = named("a", 5);
        let at_least_four = |record: &Value, _: &Value| record["level"].as_i64().is_some_and(|l| l >= 4);
        assert!(matches(
            &record.borrow(),
            FieldFlags::all(),
            FieldFlags::empty(),
            &Value::Null,
            Some(&at_least_four)
        ));
    }

    #[test]
    fn test_match_collection_leaves_input() {
        let collection = Collection::from_records(vec![named("a", 1), named("b", 2), named("c", 1)]);
        let matched = match_collection(
            &collection,
            FieldFlags::all(),
            FieldFlags::empty(),
            &json!({"level": 1}),
            None,
        );
        assert_eq!(matched.len(), 2);
        assert_eq!(collection.len(), 3);
        assert!(Rc::ptr_eq(&matched.get(1).unwrap(), &collection.get(2).unwrap()));

        let none = match_collection(
            &collection,
            FieldFlags::all(),
            FieldFlags::empty(),
            &json!({"level": 9}),
            None,
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_sort_by_id() {
        let records = vec![with_id(5), with_id(1), with_id(3)];
        let originals = records.clone();
        let sorted = sort_by_id(Collection::from_records(records));

        assert_eq!(ids(&sorted), vec![1, 3, 5]);
        assert!(Rc::ptr_eq(&sorted.get(0).unwrap(), &originals[1]));
        assert!(Rc::ptr_eq(&sorted.get(2).unwrap(), &originals[0]));
    }

    #[test]
    fn test_sort_fails_closed() {
        let empty = sort_by_id(Collection::new());
        assert!(empty.is_empty());

        let mut record = Record::new(&SIGNED).unwrap();
        record.set_i32("id", 1).unwrap();
        let mixed = Collection::from_records(vec![with_id(9), record.into_ref(), with_id(2)]);
        let handle = mixed.clone();
        let result = sort_by_id(mixed);
        assert!(result.ptr_eq(&handle));
        assert_eq!(result.len(), 3);
    }
}
