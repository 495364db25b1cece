//! Ordered, shared collection of records
//!
//! A `Collection` is a cheap handle: cloning it shares the same underlying
//! list, which is how list/iterator fields hand out references to their
//! children rather than copies. Iteration walks by position and never holds a
//! borrow of the list across steps, so callbacks may modify the collection
//! while it is being iterated.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::record::RecordRef;

/// Shared ordered list of records
#[derive(Clone, Default)]
pub struct Collection {
    items: Rc<RefCell<Vec<RecordRef>>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<RecordRef>) -> Self {
        Self {
            items: Rc::new(RefCell::new(records)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// First element
    pub fn first(&self) -> Option<RecordRef> {
        self.items.borrow().first().cloned()
    }

    /// Element at a position
    pub fn get(&self, index: usize) -> Option<RecordRef> {
        self.items.borrow().get(index).cloned()
    }

    /// Element following `record`, by identity
    pub fn next(&self, record: &RecordRef) -> Option<RecordRef> {
        let items = self.items.borrow();
        let pos = items.iter().position(|r| Rc::ptr_eq(r, record))?;
        items.get(pos + 1).cloned()
    }

    /// Append a record
    pub fn push(&self, record: RecordRef) {
        self.items.borrow_mut().push(record);
    }

    /// Insert a record at a position (clamped to the end)
    pub fn insert(&self, index: usize, record: RecordRef) {
        let mut items = self.items.borrow_mut();
        let index = index.min(items.len());
        items.insert(index, record);
    }

    /// Remove a record by identity
    ///
    /// Returns `true` if the record was found and removed.
    pub fn remove(&self, record: &RecordRef) -> bool {
        let mut items = self.items.borrow_mut();
        match items.iter().position(|r| Rc::ptr_eq(r, record)) {
            Some(pos) => {
                items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Check membership by identity
    pub fn contains(&self, record: &RecordRef) -> bool {
        self.items.borrow().iter().any(|r| Rc::ptr_eq(r, record))
    }

    /// Remove and return every element, leaving the collection empty
    pub fn take_all(&self) -> Vec<RecordRef> {
        std::mem::take(&mut *self.items.borrow_mut())
    }

    /// Copy of the element handles in order
    pub fn snapshot(&self) -> Vec<RecordRef> {
        self.items.borrow().clone()
    }

    /// Check whether two handles share the same underlying list
    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }

    pub fn iter(&self) -> Iter {
        Iter {
            collection: self.clone(),
            index: 0,
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("len", &self.len())
            .finish()
    }
}

/// Positional iterator over a [`Collection`]
pub struct Iter {
    collection: Collection,
    index: usize,
}

impl Iterator for Iter {
    type Item = RecordRef;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.collection.get(self.index)?;
        self.index += 1;
        Some(item)
    }
}

impl IntoIterator for &Collection {
    type Item = RecordRef;
    type IntoIter = Iter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<RecordRef> for Collection {
    fn from_iter<I: IntoIterator<Item = RecordRef>>(iter: I) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}
