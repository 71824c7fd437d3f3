//! The record cache: dual index, identity reconciliation, queries and
//! change notification behind one `&self` surface.

use std::cell::RefCell;

use tracing::{debug, trace};

use crate::filter::Filter;
use crate::index::DualIndex;
use crate::notify::{ChangeNotifier, ListenerId};
use crate::reconcile::Reconciler;
use crate::record::{DEFAULT_IDENTIFIER_FIELD, Record, RecordKey};
use crate::sort::Sort;
use crate::temp_id::TempIdSource;

/// What `destroy` should remove: a record-shaped value or a bare key.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Resolved through its `cid`, falling back to its permanent id.
    Record(Record),
    /// Resolved through [`RecordCache::get`].
    Key(RecordKey),
}

impl From<Record> for Target {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<&Record> for Target {
    fn from(record: &Record) -> Self {
        Self::Record(record.clone())
    }
}

impl From<RecordKey> for Target {
    fn from(key: RecordKey) -> Self {
        Self::Key(key)
    }
}

impl From<&str> for Target {
    fn from(key: &str) -> Self {
        Self::Key(key.into())
    }
}

impl From<i64> for Target {
    fn from(key: i64) -> Self {
        Self::Key(key.into())
    }
}

impl From<u64> for Target {
    fn from(key: u64) -> Self {
        Self::Key(key.into())
    }
}

impl From<i32> for Target {
    fn from(key: i32) -> Self {
        Self::Key(key.into())
    }
}

/// In-memory, single-threaded record cache.
///
/// Every method takes `&self`; state lives behind `RefCell`s that are never
/// borrowed while listeners run, so listeners may query the cache (or
/// write to it) re-entrantly. Reads hand out copies.
#[derive(Debug)]
pub struct RecordCache {
    index: RefCell<DualIndex>,
    reconciler: RefCell<Reconciler>,
    identifier_field: String,
    notifier: ChangeNotifier,
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFIER_FIELD)
    }
}

impl RecordCache {
    /// Cache keyed on `identifier_field`, counting temporary ids from zero.
    #[must_use]
    pub fn new(identifier_field: impl Into<String>) -> Self {
        let identifier_field = identifier_field.into();
        Self {
            index: RefCell::new(DualIndex::new()),
            reconciler: RefCell::new(Reconciler::new(identifier_field.clone())),
            identifier_field,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Replace the temporary id allocator.
    #[must_use]
    pub fn with_temp_ids(self, source: impl TempIdSource + 'static) -> Self {
        self.with_temp_id_source(Box::new(source))
    }

    /// Replace the temporary id allocator with an already boxed source.
    #[must_use]
    pub fn with_temp_id_source(self, source: Box<dyn TempIdSource>) -> Self {
        let reconciler = Reconciler::with_source(self.identifier_field.clone(), source);
        Self {
            reconciler: RefCell::new(reconciler),
            ..self
        }
    }

    /// Name of the permanent-identifier field.
    #[must_use]
    pub fn identifier_field(&self) -> &str {
        &self.identifier_field
    }

    /// Upsert a record and emit a created event.
    ///
    /// Records without a permanent identifier receive a temporary `cid`;
    /// the stored record (with its `cid`) is returned.
    pub fn create(&self, record: Record) -> Record {
        let stored = {
            let mut index = self.index.borrow_mut();
            self.reconciler.borrow_mut().create(&mut index, record)
        };
        debug!(
            id = ?stored.key_of(&self.identifier_field),
            cid = ?stored.cid(),
            "created record"
        );
        self.notifier.emit_created(&stored);
        stored
    }

    /// Remove a record from both indexes and emit a destroyed event.
    ///
    /// Unresolvable targets are ignored and yield `None`.
    pub fn destroy(&self, target: impl Into<Target>) -> Option<Record> {
        let key = match target.into() {
            Target::Key(key) => key,
            Target::Record(record) => record
                .cid()
                .or_else(|| record.key_of(&self.identifier_field))?,
        };
        let removed = {
            let mut index = self.index.borrow_mut();
            let record = index.lookup(&key)?.clone();
            self.reconciler.borrow().remove(&mut index, &record);
            record
        };
        debug!(%key, "destroyed record");
        self.notifier.emit_destroyed(&removed);
        Some(removed)
    }

    /// Destroy every record the filter matches. Returns how many were removed.
    pub fn purge(&self, filter: impl Into<Filter>) -> usize {
        let doomed = self.query(filter, Sort::Default);
        let removed = doomed
            .into_iter()
            .filter_map(|record| self.destroy(record))
            .count();
        debug!(removed, "purged records");
        removed
    }

    /// Emit a changed signal. Writes never do this on their own.
    pub fn emit_change(&self) {
        self.notifier.emit_changed();
    }

    /// Copy of the record stored under `key`.
    ///
    /// Keys shaped like temporary identifiers (`c` followed by a digit) are
    /// looked up in the temporary index; all others in the permanent one.
    pub fn get(&self, key: impl Into<RecordKey>) -> Option<Record> {
        let key = key.into();
        let found = self.index.borrow().lookup(&key).cloned();
        trace!(%key, hit = found.is_some(), "lookup");
        found
    }

    /// Copies of the matching records in sort order.
    pub fn query(&self, filter: impl Into<Filter>, sort: impl Into<Sort>) -> Vec<Record> {
        let filter = filter.into();
        let sort = sort.into();
        let mut items: Vec<Record> = {
            let index = self.index.borrow();
            index.records().cloned().collect()
        };
        items.retain(|record| filter.matches(record));
        items.sort_by(|a, b| sort.compare(a, b, &self.identifier_field));
        trace!(matched = items.len(), "query");
        items
    }

    /// Number of distinct live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.borrow().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.borrow().is_empty()
    }

    /// Subscribe to changed signals.
    pub fn add_change_listener(&self, listener: impl Fn() + 'static) -> ListenerId {
        self.notifier.on_changed(listener)
    }

    /// Unsubscribe a changed listener.
    pub fn remove_change_listener(&self, id: ListenerId) -> bool {
        self.notifier.off_changed(id)
    }

    /// Subscribe to created events.
    pub fn add_create_listener(&self, listener: impl Fn(&Record) + 'static) -> ListenerId {
        self.notifier.on_created(listener)
    }

    /// Unsubscribe a created listener.
    pub fn remove_create_listener(&self, id: ListenerId) -> bool {
        self.notifier.off_created(id)
    }

    /// Subscribe to destroyed events.
    pub fn add_destroy_listener(&self, listener: impl Fn(&Record) + 'static) -> ListenerId {
        self.notifier.on_destroyed(listener)
    }

    /// Unsubscribe a destroyed listener.
    pub fn remove_destroy_listener(&self, id: ListenerId) -> bool {
        self.notifier.off_destroyed(id)
    }

    /// Borrow the notifier, e.g. to inspect listener counts.
    #[must_use]
    pub const fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::filter::FilterSpec;
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        Record::from_value(value).expect("test records are objects")
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .map(|r| r.get("name").and_then(Value::as_str).unwrap_or(""))
            .collect()
    }

    fn seeded() -> RecordCache {
        let cache = RecordCache::new("thing_id");
        for thing in [
            json!({"thing_id": 1, "name": "Z", "group": "A", "label": "Zac"}),
            json!({"thing_id": 2, "name": "D", "group": "B", "label": "David"}),
            json!({"thing_id": 3, "name": "E", "group": "A", "label": "Ethan"}),
            json!({"thing_id": 4, "name": "A", "group": "B", "label": "Alan"}),
            json!({"thing_id": 5, "name": "F", "group": "B", "label": "Frank"}),
            json!({"name": "M", "group": "B"}),
        ] {
            cache.create(record(thing));
        }
        cache
    }

    #[test]
    fn get_returns_created_record() {
        let cache = RecordCache::new("thing_id");
        let thing = record(json!({"thing_id": 1, "name": "It", "age": 25}));
        cache.create(thing.clone());
        assert_eq!(cache.get(1), Some(thing));
    }

    #[test]
    fn filter_and_sort_compose() {
        let cache = seeded();
        let results = cache.query([("group", "B")], ["name"]);
        assert_eq!(names(&results), ["A", "D", "F", "M"]);
    }

    #[test]
    fn filter_without_sort() {
        let cache = seeded();
        assert_eq!(cache.query([("group", "A")], Sort::Default).len(), 2);
    }

    #[test]
    fn sort_without_filter() {
        let cache = seeded();
        let results = cache.query(Filter::All, ["name"]);
        assert_eq!(names(&results), ["A", "D", "E", "F", "M", "Z"]);
    }

    #[test]
    fn comparison_operators() {
        let cache = seeded();
        assert_eq!(names(&cache.query([("thing_id", "lte.3")], "name")), ["D", "E", "Z"]);
        assert_eq!(names(&cache.query([("thing_id", "gt.3")], "name")), ["A", "F"]);
    }

    #[test]
    fn string_operators() {
        let cache = seeded();
        assert_eq!(names(&cache.query([("label", "contains.n")], "name")), ["A", "E", "F"]);
        assert_eq!(names(&cache.query([("label", "startswith.d")], "name")), ["D"]);
    }

    #[test]
    fn predicate_filters_and_comparator_sorts() {
        let cache = seeded();
        let results = cache.query(
            Filter::predicate(|r| r.get("group") == Some(&json!("A"))),
            Sort::comparator(|a, b| {
                let name = |r: &Record| r.get("name").and_then(Value::as_str).map(str::to_owned);
                name(b).cmp(&name(a))
            }),
        );
        assert_eq!(names(&results), ["Z", "E"]);
    }

    #[test]
    fn upsert_is_idempotent() {
        let cache = seeded();
        let before = cache.query(Filter::All, Sort::Default);
        cache.create(record(json!({"thing_id": 2, "name": "D", "group": "B", "label": "David"})));
        assert_eq!(cache.query(Filter::All, Sort::Default), before);
    }

    #[test]
    fn upsert_overwrites_in_place() {
        let cache = seeded();
        cache.create(record(json!({"thing_id": 2, "name": "Dee"})));
        assert_eq!(cache.len(), 6);
        assert_eq!(cache.get(2).and_then(|r| r.get("name").cloned()), Some(json!("Dee")));
    }

    #[test]
    fn temporary_records_migrate_to_permanent_identity() {
        let cache = RecordCache::new("thing_id");
        let mut thing = cache.create(record(json!({"name": "M", "group": "B"})));
        let cid = thing.cid().expect("cid assigned");
        assert_eq!(cache.get(cid.clone()).as_ref(), Some(&thing));

        thing.set("thing_id", 47);
        cache.create(thing);

        assert_eq!(cache.query(Filter::All, ["name"]).len(), 1);
        let by_id = cache.get(47).expect("reachable by permanent id");
        let by_cid = cache.get(cid.clone()).expect("reachable by cid");
        assert_eq!(by_id, by_cid);
        assert!(!cache.index.borrow().has_permanent(&cid));
    }

    #[test]
    fn destroy_unsaved_record_by_cid() {
        let cache = seeded();
        let thing = cache.create(record(json!({"name": "Q", "group": "B"})));
        let cid = thing.cid().expect("cid assigned");
        assert_eq!(
            names(&cache.query(Filter::All, ["name"])),
            ["A", "D", "E", "F", "M", "Q", "Z"]
        );

        assert!(cache.destroy(cid.clone()).is_some());
        assert_eq!(names(&cache.query(Filter::All, ["name"])), ["A", "D", "E", "F", "M", "Z"]);
        assert!(cache.get(cid).is_none());
    }

    #[test]
    fn destroy_saved_record_through_record_value() {
        let cache = seeded();
        let mut thing = cache.create(record(json!({"name": "Q", "group": "B"})));
        let thing_again = cache.create(thing.clone());
        assert_eq!(thing, thing_again);
        let cid = thing.cid().expect("cid assigned");

        thing.set("thing_id", 98);
        cache.create(thing.clone());
        assert_eq!(
            names(&cache.query(Filter::All, ["name"])),
            ["A", "D", "E", "F", "M", "Q", "Z"]
        );

        cache.destroy(&thing);
        assert_eq!(names(&cache.query(Filter::All, ["name"])), ["A", "D", "E", "F", "M", "Z"]);
        assert!(cache.get(98).is_none());
        assert!(cache.get(cid).is_none());
    }

    #[test]
    fn destroy_by_permanent_key() {
        let cache = seeded();
        let removed = cache.destroy(4).expect("record 4 exists");
        assert_eq!(removed.get("name"), Some(&json!("A")));
        assert!(cache.get(4).is_none());
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn destroying_unknown_records_is_a_no_op() {
        let cache = seeded();
        let fired = Rc::new(Cell::new(false));
        {
            let fired = Rc::clone(&fired);
            cache.add_destroy_listener(move |_| fired.set(true));
        }
        assert!(cache.destroy(99).is_none());
        assert!(cache.destroy("c99").is_none());
        assert!(cache.destroy(Record::new()).is_none());
        assert!(!fired.get());
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn purge_destroys_matching_records() {
        let cache = seeded();
        let removed = cache.purge(FilterSpec::new().term("group", "B"));
        assert_eq!(removed, 4);
        assert_eq!(names(&cache.query(Filter::All, ["name"])), ["E", "Z"]);
    }

    #[test]
    fn reads_return_copies() {
        let cache = seeded();
        let mut fetched = cache.get(1).expect("record 1 exists");
        fetched.set("name", "mutated");
        let mut listed = cache.query([("thing_id", "1")], Sort::Default);
        listed[0].set("group", "mutated");

        let fresh = cache.get(1).expect("record 1 exists");
        assert_eq!(fresh.get("name"), Some(&json!("Z")));
        assert_eq!(fresh.get("group"), Some(&json!("A")));
    }

    #[test]
    fn writes_notify_create_and_destroy_but_not_change() {
        let cache = RecordCache::default();
        let created = Rc::new(RefCell::new(Vec::new()));
        let destroyed = Rc::new(Cell::new(0));
        let changed = Rc::new(Cell::new(0));
        {
            let created = Rc::clone(&created);
            cache.add_create_listener(move |r| created.borrow_mut().push(r.clone()));
        }
        {
            let destroyed = Rc::clone(&destroyed);
            cache.add_destroy_listener(move |_| destroyed.set(destroyed.get() + 1));
        }
        let change_id = {
            let changed = Rc::clone(&changed);
            cache.add_change_listener(move || changed.set(changed.get() + 1))
        };

        let stored = cache.create(Record::new().with("name", "x"));
        cache.destroy(&stored);
        assert_eq!(created.borrow().as_slice(), [stored]);
        assert_eq!(destroyed.get(), 1);
        assert_eq!(changed.get(), 0);

        cache.emit_change();
        assert!(cache.remove_change_listener(change_id));
        cache.emit_change();
        assert_eq!(changed.get(), 1);
    }

    #[test]
    fn listeners_may_read_re_entrantly() {
        let cache = Rc::new(RecordCache::default());
        let seen = Rc::new(Cell::new(0));
        {
            let weak = Rc::downgrade(&cache);
            let seen = Rc::clone(&seen);
            cache.add_create_listener(move |_| {
                if let Some(cache) = weak.upgrade() {
                    seen.set(cache.query(Filter::All, Sort::Default).len());
                }
            });
        }
        cache.create(Record::new());
        cache.create(Record::new());
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn injected_temp_ids_are_used() {
        let cache = RecordCache::default().with_temp_ids(|| 7_u64);
        let stored = cache.create(Record::new());
        assert_eq!(stored.cid(), Some(RecordKey::from("c7")));
        assert!(cache.get("c7").is_some());
    }

    #[test]
    fn caches_keep_independent_counters() {
        let first = RecordCache::default();
        let second = RecordCache::default();
        first.create(Record::new());
        let stored = second.create(Record::new());
        assert_eq!(stored.cid(), Some(RecordKey::temporary(0)));
    }
}
