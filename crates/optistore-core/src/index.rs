//! Two lookup tables over one set of records.

use std::collections::BTreeMap;

use crate::record::{Record, RecordKey};

/// Records keyed by permanent identifier and by temporary identifier.
///
/// Records that have not received a permanent identifier yet are also
/// filed in the permanent table under their temporary key, which makes the
/// permanent table the complete set of live records.
#[derive(Debug, Clone, Default)]
pub struct DualIndex {
    by_permanent: BTreeMap<RecordKey, Record>,
    by_temporary: BTreeMap<RecordKey, Record>,
}

impl DualIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a key against the table its shape selects.
    #[must_use]
    pub fn lookup(&self, key: &RecordKey) -> Option<&Record> {
        if key.is_temporary() {
            self.by_temporary.get(key)
        } else {
            self.by_permanent.get(key)
        }
    }

    /// Every live record, ordered by permanent-table key.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.by_permanent.values()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_permanent.len()
    }

    /// Whether the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_permanent.is_empty()
    }

    /// Whether the permanent table has an entry under `key`.
    #[must_use]
    pub fn has_permanent(&self, key: &RecordKey) -> bool {
        self.by_permanent.contains_key(key)
    }

    /// Whether the temporary table has an entry under `key`.
    #[must_use]
    pub fn has_temporary(&self, key: &RecordKey) -> bool {
        self.by_temporary.contains_key(key)
    }

    pub(crate) fn put_permanent(&mut self, key: RecordKey, record: Record) {
        self.by_permanent.insert(key, record);
    }

    pub(crate) fn put_temporary(&mut self, key: RecordKey, record: Record) {
        self.by_temporary.insert(key, record);
    }

    pub(crate) fn drop_permanent(&mut self, key: &RecordKey) -> Option<Record> {
        self.by_permanent.remove(key)
    }

    pub(crate) fn drop_temporary(&mut self, key: &RecordKey) -> Option<Record> {
        self.by_temporary.remove(key)
    }
}
