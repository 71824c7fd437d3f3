//! Write path: filing records under temporary and permanent identities.

use std::fmt;

use tracing::{debug, trace};

use crate::index::DualIndex;
use crate::record::{Record, RecordKey, TEMP_ID_FIELD};
use crate::temp_id::{Sequence, TempIdSource};

/// Decides where a record lives in a [`DualIndex`] and migrates it from its
/// temporary identity to its permanent one.
pub struct Reconciler {
    identifier_field: String,
    temp_ids: Box<dyn TempIdSource>,
}

impl Reconciler {
    /// Reconcile on `identifier_field`, allocating temporary ids from a
    /// fresh [`Sequence`].
    #[must_use]
    pub fn new(identifier_field: impl Into<String>) -> Self {
        Self::with_source(identifier_field, Box::new(Sequence::default()))
    }

    /// Reconcile with a caller-supplied temporary id allocator.
    #[must_use]
    pub fn with_source(identifier_field: impl Into<String>, temp_ids: Box<dyn TempIdSource>) -> Self {
        Self {
            identifier_field: identifier_field.into(),
            temp_ids,
        }
    }

    /// Name of the permanent-identifier field.
    #[must_use]
    pub fn identifier_field(&self) -> &str {
        &self.identifier_field
    }

    /// Upsert `record`, assigning a temporary id when it has no identity.
    ///
    /// When a permanent id is present, any permanent-table entry filed
    /// under the record's temporary id is retired first. Returns the record
    /// as stored.
    pub fn create(&mut self, index: &mut DualIndex, mut record: Record) -> Record {
        let mut cid = record.cid();

        if let Some(id) = record.key_of(&self.identifier_field) {
            if let Some(stale) = &cid
                && index.drop_permanent(stale).is_some()
            {
                debug!(cid = %stale, %id, "promoted temporary record to permanent identity");
            }
            index.put_permanent(id, record.clone());
        } else {
            let key = match cid.take() {
                Some(existing) => existing,
                None => {
                    let assigned = RecordKey::temporary(self.temp_ids.next_suffix());
                    record.set(TEMP_ID_FIELD, assigned.to_value());
                    trace!(cid = %assigned, "assigned temporary identifier");
                    assigned
                }
            };
            index.put_permanent(key.clone(), record.clone());
            cid = Some(key);
        }

        if let Some(cid) = cid {
            index.put_temporary(cid, record.clone());
        }
        record
    }

    /// Remove a resolved record under every key it may be filed under.
    pub fn remove(&self, index: &mut DualIndex, record: &Record) {
        if let Some(id) = record.key_of(&self.identifier_field) {
            index.drop_permanent(&id);
        }
        if let Some(cid) = record.cid() {
            index.drop_permanent(&cid);
            index.drop_temporary(&cid);
        }
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("identifier_field", &self.identifier_field)
            .finish_non_exhaustive()
    }
}
