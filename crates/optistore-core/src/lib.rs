//! Optimistic in-memory record cache.
//!
//! Records are open JSON field maps. A record created before its permanent
//! identifier is known receives a temporary `cid` and is later folded into
//! its permanent identity when re-created with one. Reads go through
//! declarative filter and sort specifications and always return copies.

/// The cache facade.
pub mod cache;
/// Filter specifications and their evaluation.
pub mod filter;
/// Permanent and temporary lookup tables.
pub mod index;
/// Created/destroyed/changed listeners.
pub mod notify;
/// Identity reconciliation on the write path.
pub mod reconcile;
/// Record and key types.
pub mod record;
/// Sort specifications.
pub mod sort;
/// Temporary identifier allocation.
pub mod temp_id;

pub use cache::{RecordCache, Target};
pub use filter::{ComparisonOp, Filter, FilterError, FilterResult, FilterSpec, FilterTerm, Predicate};
pub use index::DualIndex;
pub use notify::{ChangeKind, ChangeNotifier, ListenerId};
pub use reconcile::Reconciler;
pub use record::{DEFAULT_IDENTIFIER_FIELD, Record, RecordKey, TEMP_ID_FIELD, TEMP_ID_PREFIX};
pub use sort::{Comparator, Sort};
pub use temp_id::{Sequence, TempIdSource};
