//! Synchronous change notifications.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::record::Record;

/// Handle returned by listener registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Numeric value of the handle.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Event kinds emitted by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A record was created or upserted.
    Created,
    /// A record was destroyed.
    Destroyed,
    /// Generic "contents changed" signal.
    Changed,
}

impl ChangeKind {
    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Destroyed => "destroyed",
            Self::Changed => "changed",
        }
    }
}

type RecordListener = dyn Fn(&Record);
type SignalListener = dyn Fn();

struct Listeners<L: ?Sized> {
    entries: RefCell<Vec<(ListenerId, Rc<L>)>>,
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> Listeners<L> {
    fn add(&self, id: ListenerId, listener: Rc<L>) {
        self.entries.borrow_mut().push((id, listener));
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Copy of the current listeners, so callbacks can (un)subscribe while
    /// an emission is running.
    fn snapshot(&self) -> Vec<Rc<L>> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Publish/subscribe hub for created, destroyed and changed events.
///
/// Listeners run synchronously in registration order. No internal borrow is
/// held while a listener runs.
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: Cell<u64>,
    created: Listeners<RecordListener>,
    destroyed: Listeners<RecordListener>,
    changed: Listeners<SignalListener>,
}

impl ChangeNotifier {
    /// Create a notifier with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1));
        ListenerId(id)
    }

    /// Subscribe to created events.
    pub fn on_created(&self, listener: impl Fn(&Record) + 'static) -> ListenerId {
        let id = self.allocate();
        self.created.add(id, Rc::new(listener));
        id
    }

    /// Subscribe to destroyed events.
    pub fn on_destroyed(&self, listener: impl Fn(&Record) + 'static) -> ListenerId {
        let id = self.allocate();
        self.destroyed.add(id, Rc::new(listener));
        id
    }

    /// Subscribe to changed signals.
    pub fn on_changed(&self, listener: impl Fn() + 'static) -> ListenerId {
        let id = self.allocate();
        self.changed.add(id, Rc::new(listener));
        id
    }

    /// Unsubscribe from created events. Returns whether the id was known.
    pub fn off_created(&self, id: ListenerId) -> bool {
        self.created.remove(id)
    }

    /// Unsubscribe from destroyed events. Returns whether the id was known.
    pub fn off_destroyed(&self, id: ListenerId) -> bool {
        self.destroyed.remove(id)
    }

    /// Unsubscribe from changed signals. Returns whether the id was known.
    pub fn off_changed(&self, id: ListenerId) -> bool {
        self.changed.remove(id)
    }

    /// Number of listeners subscribed to `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: ChangeKind) -> usize {
        match kind {
            ChangeKind::Created => self.created.len(),
            ChangeKind::Destroyed => self.destroyed.len(),
            ChangeKind::Changed => self.changed.len(),
        }
    }

    /// Deliver a created event.
    pub fn emit_created(&self, record: &Record) {
        Self::deliver(ChangeKind::Created, &self.created, record);
    }

    /// Deliver a destroyed event.
    pub fn emit_destroyed(&self, record: &Record) {
        Self::deliver(ChangeKind::Destroyed, &self.destroyed, record);
    }

    /// Deliver a changed signal.
    pub fn emit_changed(&self) {
        let listeners = self.changed.snapshot();
        trace!(kind = ChangeKind::Changed.as_str(), listeners = listeners.len(), "emitting");
        for listener in listeners {
            listener();
        }
    }

    fn deliver(kind: ChangeKind, listeners: &Listeners<RecordListener>, record: &Record) {
        let listeners = listeners.snapshot();
        trace!(kind = kind.as_str(), listeners = listeners.len(), "emitting");
        for listener in listeners {
            listener(record);
        }
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("created", &self.created.len())
            .field("destroyed", &self.destroyed.len())
            .field("changed", &self.changed.len())
            .finish()
    }
}
