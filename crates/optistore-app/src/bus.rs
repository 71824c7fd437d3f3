//! Action bus abstraction and an in-process dispatcher.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::error::DispatchError;

/// Callback invoked once per dispatched action.
pub type Handler<A> = Rc<dyn Fn(&A)>;

/// Token identifying a handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DispatchToken(u64);

impl DispatchToken {
    /// Wrap a raw token value. Bus implementations decide how values are
    /// allocated.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Numeric value of the token.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispatch-{}", self.0)
    }
}

/// Publish mechanism that delivers actions to registered handlers.
///
/// Implementations must invoke each registered handler once per action and
/// stop invoking it after [`ActionBus::unregister`].
pub trait ActionBus<A> {
    /// Register a handler and return its token.
    fn register(&self, handler: Handler<A>) -> DispatchToken;

    /// Release a registration. Unknown tokens are ignored.
    fn unregister(&self, token: DispatchToken);
}

/// Single-threaded dispatcher in the flux style.
///
/// Handlers run synchronously in registration order. Dispatching from inside
/// a handler is rejected with [`DispatchError::Reentrant`].
pub struct Dispatcher<A> {
    handlers: RefCell<Vec<(DispatchToken, Handler<A>)>>,
    next_token: Cell<u64>,
    dispatching: Cell<bool>,
}

impl<A> Default for Dispatcher<A> {
    fn default() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            next_token: Cell::new(1),
            dispatching: Cell::new(false),
        }
    }
}

impl<A> Dispatcher<A> {
    /// Create a dispatcher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `action` to every registered handler.
    ///
    /// # Errors
    /// Returns [`DispatchError::Reentrant`] when called while another
    /// dispatch is still running.
    pub fn dispatch(&self, action: &A) -> Result<(), DispatchError> {
        if self.dispatching.replace(true) {
            warn!("rejected dispatch issued from inside a handler");
            return Err(DispatchError::Reentrant);
        }
        let _guard = DispatchGuard(&self.dispatching);

        let handlers: Vec<Handler<A>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        trace!(handlers = handlers.len(), "dispatching action");
        for handler in handlers {
            handler(action);
        }
        Ok(())
    }

    /// Whether a dispatch is currently running.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.dispatching.get()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl<A> ActionBus<A> for Dispatcher<A> {
    fn register(&self, handler: Handler<A>) -> DispatchToken {
        let token = DispatchToken(self.next_token.get());
        self.next_token.set(token.0.wrapping_add(1));
        self.handlers.borrow_mut().push((token, handler));
        token
    }

    fn unregister(&self, token: DispatchToken) {
        self.handlers
            .borrow_mut()
            .retain(|(existing, _)| *existing != token);
    }
}

impl<A> fmt::Debug for Dispatcher<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handler_count())
            .field("dispatching", &self.is_dispatching())
            .finish()
    }
}

/// Clears the dispatching flag even if a handler panics.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
