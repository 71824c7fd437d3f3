//! Store wiring: a record cache bound to an action bus through a routing
//! function.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use optistore_core::{RecordCache, TempIdSource};
use tracing::info;

use crate::bus::{ActionBus, DispatchToken, Handler};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

/// Routing function: inspects an action and drives the cache's write
/// operations.
pub type Route<A> = Rc<dyn Fn(&RecordCache, &A)>;

/// A [`RecordCache`] subscribed to an [`ActionBus`].
///
/// Every dispatched action is handed to the routing function together with
/// the cache. The store dereferences to its cache for reads, writes and
/// listener management.
pub struct Store<A: 'static> {
    cache: Rc<RecordCache>,
    bus: Rc<dyn ActionBus<A>>,
    route: Route<A>,
    token: Cell<Option<DispatchToken>>,
}

impl<A: 'static> Store<A> {
    /// Start building a store.
    #[must_use]
    pub fn builder() -> StoreBuilder<A> {
        StoreBuilder::default()
    }

    /// Subscribe the routing function to the bus. Does nothing when already
    /// registered.
    pub fn register(&self) {
        if self.token.get().is_some() {
            return;
        }
        let cache = Rc::downgrade(&self.cache);
        let route = Rc::clone(&self.route);
        let handler: Handler<A> = Rc::new(move |action: &A| {
            if let Some(cache) = cache.upgrade() {
                route(&cache, action);
            }
        });
        let token = self.bus.register(handler);
        info!(%token, "store registered with action bus");
        self.token.set(Some(token));
    }

    /// Release the bus subscription; later actions leave the cache untouched
    /// until [`Store::register`] is called again.
    pub fn unregister(&self) {
        if let Some(token) = self.token.take() {
            self.bus.unregister(token);
            info!(%token, "store unregistered from action bus");
        }
    }

    /// Whether the store currently receives actions.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.token.get().is_some()
    }

    /// Current bus token, if registered.
    #[must_use]
    pub fn dispatch_token(&self) -> Option<DispatchToken> {
        self.token.get()
    }

    /// Borrow the underlying cache.
    #[must_use]
    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }
}

impl<A: 'static> Deref for Store<A> {
    type Target = RecordCache;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

impl<A: 'static> Drop for Store<A> {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl<A: 'static> fmt::Debug for Store<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("cache", &self.cache)
            .field("token", &self.token.get())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Store`].
pub struct StoreBuilder<A: 'static> {
    config: StoreConfig,
    temp_ids: Option<Box<dyn TempIdSource>>,
    bus: Option<Rc<dyn ActionBus<A>>>,
    route: Option<Route<A>>,
}

impl<A: 'static> Default for StoreBuilder<A> {
    fn default() -> Self {
        Self {
            config: StoreConfig::default(),
            temp_ids: None,
            bus: None,
            route: None,
        }
    }
}

impl<A: 'static> StoreBuilder<A> {
    /// Apply a configuration.
    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the permanent-identifier field.
    #[must_use]
    pub fn identifier_field(mut self, field: impl Into<String>) -> Self {
        self.config.identifier_field = field.into();
        self
    }

    /// Inject a temporary id allocator.
    #[must_use]
    pub fn temp_ids(mut self, source: impl TempIdSource + 'static) -> Self {
        self.temp_ids = Some(Box::new(source));
        self
    }

    /// Attach the action bus.
    #[must_use]
    pub fn bus<B>(mut self, bus: Rc<B>) -> Self
    where
        B: ActionBus<A> + 'static,
    {
        self.bus = Some(bus);
        self
    }

    /// Attach the routing function.
    #[must_use]
    pub fn route<F>(mut self, route: F) -> Self
    where
        F: Fn(&RecordCache, &A) + 'static,
    {
        self.route = Some(Rc::new(route));
        self
    }

    /// Validate the configuration, build the store and register it with the
    /// bus.
    ///
    /// # Errors
    /// Returns [`StoreError::MissingBus`] or [`StoreError::MissingRoute`]
    /// when a collaborator is absent, and [`StoreError::Config`] when the
    /// configuration is invalid.
    pub fn build(self) -> Result<Store<A>> {
        self.config.validate()?;
        let bus = self.bus.ok_or(StoreError::MissingBus)?;
        let route = self.route.ok_or(StoreError::MissingRoute)?;

        let mut cache = RecordCache::new(self.config.identifier_field);
        if let Some(source) = self.temp_ids {
            cache = cache.with_temp_id_source(source);
        }

        let store = Store {
            cache: Rc::new(cache),
            bus,
            route,
            token: Cell::new(None),
        };
        store.register();
        Ok(store)
    }
}

impl<A: 'static> fmt::Debug for StoreBuilder<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("config", &self.config)
            .field("bus", &self.bus.is_some())
            .field("route", &self.route.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::bus::Dispatcher;
    use optistore_core::Record;

    fn noop_route(_: &RecordCache, _: &Record) {}

    #[test]
    fn build_requires_bus_and_route() {
        let missing_bus = Store::<Record>::builder().route(noop_route).build();
        assert!(matches!(missing_bus, Err(StoreError::MissingBus)));

        let missing_route = Store::<Record>::builder()
            .bus(Rc::new(Dispatcher::new()))
            .build();
        assert!(matches!(missing_route, Err(StoreError::MissingRoute)));
    }

    #[test]
    fn build_rejects_invalid_identifier_field() {
        let result = Store::<Record>::builder()
            .identifier_field("cid")
            .bus(Rc::new(Dispatcher::new()))
            .route(noop_route)
            .build();
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn build_registers_once() {
        let bus = Rc::new(Dispatcher::<Record>::new());
        let store = Store::builder()
            .bus(Rc::clone(&bus))
            .route(noop_route)
            .build()
            .unwrap();
        assert!(store.is_registered());
        store.register();
        assert_eq!(bus.handler_count(), 1);
    }

    #[test]
    fn dropping_the_store_releases_its_subscription() {
        let bus = Rc::new(Dispatcher::<Record>::new());
        {
            let _store = Store::builder()
                .bus(Rc::clone(&bus))
                .route(noop_route)
                .build()
                .unwrap();
            assert_eq!(bus.handler_count(), 1);
        }
        assert_eq!(bus.handler_count(), 0);
    }

    #[test]
    fn builder_passes_identifier_and_temp_ids_to_cache() {
        let store = Store::<Record>::builder()
            .identifier_field("thing_id")
            .temp_ids(|| 9_u64)
            .bus(Rc::new(Dispatcher::new()))
            .route(noop_route)
            .build()
            .unwrap();
        assert_eq!(store.identifier_field(), "thing_id");
        let stored = store.create(Record::new());
        assert_eq!(stored.get("cid"), Some(&"c9".into()));
    }
}
