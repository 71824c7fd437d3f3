//! Action-driven stores for optistore
//!
//! This crate binds a [`RecordCache`](optistore_core::RecordCache) to an
//! action bus: every dispatched action is routed to the cache's write
//! operations, and views observe the cache through its change listeners.

mod bus;
mod config;
mod error;
mod store;

pub use bus::{ActionBus, DispatchToken, Dispatcher, Handler};
pub use config::StoreConfig;
pub use error::{DispatchError, Result, StoreError};
pub use store::{Route, Store, StoreBuilder};

pub use optistore_core::{Filter, FilterSpec, Record, RecordCache, RecordKey, Sort};
