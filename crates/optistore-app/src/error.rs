//! Error types for store construction and dispatch

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced while configuring or building a store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No action bus was supplied to the builder
    #[error("store requires an action bus")]
    MissingBus,

    /// No routing function was supplied to the builder
    #[error("store requires a routing function")]
    MissingRoute,

    /// Configuration values failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A filter document could not be parsed
    #[error(transparent)]
    Filter(#[from] optistore_core::FilterError),
}

impl StoreError {
    /// Shorthand for [`StoreError::Config`].
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Errors raised by the in-process dispatcher
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// An action was dispatched from inside a handler
    #[error("cannot dispatch in the middle of a dispatch")]
    Reentrant,
}
