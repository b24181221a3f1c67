//! Error types for the qprof workspace.
//!
//! The taxonomy separates caller contract violations (`NotPersisted`,
//! `AlreadyPersisted`, `InvalidState`) from store-level failures
//! (`Storage`). Lookups that find nothing return `Option`/empty
//! collections, never an error.

mod storage_error;

pub use storage_error::StorageError;

/// Result alias used across every qprof crate.
pub type QProfResult<T> = Result<T, QProfError>;

/// Top-level error for the quality-profile engine.
#[derive(Debug, thiserror::Error)]
pub enum QProfError {
    /// An operation referenced an entity that has no server identity yet.
    #[error("{entity} is not persisted")]
    NotPersisted { entity: &'static str },

    /// An insert-style operation was given an identity that already exists.
    #[error("{entity} is already persisted")]
    AlreadyPersisted { entity: &'static str },

    /// A mutation attempted to violate an engine-owned invariant, e.g.
    /// pre-setting a ledger timestamp or introducing a parent cycle.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// Failure in the underlying SQLite store.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QProfError {
    /// Shorthand for `InvalidState` with a formatted message.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
