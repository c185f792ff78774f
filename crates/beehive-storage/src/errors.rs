//! Errors raised by the DAO contract and the storage engine built on it.

use beehive_core::CodecError;

/// Failure modes of the persistence layer (§6.3) and the engines built on
/// top of it (§4.4, §4.5).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record matched the requested id/composite key.
    #[error("{kind} not found")]
    NotFound {
        /// What kind of record was being looked up.
        kind: &'static str,
    },

    /// A `save`/`insert` collided with an existing record keyed the same way.
    #[error("{kind} already exists")]
    AlreadyExists {
        /// What kind of record collided.
        kind: &'static str,
    },

    /// A transaction handle was used after its matching commit/rollback.
    #[error("transaction {0} is not active")]
    TransactionNotActive(u64),

    /// An attribute tuple failed to encode or decode while applying a row
    /// change (§4.5).
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StorageError {
    /// Build a [`StorageError::NotFound`].
    pub fn not_found(kind: &'static str) -> Self {
        Self::NotFound { kind }
    }

    /// Build a [`StorageError::AlreadyExists`].
    pub fn already_exists(kind: &'static str) -> Self {
        Self::AlreadyExists { kind }
    }
}
