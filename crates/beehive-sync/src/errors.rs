//! Errors raised while orchestrating a sync session (§4.9, §7).
//!
//! Auth and storage failures abort the session (§7 "propagation policy");
//! they're bridged here rather than re-wrapped field by field so the wire
//! layer can translate one [`SyncError`] into a response code without
//! threading three crates' error types through every call site.

use beehive_core::{CodecError, SchemaError};
use beehive_storage::StorageError;
use beehive_wire::WireError;

/// Failure modes of session authentication and the full-sync exchange.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Authentication, authorization, or share-token failure (§4.6–§4.8).
    #[error(transparent)]
    Auth(#[from] beehive_auth::AuthError),

    /// Persistence failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A name/uuid didn't resolve against the session's schema version.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A pk/data tuple on the wire failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A frame failed to decode or its CRC didn't check out.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A wire-carried `context` field was not a well-formed uuid (§6.4:
    /// contexts are addressed by uuid; no name index is maintained for
    /// them the way entities/roles/modules are within one schema version).
    #[error("malformed context identifier: {0}")]
    MalformedContext(String),
}
