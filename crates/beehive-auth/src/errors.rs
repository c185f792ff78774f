//! Errors raised by sessions, authorization, and share-token handling
//! (§4.6, §4.7, §4.8).

/// Failure modes surfaced to the wire layer as one of `notEnoughRights`,
/// `invalidSchema`, `userNotFound`, or `dataNotFound` (§6.1, §7).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Credentials, reconnection token, or JWT did not check out.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// No user/node/member/push matched the lookup.
    #[error("{kind} not found")]
    NotFound {
        /// What kind of record was being looked up.
        kind: &'static str,
    },

    /// A user/node/member/push the caller tried to create already exists.
    #[error("{kind} already exists")]
    AlreadyExists {
        /// What kind of record collided.
        kind: &'static str,
    },

    /// The caller's role lacks the capability the operation requires.
    #[error("not enough rights: missing {capability}")]
    NotEnoughRights {
        /// The capability that was missing.
        capability: &'static str,
    },

    /// A role/entity reference did not resolve against the schema version.
    #[error("invalid schema reference: {0}")]
    InvalidSchema(#[from] beehive_core::SchemaError),

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(#[from] beehive_storage::StorageError),

    /// A Google JWT failed to verify.
    #[error("jwt verification failed: {0}")]
    Jwt(String),
}
