//! Error types for the codec, schema registry, and validator.
//!
//! Following the unified per-crate error pattern: one `thiserror` enum per
//! concern rather than a single catch-all. Validation outcomes that the
//! protocol must *record* rather than throw are represented separately as
//! [`ValidationCode`] — see `spec.md` §7 ("Propagation policy").

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised while encoding or decoding an attribute tuple (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A length field in the buffer claims more bytes than remain.
    #[error("corrupt encoding: length field overflows buffer ({reason})")]
    CorruptEncoding {
        /// Human-readable detail for logs.
        reason: String,
    },

    /// The same attribute id appeared twice within one tuple.
    #[error("corrupt encoding: duplicate attribute id {id} in tuple")]
    DuplicateAttribute {
        /// The attribute id that repeated.
        id: u16,
    },

    /// A type tag byte did not map to any known [`crate::codec::ValueType`].
    #[error("corrupt encoding: unknown type tag {tag}")]
    UnknownTypeTag {
        /// The raw tag byte read from the buffer.
        tag: u8,
    },

    /// A text-form scalar could not be parsed as the declared type.
    #[error("malformed text value for attribute {id}: {reason}")]
    MalformedText {
        /// The attribute id whose value failed to parse.
        id: u16,
        /// Human-readable detail for logs.
        reason: String,
    },
}

impl CodecError {
    /// Build a [`CodecError::CorruptEncoding`] from any displayable reason.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptEncoding {
            reason: reason.into(),
        }
    }
}

/// Errors raised while resolving names/uuids against the schema registry
/// (§4.2). These are distinct from [`ValidationCode`]: a `SchemaError` means
/// the request referenced something the registry genuinely cannot resolve
/// (the wire-level `invalidSchema` response), not a per-field validation
/// rejection that gets recorded on a `Header`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The header declared a schema version newer than the registry's
    /// current published version.
    #[error("header targets schema version {requested}, current is {current}")]
    VersionTooNew {
        /// Version the header declared.
        requested: u32,
        /// Highest version the registry has published.
        current: u32,
    },

    /// No [`crate::schema::SchemaVersion`] exists for the requested version
    /// at all (neither published nor draft).
    #[error("no schema version {0}")]
    VersionNotFound(u32),

    /// A name did not resolve to any uuid in the given version's index.
    #[error("unknown {kind} name: {name}")]
    UnknownName {
        /// What kind of thing was being looked up (`"entity"`, `"role"`, …).
        kind: &'static str,
        /// The name that failed to resolve.
        name: String,
    },

    /// A uuid did not resolve to any definition in the given version.
    #[error("unknown {kind} uuid: {uuid}")]
    UnknownUuid {
        /// What kind of thing was being looked up.
        kind: &'static str,
        /// The uuid that failed to resolve.
        uuid: uuid::Uuid,
    },

    /// A name was registered twice (case-insensitively) within one version.
    #[error("duplicate {kind} name (case-insensitive): {name}")]
    DuplicateName {
        /// What kind of thing was duplicated.
        kind: &'static str,
        /// The colliding name.
        name: String,
    },
}

/// The numeric outcome of validating (and, later, applying) one `Header`.
///
/// Persisted verbatim as `Header.status` (§4.3, §4.4) and echoed on the wire
/// as part of full-sync downloads (§4.9 Phase C). Deliberately a plain
/// `#[repr(u16)]`-shaped enum with an explicit discriminant per variant so
/// the numeric values in `spec.md`'s table are the literal wire encoding,
/// not an implementation detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ValidationCode {
    /// Accepted and applied.
    Success = 0,
    /// Server-side mark used when streaming peer changes.
    Approved = 1,
    /// Change targets an entity unknown in this version; dropped, header continues.
    SkipEntity = 9,
    /// Apply failed to find a row for update/delete; header rolled back.
    EntityNotFound = 10,
    /// Apply found a duplicate primary key on insert.
    DuplicatedEntity = 110,
    /// Per-field type/nullability/uniqueness/check violation.
    NotValidIncomeData = 120,
    /// Transaction does not permit this operation on this entity.
    NotValidOperation = 130,
    /// Key attribute or uuid-key definition missing from the schema.
    EntityDefinition = 140,
    /// A pre/post script rejected the header.
    UserValidation = 150,
}

impl ValidationCode {
    /// The numeric wire/storage value for this code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Whether this code short-circuits the rest of the header's changes
    /// (every failure except [`ValidationCode::SkipEntity`], per §4.3).
    pub fn short_circuits(self) -> bool {
        !matches!(self, Self::Success | Self::Approved | Self::SkipEntity)
    }

    /// Decode a wire/storage numeric value back into a code.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => Self::Success,
            1 => Self::Approved,
            9 => Self::SkipEntity,
            10 => Self::EntityNotFound,
            110 => Self::DuplicatedEntity,
            120 => Self::NotValidIncomeData,
            130 => Self::NotValidOperation,
            140 => Self::EntityDefinition,
            150 => Self::UserValidation,
            _ => return None,
        })
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Approved => "approved",
            Self::SkipEntity => "skipEntity",
            Self::EntityNotFound => "entityNotFound",
            Self::DuplicatedEntity => "duplicatedEntity",
            Self::NotValidIncomeData => "notValidIncomeData",
            Self::NotValidOperation => "notValidOperation",
            Self::EntityDefinition => "entityDefinition",
            Self::UserValidation => "userValidation",
        };
        write!(f, "{name} ({})", self.code())
    }
}
