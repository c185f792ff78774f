//! Identifier newtypes used across the Beehive data model (§3).
//!
//! Each identifier wraps the representation `spec.md` assigns it (a stable
//! UUID for entities that live in the authorization/data model, a small
//! integer for per-dataset sequence numbers) so call sites can't
//! accidentally swap a `DatasetId` for a `UserId` at the type level.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            #[allow(clippy::disallowed_methods)]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing uuid (e.g. one supplied by a client).
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Unwrap the inner uuid.
            pub fn uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Tenant/application namespace (§3 "Context").
    ContextId
);
uuid_id!(
    /// A logical container of rows and a linear header log (§3 "Dataset").
    DatasetId
);
uuid_id!(
    /// A registered user (§3 "User").
    UserId
);
uuid_id!(
    /// A user's registered device. Client-supplied, not server-generated.
    NodeId
);
uuid_id!(
    /// An `Entity` (table-like schema object) within a schema version.
    EntityId
);
uuid_id!(
    /// A `Transaction` (named operation template) within a schema version.
    TransactionId
);
uuid_id!(
    /// A `Role` (capabilities bag) within a schema version.
    RoleId
);
uuid_id!(
    /// A `Module` (per-entity visible-attribute mask) within a schema version.
    ModuleId
);

/// Attribute/key id: a small positive integer addressing one column within
/// an [`crate::schema::Entity`]'s key set or attribute set (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(pub u16);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attr#{}", self.0)
    }
}

impl From<u16> for AttributeId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Server-assigned, monotonic, gap-free id of a committed [`crate::Header`]
/// within one dataset's log (§3 invariant I1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeaderId(pub u32);

impl HeaderId {
    /// The id immediately after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for HeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "header#{}", self.0)
    }
}

/// Client-side, per-(dataset, author node) sequence number of a `Header`
/// (§3 invariant I2). Distinct from [`HeaderId`], which the server assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeSeq(pub u32);

impl fmt::Display for NodeSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-seq#{}", self.0)
    }
}

/// Per-header order of a `Change` (§3 "Change").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeId(pub u16);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "change#{}", self.0)
    }
}

/// Schema version number. Versions are dense and monotonically increasing
/// per [`ContextId`] (§3 "SchemaVersion").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(pub u32);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_distinguishable_types_that_roundtrip() {
        let raw = Uuid::new_v4();
        let ctx = ContextId::from_uuid(raw);
        assert_eq!(ctx.uuid(), raw);
        assert_eq!(Uuid::from(ctx), raw);
    }

    #[test]
    fn header_id_next_increments() {
        assert_eq!(HeaderId(5).next(), HeaderId(6));
    }
}
