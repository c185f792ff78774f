//! Persisted record shapes for the entities the storage engine owns (§3).
//!
//! These are distinct from `beehive_core`'s schema types: `Entity`/`Role`/
//! `Transaction` describe the *shape* of data; the records here are rows of
//! data governed by that shape.

use beehive_core::{
    ChangeId, ContextId, DatasetId, EntityId, HeaderId, ModuleId, NodeId, NodeSeq, Operation,
    RoleId, UserId, ValidationCode, Version,
};

/// A registered user (§3 "User"). Unique by `(context, identifier)`.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Stable identity.
    pub id: UserId,
    /// Owning tenant.
    pub context: ContextId,
    /// Lowercase email; the natural key within a context.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Identity provider this user authenticates through.
    pub user_type: UserType,
    /// Password hash (internal users only).
    pub password_hash: Option<Vec<u8>>,
    /// Password salt (internal users only).
    pub salt: Option<Vec<u8>>,
}

/// `User.type` (§3), left open beyond the two named providers so a context
/// can plug in another OIDC-style issuer without a core change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserType {
    /// Local email + password credentials.
    Internal,
    /// Google-issued JWT (`iss == accounts.google.com`).
    Google,
    /// Any other issuer, named verbatim.
    Other(String),
}

/// A device registered for a user (§3 "Node"). Unique by `(user, uuid)`.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    /// Client-supplied identity.
    pub id: NodeId,
    /// Owning user.
    pub user: UserId,
    /// Owning tenant.
    pub context: ContextId,
    /// 16 random bytes, rotated on every sign-in (§4.7).
    pub key: [u8; 16],
    /// Client build's declared visible-attribute module.
    pub module: ModuleId,
    /// Schema version the client last advertised.
    pub version: Version,
}

/// `Dataset.status` (§3). The spec leaves this open beyond "exists"; a
/// deleted dataset is tombstoned rather than removed so headers that
/// reference it remain resolvable for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    /// Normal, syncable dataset.
    Active,
    /// Soft-deleted; no longer accepts syncs.
    Deleted,
}

/// A logical container of rows and a linear header log (§3 "Dataset").
#[derive(Debug, Clone)]
pub struct DatasetRecord {
    /// Stable identity.
    pub id: DatasetId,
    /// Owning tenant.
    pub context: ContextId,
    /// The user who created it; the only caller who may delete it (§4.6).
    pub owner: UserId,
    /// Highest `idHeader` committed so far (monotonic, §4.4).
    pub id_header: HeaderId,
    /// Lifecycle state.
    pub status: DatasetStatus,
}

/// `Member.status` (§3): `0` is a tombstone, `1` is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// Tombstoned; the (dataset, user) pair keeps its row for audit/history.
    Inactive = 0,
    /// Normal, syncing member.
    Active = 1,
}

/// A user's membership in a dataset (§3 "Member"). Exactly one active
/// member per `(dataset, user)` (invariant I5).
#[derive(Debug, Clone)]
pub struct MemberRecord {
    /// Dataset this membership is in.
    pub dataset: DatasetId,
    /// Member's user.
    pub user: UserId,
    /// Role granting this member's capabilities.
    pub role: RoleId,
    /// Display name shown to peers (defaults to the user's name on join).
    pub name: String,
    /// Lifecycle state.
    pub status: MemberStatus,
}

/// A time- and count-limited share invite (§3 "Push", §4.8).
#[derive(Debug, Clone)]
pub struct PushRecord {
    /// Random 27 bytes, base64-encoded; the natural key within a dataset.
    pub uuid: String,
    /// Dataset this invite grants access to.
    pub dataset: DatasetId,
    /// Role a redeemer receives.
    pub role: RoleId,
    /// Unix epoch seconds after which the invite is no longer redeemable.
    pub until: i64,
    /// Remaining redemptions; `0` means unlimited (invariant I6).
    pub number: u32,
}

/// One persisted row-level mutation within a [`HeaderRecord`] (§3 "Change").
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    /// Per-header order.
    pub id_change: ChangeId,
    /// Entity the change targeted.
    pub entity: EntityId,
    /// Mutation kind.
    pub operation: Operation,
    /// Binary-form new primary key (Insert, Update).
    pub new_pk: Vec<beehive_core::AttributeRecord>,
    /// Binary-form new attribute values (Insert, Update).
    pub new_data: Vec<beehive_core::AttributeRecord>,
    /// Binary-form existing primary key (Update, Delete).
    pub old_pk: Vec<beehive_core::AttributeRecord>,
    /// Per-change outcome (`success`, `skipEntity`, or the header's final
    /// short-circuiting code).
    pub status: ValidationCode,
}

/// One committed transaction on a dataset (§3 "Header").
#[derive(Debug, Clone)]
pub struct HeaderRecord {
    /// Server-assigned, monotonic, gap-free within `dataset` (invariant I1).
    pub id: HeaderId,
    /// Dataset this header was committed to.
    pub dataset: DatasetId,
    /// Authoring node.
    pub node: NodeId,
    /// Client-side per-(dataset, node) sequence number (invariant I2).
    pub id_node: NodeSeq,
    /// Name of the `Transaction` this header invokes.
    pub transaction_name: String,
    /// Schema version the author targeted.
    pub version: Version,
    /// Overall validation/apply outcome, persisted even on failure
    /// (invariant I3).
    pub status: ValidationCode,
    /// Ordered changes, truncated at the short-circuiting one on failure.
    pub changes: Vec<ChangeRecord>,
}

/// Per-(node, dataset) cursor into the header log (§3 "Downloaded", §4.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Downloaded {
    /// Highest `idHeader` this node has applied or received.
    pub last_applied_id_header: u32,
    /// Highest `idNode` this node has seen from its own uploads (or, on the
    /// download side, the last author sequence it reconciled).
    pub last_seen_author_id_node: u32,
}
