//! The DAO contract the core depends on (§6.3).
//!
//! "Minimally-typed persistence layer exposing per entity: read(by id),
//! read(by composite key), list-by-parent, save, update, remove, plus
//! scoped transactions with begin/commit/rollback, and per-resource
//! lock(name)/unlock(name)." The contract assumes read-committed semantics
//! and that a lock held by a worker is released automatically on failure —
//! [`crate::memory::MemoryDao`] is the only implementation; a real SQL-backed
//! one is out of scope (`spec.md` §1).

use crate::errors::StorageError;
use crate::model::{ChangeRecord, DatasetRecord, Downloaded, HeaderRecord, MemberRecord, NodeRecord, PushRecord, UserRecord};
use async_trait::async_trait;
use beehive_core::{AttributeRecord, ContextId, DatasetId, EntityId, HeaderId, NodeId, UserId};

/// Opaque handle to an in-flight transaction, scoped to one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnId(pub u64);

/// RAII guard for a named resource lock (§6.3, §5's per-dataset exclusive
/// lock). Releases on drop regardless of how the holder exits, satisfying
/// the "released automatically on failure" requirement without relying on
/// callers to remember to unlock.
pub struct LockGuard {
    pub(crate) _inner: async_lock::MutexGuardArc<()>,
}

/// The persistence contract the storage engine (and, indirectly, the
/// validator's callers) is built against.
#[async_trait]
pub trait Dao: Send + Sync {
    // Users
    async fn read_user(&self, context: ContextId, user: UserId) -> Result<Option<UserRecord>, StorageError>;
    async fn read_user_by_identifier(&self, context: ContextId, identifier: &str) -> Result<Option<UserRecord>, StorageError>;
    async fn save_user(&self, record: UserRecord) -> Result<(), StorageError>;
    async fn remove_user(&self, context: ContextId, user: UserId) -> Result<(), StorageError>;

    // Nodes
    async fn read_node(&self, user: UserId, node: NodeId) -> Result<Option<NodeRecord>, StorageError>;
    async fn list_nodes_by_user(&self, user: UserId) -> Result<Vec<NodeRecord>, StorageError>;
    async fn save_node(&self, record: NodeRecord) -> Result<(), StorageError>;
    async fn remove_node(&self, user: UserId, node: NodeId) -> Result<(), StorageError>;
    async fn remove_nodes_by_user(&self, user: UserId) -> Result<(), StorageError>;

    // Datasets
    async fn read_dataset(&self, dataset: DatasetId) -> Result<Option<DatasetRecord>, StorageError>;
    async fn save_dataset(&self, record: DatasetRecord) -> Result<(), StorageError>;
    async fn remove_dataset(&self, dataset: DatasetId) -> Result<(), StorageError>;

    // Members
    async fn read_member(&self, dataset: DatasetId, user: UserId) -> Result<Option<MemberRecord>, StorageError>;
    async fn list_members(&self, dataset: DatasetId) -> Result<Vec<MemberRecord>, StorageError>;
    async fn list_datasets_by_user(&self, user: UserId) -> Result<Vec<DatasetId>, StorageError>;
    async fn save_member(&self, record: MemberRecord) -> Result<(), StorageError>;
    async fn remove_member(&self, dataset: DatasetId, user: UserId) -> Result<(), StorageError>;
    async fn remove_members_by_user(&self, user: UserId) -> Result<(), StorageError>;

    // Push (share) tokens
    async fn read_push(&self, dataset: DatasetId, uuid: &str) -> Result<Option<PushRecord>, StorageError>;
    async fn list_pushes(&self, dataset: DatasetId) -> Result<Vec<PushRecord>, StorageError>;
    async fn save_push(&self, record: PushRecord) -> Result<(), StorageError>;
    async fn remove_push(&self, dataset: DatasetId, uuid: &str) -> Result<(), StorageError>;

    // Headers
    async fn next_header_id(&self, dataset: DatasetId) -> Result<HeaderId, StorageError>;
    async fn save_header(&self, record: HeaderRecord) -> Result<(), StorageError>;
    async fn read_headers_after(&self, dataset: DatasetId, from: HeaderId) -> Result<Vec<HeaderRecord>, StorageError>;

    // Downloaded cursor
    async fn read_downloaded(&self, node: NodeId, dataset: DatasetId) -> Result<Downloaded, StorageError>;
    async fn save_downloaded(&self, node: NodeId, dataset: DatasetId, cursor: Downloaded) -> Result<(), StorageError>;

    // Entity rows (§4.5). Keys/values are already in binary form.
    async fn read_row(&self, dataset: DatasetId, entity: EntityId, pk: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    async fn insert_row(&self, dataset: DatasetId, entity: EntityId, pk: Vec<u8>, data: Vec<u8>) -> Result<(), StorageError>;
    async fn update_row(&self, dataset: DatasetId, entity: EntityId, pk: &[u8], data: Vec<u8>) -> Result<(), StorageError>;
    async fn delete_row(&self, dataset: DatasetId, entity: EntityId, pk: &[u8]) -> Result<(), StorageError>;
    async fn list_rows(&self, dataset: DatasetId, entity: EntityId) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    // Scoped transactions: every row mutation between `begin` and
    // `commit`/`rollback` for one dataset is undone on rollback.
    async fn begin(&self, dataset: DatasetId) -> Result<TxnId, StorageError>;
    async fn commit(&self, txn: TxnId) -> Result<(), StorageError>;
    async fn rollback(&self, txn: TxnId) -> Result<(), StorageError>;

    // Named resource lock.
    async fn lock(&self, name: &str) -> Result<LockGuard, StorageError>;
}

/// A decoded row key/value pair paired with the attribute ids it carries,
/// used when streaming a full-entity snapshot (§4.9 Phase C(iv)).
pub type RawRow = (Vec<u8>, Vec<u8>);

/// Convenience alias matching `spec.md`'s `(attribute_id, value)` shape,
/// re-exported here so call sites don't need to depend on `beehive_core`
/// just to spell the DAO's row types.
pub type Record = AttributeRecord;
pub type Change = ChangeRecord;
