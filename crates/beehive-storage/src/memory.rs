//! The in-memory reference [`Dao`] implementation (§6.3).
//!
//! No SQL dialect is modeled — everything lives in process memory behind
//! `parking_lot` locks, matching the grounding workspace's own stance that
//! only an in-memory store ships by default. Good enough for tests, the
//! standalone binary, and anything that doesn't need the data to survive a
//! restart.

use crate::dao::{Dao, LockGuard, TxnId};
use crate::errors::StorageError;
use crate::model::{DatasetRecord, Downloaded, HeaderRecord, MemberRecord, NodeRecord, PushRecord, UserRecord};
use async_trait::async_trait;
use beehive_core::{ContextId, DatasetId, EntityId, HeaderId, NodeId, UserId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type RowKey = (DatasetId, EntityId, Vec<u8>);

#[derive(Default, Clone)]
struct TxnSnapshot {
    headers: Vec<HeaderRecord>,
    rows: HashMap<RowKey, Vec<u8>>,
}

/// An in-memory, process-local [`Dao`].
#[derive(Default)]
pub struct MemoryDao {
    users: RwLock<HashMap<(ContextId, UserId), UserRecord>>,
    nodes: RwLock<HashMap<(UserId, NodeId), NodeRecord>>,
    datasets: RwLock<HashMap<DatasetId, DatasetRecord>>,
    members: RwLock<HashMap<(DatasetId, UserId), MemberRecord>>,
    pushes: RwLock<HashMap<(DatasetId, String), PushRecord>>,
    headers: RwLock<HashMap<DatasetId, Vec<HeaderRecord>>>,
    downloaded: RwLock<HashMap<(NodeId, DatasetId), Downloaded>>,
    rows: RwLock<HashMap<RowKey, Vec<u8>>>,
    locks: Mutex<HashMap<String, Arc<async_lock::Mutex<()>>>>,
    txns: Mutex<HashMap<u64, (DatasetId, TxnSnapshot)>>,
    next_txn: AtomicU64,
}

impl MemoryDao {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Dao for MemoryDao {
    async fn read_user(&self, context: ContextId, user: UserId) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.users.read().get(&(context, user)).cloned())
    }

    async fn read_user_by_identifier(&self, context: ContextId, identifier: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.context == context && u.identifier.eq_ignore_ascii_case(identifier))
            .cloned())
    }

    async fn save_user(&self, record: UserRecord) -> Result<(), StorageError> {
        self.users.write().insert((record.context, record.id), record);
        Ok(())
    }

    async fn remove_user(&self, context: ContextId, user: UserId) -> Result<(), StorageError> {
        self.users.write().remove(&(context, user));
        Ok(())
    }

    async fn read_node(&self, user: UserId, node: NodeId) -> Result<Option<NodeRecord>, StorageError> {
        Ok(self.nodes.read().get(&(user, node)).cloned())
    }

    async fn list_nodes_by_user(&self, user: UserId) -> Result<Vec<NodeRecord>, StorageError> {
        Ok(self.nodes.read().values().filter(|n| n.user == user).cloned().collect())
    }

    async fn save_node(&self, record: NodeRecord) -> Result<(), StorageError> {
        self.nodes.write().insert((record.user, record.id), record);
        Ok(())
    }

    async fn remove_node(&self, user: UserId, node: NodeId) -> Result<(), StorageError> {
        self.nodes.write().remove(&(user, node));
        Ok(())
    }

    async fn remove_nodes_by_user(&self, user: UserId) -> Result<(), StorageError> {
        self.nodes.write().retain(|(u, _), _| *u != user);
        Ok(())
    }

    async fn read_dataset(&self, dataset: DatasetId) -> Result<Option<DatasetRecord>, StorageError> {
        Ok(self.datasets.read().get(&dataset).cloned())
    }

    async fn save_dataset(&self, record: DatasetRecord) -> Result<(), StorageError> {
        self.datasets.write().insert(record.id, record);
        Ok(())
    }

    async fn remove_dataset(&self, dataset: DatasetId) -> Result<(), StorageError> {
        self.datasets.write().remove(&dataset);
        Ok(())
    }

    async fn read_member(&self, dataset: DatasetId, user: UserId) -> Result<Option<MemberRecord>, StorageError> {
        Ok(self.members.read().get(&(dataset, user)).cloned())
    }

    async fn list_members(&self, dataset: DatasetId) -> Result<Vec<MemberRecord>, StorageError> {
        Ok(self.members.read().values().filter(|m| m.dataset == dataset).cloned().collect())
    }

    async fn list_datasets_by_user(&self, user: UserId) -> Result<Vec<DatasetId>, StorageError> {
        Ok(self
            .members
            .read()
            .values()
            .filter(|m| m.user == user)
            .map(|m| m.dataset)
            .collect())
    }

    async fn save_member(&self, record: MemberRecord) -> Result<(), StorageError> {
        self.members.write().insert((record.dataset, record.user), record);
        Ok(())
    }

    async fn remove_member(&self, dataset: DatasetId, user: UserId) -> Result<(), StorageError> {
        self.members.write().remove(&(dataset, user));
        Ok(())
    }

    async fn remove_members_by_user(&self, user: UserId) -> Result<(), StorageError> {
        self.members.write().retain(|(_, u), _| *u != user);
        Ok(())
    }

    async fn read_push(&self, dataset: DatasetId, uuid: &str) -> Result<Option<PushRecord>, StorageError> {
        Ok(self.pushes.read().get(&(dataset, uuid.to_string())).cloned())
    }

    async fn list_pushes(&self, dataset: DatasetId) -> Result<Vec<PushRecord>, StorageError> {
        Ok(self.pushes.read().values().filter(|p| p.dataset == dataset).cloned().collect())
    }

    async fn save_push(&self, record: PushRecord) -> Result<(), StorageError> {
        self.pushes.write().insert((record.dataset, record.uuid.clone()), record);
        Ok(())
    }

    async fn remove_push(&self, dataset: DatasetId, uuid: &str) -> Result<(), StorageError> {
        self.pushes.write().remove(&(dataset, uuid.to_string()));
        Ok(())
    }

    async fn next_header_id(&self, dataset: DatasetId) -> Result<HeaderId, StorageError> {
        let current = self
            .datasets
            .read()
            .get(&dataset)
            .map(|d| d.id_header)
            .unwrap_or(HeaderId(0));
        Ok(current.next())
    }

    async fn save_header(&self, record: HeaderRecord) -> Result<(), StorageError> {
        if let Some(dataset) = self.datasets.write().get_mut(&record.dataset) {
            if record.id.0 > dataset.id_header.0 {
                dataset.id_header = record.id;
            }
        }
        self.headers.write().entry(record.dataset).or_default().push(record);
        Ok(())
    }

    async fn read_headers_after(&self, dataset: DatasetId, from: HeaderId) -> Result<Vec<HeaderRecord>, StorageError> {
        Ok(self
            .headers
            .read()
            .get(&dataset)
            .map(|headers| headers.iter().filter(|h| h.id.0 > from.0).cloned().collect())
            .unwrap_or_default())
    }

    async fn read_downloaded(&self, node: NodeId, dataset: DatasetId) -> Result<Downloaded, StorageError> {
        Ok(self.downloaded.read().get(&(node, dataset)).copied().unwrap_or_default())
    }

    async fn save_downloaded(&self, node: NodeId, dataset: DatasetId, cursor: Downloaded) -> Result<(), StorageError> {
        self.downloaded.write().insert((node, dataset), cursor);
        Ok(())
    }

    async fn read_row(&self, dataset: DatasetId, entity: EntityId, pk: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.rows.read().get(&(dataset, entity, pk.to_vec())).cloned())
    }

    async fn insert_row(&self, dataset: DatasetId, entity: EntityId, pk: Vec<u8>, data: Vec<u8>) -> Result<(), StorageError> {
        let mut rows = self.rows.write();
        let key = (dataset, entity, pk);
        if rows.contains_key(&key) {
            return Err(StorageError::already_exists("row"));
        }
        rows.insert(key, data);
        Ok(())
    }

    async fn update_row(&self, dataset: DatasetId, entity: EntityId, pk: &[u8], data: Vec<u8>) -> Result<(), StorageError> {
        let mut rows = self.rows.write();
        let key = (dataset, entity, pk.to_vec());
        if !rows.contains_key(&key) {
            return Err(StorageError::not_found("row"));
        }
        rows.insert(key, data);
        Ok(())
    }

    async fn delete_row(&self, dataset: DatasetId, entity: EntityId, pk: &[u8]) -> Result<(), StorageError> {
        let mut rows = self.rows.write();
        let key = (dataset, entity, pk.to_vec());
        if rows.remove(&key).is_none() {
            return Err(StorageError::not_found("row"));
        }
        Ok(())
    }

    async fn list_rows(&self, dataset: DatasetId, entity: EntityId) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|((d, e, _), _)| *d == dataset && *e == entity)
            .map(|((_, _, pk), data)| (pk.clone(), data.clone()))
            .collect())
    }

    async fn begin(&self, dataset: DatasetId) -> Result<TxnId, StorageError> {
        let snapshot = TxnSnapshot {
            headers: self.headers.read().get(&dataset).cloned().unwrap_or_default(),
            rows: self
                .rows
                .read()
                .iter()
                .filter(|((d, _, _), _)| *d == dataset)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let id = self.next_txn.fetch_add(1, Ordering::SeqCst);
        self.txns.lock().insert(id, (dataset, snapshot));
        Ok(TxnId(id))
    }

    async fn commit(&self, txn: TxnId) -> Result<(), StorageError> {
        self.txns
            .lock()
            .remove(&txn.0)
            .ok_or(StorageError::TransactionNotActive(txn.0))?;
        Ok(())
    }

    async fn rollback(&self, txn: TxnId) -> Result<(), StorageError> {
        let (dataset, snapshot) = self
            .txns
            .lock()
            .remove(&txn.0)
            .ok_or(StorageError::TransactionNotActive(txn.0))?;

        self.headers.write().insert(dataset, snapshot.headers);

        let mut rows = self.rows.write();
        rows.retain(|(d, _, _), _| *d != dataset);
        rows.extend(snapshot.rows);
        Ok(())
    }

    async fn lock(&self, name: &str) -> Result<LockGuard, StorageError> {
        let mutex = {
            let mut locks = self.locks.lock();
            locks.entry(name.to_string()).or_insert_with(|| Arc::new(async_lock::Mutex::new(()))).clone()
        };
        let guard = mutex.lock_arc().await;
        Ok(LockGuard { _inner: guard })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beehive_core::DatasetId as Did;

    #[tokio::test]
    async fn insert_then_duplicate_insert_conflicts() {
        let dao = MemoryDao::new();
        let dataset = Did::new();
        let entity = EntityId::new();
        dao.insert_row(dataset, entity, vec![1], vec![9]).await.unwrap();
        let err = dao.insert_row(dataset, entity, vec![1], vec![9]).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn rollback_restores_rows_added_during_txn() {
        let dao = MemoryDao::new();
        let dataset = Did::new();
        let entity = EntityId::new();
        dao.insert_row(dataset, entity, vec![1], vec![1]).await.unwrap();

        let txn = dao.begin(dataset).await.unwrap();
        dao.insert_row(dataset, entity, vec![2], vec![2]).await.unwrap();
        dao.update_row(dataset, entity, &[1], vec![99]).await.unwrap();
        dao.rollback(txn).await.unwrap();

        assert_eq!(dao.read_row(dataset, entity, &[1]).await.unwrap(), Some(vec![1]));
        assert_eq!(dao.read_row(dataset, entity, &[2]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn named_lock_serializes_two_waiters() {
        let dao = Arc::new(MemoryDao::new());
        let guard = dao.lock("dataset-1").await.unwrap();
        let dao2 = dao.clone();
        let waiter = tokio::spawn(async move { dao2.lock("dataset-1").await.unwrap() });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }
}
