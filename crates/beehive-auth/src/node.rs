//! Node registration and reconnection tokens (§4.7).
//!
//! `spec.md`'s wire format describes a 20-byte reconnection token bound to
//! the original implementation's node-key scheme. This crate instead
//! composes the token as `nodeKey(16) ∥ nodeUuid(16) ∥ userUuid(16)` — 48
//! raw bytes, base64-encoded — so reconnection can resolve the node
//! directly instead of requiring a side index from key to node. See
//! `DESIGN.md` for the rationale.

use crate::errors::AuthError;
use crate::user::constant_time_eq;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use beehive_core::{ModuleId, NodeId, UserId, Version};
use beehive_storage::{Dao, NodeRecord};
use rand::RngCore;
use uuid::Uuid;

/// Raw byte length of a reconnection token, before base64 encoding.
pub const RECONNECT_TOKEN_RAW_LEN: usize = 48;

fn fresh_node_key() -> [u8; 16] {
    let mut key = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Compose a reconnection token for a freshly (re)keyed node.
pub fn issue_reconnect_token(node: &NodeRecord, user: UserId) -> String {
    let mut raw = Vec::with_capacity(RECONNECT_TOKEN_RAW_LEN);
    raw.extend_from_slice(&node.key);
    raw.extend_from_slice(node.id.uuid().as_bytes());
    raw.extend_from_slice(user.uuid().as_bytes());
    BASE64.encode(raw)
}

/// Register (or rotate the key of) a node for a just-authenticated user,
/// returning the node record and a fresh reconnection token (§4.7).
pub async fn register_node(
    dao: &dyn Dao,
    user: UserId,
    context: beehive_core::ContextId,
    node_uuid: Uuid,
    module: ModuleId,
    version: Version,
) -> Result<(NodeRecord, String), AuthError> {
    let node = NodeRecord {
        id: NodeId::from_uuid(node_uuid),
        user,
        context,
        key: fresh_node_key(),
        module,
        version,
    };
    dao.save_node(node.clone()).await?;
    let token = issue_reconnect_token(&node, user);
    Ok((node, token))
}

/// Reconnect using a previously issued token: decode it, look up the
/// claimed node, and constant-time compare the embedded key against the
/// stored one.
pub async fn reconnect(dao: &dyn Dao, token: &str) -> Result<NodeRecord, AuthError> {
    let raw = BASE64.decode(token).map_err(|_| AuthError::AuthenticationFailed)?;
    if raw.len() != RECONNECT_TOKEN_RAW_LEN {
        return Err(AuthError::AuthenticationFailed);
    }
    let (key, rest) = raw.split_at(16);
    let (node_uuid_bytes, user_uuid_bytes) = rest.split_at(16);
    let node_uuid = Uuid::from_slice(node_uuid_bytes).map_err(|_| AuthError::AuthenticationFailed)?;
    let user_uuid = Uuid::from_slice(user_uuid_bytes).map_err(|_| AuthError::AuthenticationFailed)?;

    let node = dao
        .read_node(UserId::from_uuid(user_uuid), NodeId::from_uuid(node_uuid))
        .await?
        .ok_or(AuthError::AuthenticationFailed)?;
    if !constant_time_eq(&node.key, key) {
        return Err(AuthError::AuthenticationFailed);
    }
    Ok(node)
}

/// Sign a node out, dropping its registration (§4.7).
pub async fn sign_out(dao: &dyn Dao, user: UserId, node: NodeId) -> Result<(), AuthError> {
    dao.remove_node(user, node).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beehive_core::ContextId;
    use beehive_storage::MemoryDao;

    #[tokio::test]
    async fn register_then_reconnect_round_trips() {
        let dao = MemoryDao::new();
        let user = UserId::new();
        let context = ContextId::new();
        let (node, token) = register_node(&dao, user, context, Uuid::new_v4(), ModuleId::new(), Version(1))
            .await
            .unwrap();

        let reconnected = reconnect(&dao, &token).await.unwrap();
        assert_eq!(reconnected.id, node.id);
        assert_eq!(reconnected.user, user);
    }

    #[tokio::test]
    async fn reconnect_rejects_tampered_token() {
        let dao = MemoryDao::new();
        let user = UserId::new();
        let context = ContextId::new();
        let (_, token) = register_node(&dao, user, context, Uuid::new_v4(), ModuleId::new(), Version(1))
            .await
            .unwrap();
        let mut raw = BASE64.decode(&token).unwrap();
        raw[0] ^= 0xff;
        let tampered = BASE64.encode(raw);

        let err = reconnect(&dao, &tampered).await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn reconnect_rejects_malformed_token() {
        let dao = MemoryDao::new();
        let err = reconnect(&dao, "not-base64!!").await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }
}
