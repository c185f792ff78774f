//! Share (push) tokens (§4.8): time- and count-limited dataset invites.

use crate::dataset::{require_capability, Capability};
use crate::errors::AuthError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use beehive_core::{RoleId, SchemaVersion, UserId};
use beehive_storage::{Dao, DatasetId, MemberRecord, MemberStatus, PushRecord};
use rand::RngCore;

fn fresh_push_uuid() -> String {
    let mut raw = [0u8; 27];
    rand::thread_rng().fill_bytes(&mut raw);
    BASE64.encode(raw)
}

/// Issue a share token. Requires `sharedataset` (§4.6).
pub async fn push(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    dataset: DatasetId,
    caller: UserId,
    role: RoleId,
    until: i64,
    number: u32,
) -> Result<PushRecord, AuthError> {
    require_capability(dao, schema, dataset, caller, Capability::ShareDataset).await?;
    schema.role(role).ok_or_else(|| {
        AuthError::InvalidSchema(beehive_core::SchemaError::UnknownUuid {
            kind: "role",
            uuid: role.uuid(),
        })
    })?;
    let record = PushRecord {
        uuid: fresh_push_uuid(),
        dataset,
        role,
        until,
        number,
    };
    dao.save_push(record.clone()).await?;
    Ok(record)
}

/// Redeem a share token: creates or reactivates the caller's membership at
/// the token's role, decrementing its remaining redemption count (`0`
/// means unlimited, invariant I6). An expired token is treated as if it
/// doesn't exist and removed on sight.
pub async fn pop(
    dao: &dyn Dao,
    dataset: DatasetId,
    push_uuid: &str,
    caller: UserId,
    caller_name: &str,
    now: i64,
) -> Result<MemberRecord, AuthError> {
    let mut record = dao.read_push(dataset, push_uuid).await?.ok_or(AuthError::NotFound { kind: "push" })?;
    if record.until < now {
        dao.remove_push(dataset, push_uuid).await?;
        return Err(AuthError::NotFound { kind: "push" });
    }

    let member = MemberRecord {
        dataset,
        user: caller,
        role: record.role,
        name: caller_name.to_string(),
        status: MemberStatus::Active,
    };
    dao.save_member(member.clone()).await?;

    if record.number > 0 {
        record.number -= 1;
        if record.number == 0 {
            dao.remove_push(dataset, push_uuid).await?;
        } else {
            dao.save_push(record).await?;
        }
    }
    Ok(member)
}

/// List outstanding share tokens. Requires `manageshare` (§4.6).
pub async fn list(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    dataset: DatasetId,
    caller: UserId,
) -> Result<Vec<PushRecord>, AuthError> {
    require_capability(dao, schema, dataset, caller, Capability::ManageShare).await?;
    Ok(dao.list_pushes(dataset).await?)
}

/// Cancel a share token before it is redeemed. Requires `manageshare` (§4.6).
pub async fn pull(dao: &dyn Dao, schema: &SchemaVersion, dataset: DatasetId, caller: UserId, push_uuid: &str) -> Result<(), AuthError> {
    require_capability(dao, schema, dataset, caller, Capability::ManageShare).await?;
    dao.remove_push(dataset, push_uuid).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beehive_core::{Role, Version};
    use beehive_storage::MemoryDao;

    fn sharing_schema() -> (SchemaVersion, RoleId, RoleId) {
        let owner_role_id = RoleId::new();
        let invited_role_id = RoleId::new();
        let owner_role = Role {
            id: owner_role_id,
            name: "Owner".into(),
            sharedataset: true,
            manageshare: true,
            ..Default::default()
        };
        let invited_role = Role {
            id: invited_role_id,
            name: "Invited".into(),
            ..Default::default()
        };
        let version = SchemaVersion::new(Version(1), vec![], vec![], vec![owner_role, invited_role], vec![]).unwrap();
        (version, owner_role_id, invited_role_id)
    }

    #[tokio::test]
    async fn push_then_pop_grants_membership_and_decrements_count() {
        let dao = MemoryDao::new();
        let (schema, owner_role, invited_role) = sharing_schema();
        let dataset = DatasetId::new();
        let owner = UserId::new();
        dao.save_member(MemberRecord {
            dataset,
            user: owner,
            role: owner_role,
            name: "Owner".into(),
            status: MemberStatus::Active,
        })
        .await
        .unwrap();

        let token = push(&dao, &schema, dataset, owner, invited_role, 1_000, 1).await.unwrap();

        let invitee = UserId::new();
        let member = pop(&dao, dataset, &token.uuid, invitee, "Invitee", 0).await.unwrap();
        assert_eq!(member.role, invited_role);

        // Single-use token is now gone.
        let err = pop(&dao, dataset, &token.uuid, UserId::new(), "Other", 0).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_and_removed() {
        let dao = MemoryDao::new();
        let (schema, owner_role, invited_role) = sharing_schema();
        let dataset = DatasetId::new();
        let owner = UserId::new();
        dao.save_member(MemberRecord {
            dataset,
            user: owner,
            role: owner_role,
            name: "Owner".into(),
            status: MemberStatus::Active,
        })
        .await
        .unwrap();

        let token = push(&dao, &schema, dataset, owner, invited_role, 10, 1).await.unwrap();
        let err = pop(&dao, dataset, &token.uuid, UserId::new(), "Invitee", 100).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
        assert!(dao.read_push(dataset, &token.uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pop_at_exact_expiry_instant_still_succeeds() {
        let dao = MemoryDao::new();
        let (schema, owner_role, invited_role) = sharing_schema();
        let dataset = DatasetId::new();
        let owner = UserId::new();
        dao.save_member(MemberRecord {
            dataset,
            user: owner,
            role: owner_role,
            name: "Owner".into(),
            status: MemberStatus::Active,
        })
        .await
        .unwrap();

        let token = push(&dao, &schema, dataset, owner, invited_role, 100, 1).await.unwrap();
        let member = pop(&dao, dataset, &token.uuid, UserId::new(), "Invitee", 100).await.unwrap();
        assert_eq!(member.role, invited_role);
    }
}
