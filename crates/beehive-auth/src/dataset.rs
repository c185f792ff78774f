//! Dataset-membership authorization (§4.6): the capability table that
//! gates member management, sharing, and dataset deletion.

use crate::errors::AuthError;
use beehive_core::{DatasetId, RoleId, SchemaVersion, UserId};
use beehive_storage::{Dao, DatasetRecord, MemberRecord, MemberStatus};

/// One capability a dataset's role can grant, per §4.6's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// List a dataset's members (and see their roles).
    ReadMembers,
    /// Change a member's role, or remove a member.
    ManageMembers,
    /// Issue share (push) tokens.
    ShareDataset,
    /// List or cancel outstanding share tokens.
    ManageShare,
}

impl Capability {
    fn label(self) -> &'static str {
        match self {
            Self::ReadMembers => "readmembers",
            Self::ManageMembers => "managemembers",
            Self::ShareDataset => "sharedataset",
            Self::ManageShare => "manageshare",
        }
    }

    fn granted_by(self, role: &beehive_core::Role) -> bool {
        match self {
            Self::ReadMembers => role.readmembers,
            Self::ManageMembers => role.managemembers,
            Self::ShareDataset => role.sharedataset,
            Self::ManageShare => role.manageshare,
        }
    }
}

/// Look up a caller's membership in a dataset, failing if they are not a
/// member at all.
pub async fn require_member(dao: &dyn Dao, dataset: DatasetId, user: UserId) -> Result<MemberRecord, AuthError> {
    dao.read_member(dataset, user).await?.ok_or(AuthError::NotFound { kind: "member" })
}

/// As [`require_member`], but additionally requires the membership be
/// active (not tombstoned) — the gate every sync session and header
/// submission goes through before the validator ever sees the header.
pub async fn require_active_member(dao: &dyn Dao, dataset: DatasetId, user: UserId) -> Result<MemberRecord, AuthError> {
    let member = require_member(dao, dataset, user).await?;
    if member.status != MemberStatus::Active {
        return Err(AuthError::NotEnoughRights {
            capability: "active membership",
        });
    }
    Ok(member)
}

/// Resolve a member's role against a schema version.
pub fn resolve_role<'a>(schema: &'a SchemaVersion, member: &MemberRecord) -> Result<&'a beehive_core::Role, AuthError> {
    schema.role(member.role).ok_or_else(|| {
        AuthError::InvalidSchema(beehive_core::SchemaError::UnknownUuid {
            kind: "role",
            uuid: member.role.uuid(),
        })
    })
}

/// Require the caller to be an active member whose role grants `capability`.
pub async fn require_capability(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    dataset: DatasetId,
    user: UserId,
    capability: Capability,
) -> Result<(MemberRecord, beehive_core::Role), AuthError> {
    let member = require_active_member(dao, dataset, user).await?;
    let role = resolve_role(schema, &member)?.clone();
    if !capability.granted_by(&role) {
        return Err(AuthError::NotEnoughRights {
            capability: capability.label(),
        });
    }
    Ok((member, role))
}

/// A dataset member as exposed to a peer listing members, with the email
/// address present only when the caller's role grants `reademail` on top
/// of `readmembers` (§4.6).
#[derive(Debug, Clone)]
pub struct MemberView {
    /// The member's user.
    pub user: UserId,
    /// Their role in this dataset.
    pub role: RoleId,
    /// Display name shown to peers.
    pub name: String,
    /// Lifecycle state.
    pub status: MemberStatus,
    /// Present only if the caller may read emails.
    pub email: Option<String>,
}

/// List a dataset's members, masking email addresses unless the caller's
/// role grants `reademail` (§4.6).
pub async fn list_members(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    dataset: DatasetId,
    caller: UserId,
) -> Result<Vec<MemberView>, AuthError> {
    let (_, caller_role) = require_capability(dao, schema, dataset, caller, Capability::ReadMembers).await?;
    let members = dao.list_members(dataset).await?;
    let mut views = Vec::with_capacity(members.len());
    for member in members {
        let email = if caller_role.reademail {
            dao.read_user(member_context(dao, &member).await?, member.user)
                .await?
                .map(|u| u.identifier)
        } else {
            None
        };
        views.push(MemberView {
            user: member.user,
            role: member.role,
            name: member.name,
            status: member.status,
            email,
        });
    }
    Ok(views)
}

async fn member_context(dao: &dyn Dao, member: &MemberRecord) -> Result<beehive_core::ContextId, AuthError> {
    let dataset = dao
        .read_dataset(member.dataset)
        .await?
        .ok_or(AuthError::NotFound { kind: "dataset" })?;
    Ok(dataset.context)
}

/// Change a member's role. A member may never change their own role
/// (§4.6) — that would let a caller escalate or lock in their own
/// privileges unilaterally.
pub async fn update_member_role(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    dataset: DatasetId,
    caller: UserId,
    target: UserId,
    new_role: RoleId,
) -> Result<MemberRecord, AuthError> {
    require_capability(dao, schema, dataset, caller, Capability::ManageMembers).await?;
    if caller == target {
        return Err(AuthError::NotEnoughRights {
            capability: "change own role",
        });
    }
    schema.role(new_role).ok_or_else(|| {
        AuthError::InvalidSchema(beehive_core::SchemaError::UnknownUuid {
            kind: "role",
            uuid: new_role.uuid(),
        })
    })?;
    let mut member = dao
        .read_member(dataset, target)
        .await?
        .ok_or(AuthError::NotFound { kind: "member" })?;
    member.role = new_role;
    dao.save_member(member.clone()).await?;
    Ok(member)
}

/// Remove a member from a dataset.
pub async fn remove_member(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    dataset: DatasetId,
    caller: UserId,
    target: UserId,
) -> Result<(), AuthError> {
    require_capability(dao, schema, dataset, caller, Capability::ManageMembers).await?;
    dao.remove_member(dataset, target).await?;
    Ok(())
}

/// Delete a dataset. Only its owner may do this (§4.6); membership
/// capabilities don't extend to deleting the dataset itself.
pub async fn delete_dataset(dao: &dyn Dao, dataset: DatasetId, caller: UserId) -> Result<(), AuthError> {
    let record: DatasetRecord = dao.read_dataset(dataset).await?.ok_or(AuthError::NotFound { kind: "dataset" })?;
    if record.owner != caller {
        return Err(AuthError::NotEnoughRights { capability: "owner" });
    }
    dao.remove_dataset(dataset).await?;
    Ok(())
}
