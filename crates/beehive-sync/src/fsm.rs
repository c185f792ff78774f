//! The full-sync exchange (`z`, §4.9): one request carries every dataset
//! upload the client has pending, one response carries every dataset's
//! download, and the two phases run under that dataset's exclusive lock
//! only while the server-side work actually touches storage.
//!
//! Phase A (the client's declared dataset list) is advisory — the set of
//! datasets actually downloaded is always the caller's current membership,
//! read fresh from storage rather than trusted from the wire.

use crate::errors::SyncError;
use crate::session::AuthenticatedSession;
use beehive_core::{
    codec, AttributeId, AttributeRecord, AttributeValue, Change, DatasetId, Entity, EntityId, HeaderId, Module,
    NodeSeq, Operation, Role, SchemaError, SchemaVersion, Version,
};
use beehive_storage::{
    apply_header, ChangeRecord, Dao, DatasetRecord, DatasetStatus, Downloaded, HeaderInput, HeaderRecord,
    MemberRecord, MemberStatus, ScriptHooks, UserRecord, UserType,
};
use beehive_wire::fullsync::{
    ChangeFrame, ContainerAnnounce, DatasetUpload, HeaderDownload, HeaderUpload, InviteUpload, MemberAnnounce,
    PushAnnounce, RowSnapshot,
};
use std::collections::HashSet;
use uuid::Uuid;

/// One dataset's worth of Phase B upload: its cursor announcement plus the
/// optional invite and header sub-streams.
#[derive(Debug, Clone)]
pub struct DatasetUploadBundle {
    pub upload: DatasetUpload,
    pub invites: Vec<InviteUpload>,
    pub headers: Vec<HeaderUpload>,
}

/// The full decoded `z` request: Phase A's declared datasets (kept only for
/// wire-shape parity — membership, not this list, decides what's
/// downloaded) plus every Phase B upload bundle.
#[derive(Debug, Clone, Default)]
pub struct FullSyncRequest {
    pub declared_datasets: Vec<Uuid>,
    pub uploads: Vec<DatasetUploadBundle>,
}

/// One dataset's Phase C download.
#[derive(Debug, Clone)]
pub struct DatasetDownload {
    pub announce: ContainerAnnounce,
    pub members: Vec<MemberAnnounce>,
    pub pushes: Vec<PushAnnounce>,
    pub snapshot: Vec<RowSnapshot>,
    pub headers: Vec<HeaderDownload>,
}

/// The full `z` response: one [`DatasetDownload`] per dataset the caller is
/// currently an active member of.
#[derive(Debug, Clone, Default)]
pub struct FullSyncResponse {
    pub downloads: Vec<DatasetDownload>,
}

/// Run one full-sync exchange for an authenticated session (§4.9).
pub async fn run_full_sync(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    hooks: &dyn ScriptHooks,
    session: &AuthenticatedSession,
    request: FullSyncRequest,
) -> Result<FullSyncResponse, SyncError> {
    for bundle in &request.uploads {
        apply_dataset_upload(dao, schema, hooks, session, bundle).await?;
    }

    let dataset_ids = dao.list_datasets_by_user(session.user).await?;
    let mut downloads = Vec::with_capacity(dataset_ids.len());
    for dataset in dataset_ids {
        let _guard = dao.lock(&format!("dataset:{dataset}")).await?;
        downloads.push(build_dataset_download(dao, schema, session, dataset).await?);
    }
    Ok(FullSyncResponse { downloads })
}

/// Phase B for one dataset: create-or-require the dataset, advance the
/// caller's applied-header cursor, apply any direct invites, then apply
/// any uploaded headers in order.
async fn apply_dataset_upload(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    hooks: &dyn ScriptHooks,
    session: &AuthenticatedSession,
    bundle: &DatasetUploadBundle,
) -> Result<(), SyncError> {
    let dataset_id = DatasetId::from_uuid(bundle.upload.dataset);
    let _guard = dao.lock(&format!("dataset:{dataset_id}")).await?;

    match dao.read_dataset(dataset_id).await? {
        Some(_) => {}
        None if bundle.upload.status == 2 => {
            create_dataset(dao, schema, session, dataset_id).await?;
        }
        None => {
            return Err(beehive_auth::AuthError::NotFound { kind: "dataset" }.into());
        }
    }

    let mut cursor = dao.read_downloaded(session.node, dataset_id).await?;
    if bundle.upload.reported_id_header > cursor.last_applied_id_header {
        cursor.last_applied_id_header = bundle.upload.reported_id_header;
    }

    if !bundle.invites.is_empty() {
        beehive_auth::require_capability(dao, schema, dataset_id, session.user, beehive_auth::Capability::ShareDataset)
            .await?;
        let dataset = dao.read_dataset(dataset_id).await?.ok_or(beehive_auth::AuthError::NotFound { kind: "dataset" })?;
        for invite in &bundle.invites {
            apply_invite(dao, schema, dataset.context, dataset_id, invite).await?;
        }
    }

    let member = beehive_auth::require_active_member(dao, dataset_id, session.user).await.ok();
    for upload in &bundle.headers {
        let Some(member) = &member else {
            continue; // no longer an active member: header dropped, not applied
        };
        if upload.id_node <= cursor.last_seen_author_id_node {
            continue; // already applied, or out of order
        }
        let role = beehive_auth::resolve_role(schema, member)?;
        let changes = upload.changes.iter().map(change_frame_to_change).collect::<Result<Vec<_>, _>>()?;
        let input = HeaderInput {
            dataset: dataset_id,
            node: session.node,
            id_node: NodeSeq(upload.id_node),
            transaction_name: upload.transaction_name.clone(),
            version: Version(upload.version),
            changes,
        };
        apply_header(dao, schema, role, hooks, input).await?;
        cursor.last_seen_author_id_node = upload.id_node;
    }

    dao.save_downloaded(session.node, dataset_id, cursor).await?;
    Ok(())
}

async fn create_dataset(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    session: &AuthenticatedSession,
    dataset_id: DatasetId,
) -> Result<(), SyncError> {
    let default_role = schema
        .default_role()
        .ok_or_else(|| SchemaError::UnknownName { kind: "role", name: "default".into() })?;
    let owner = dao
        .read_user(session.context, session.user)
        .await?
        .ok_or(beehive_auth::AuthError::NotFound { kind: "user" })?;
    dao.save_dataset(DatasetRecord {
        id: dataset_id,
        context: session.context,
        owner: session.user,
        id_header: HeaderId(0),
        status: DatasetStatus::Active,
    })
    .await?;
    dao.save_member(MemberRecord {
        dataset: dataset_id,
        user: session.user,
        role: default_role.id,
        name: owner.name,
        status: MemberStatus::Active,
    })
    .await?;
    Ok(())
}

/// Apply one direct invite: resolve (or create a password-less shell for)
/// the invited email, then grant it membership at the named role.
async fn apply_invite(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    context: beehive_core::ContextId,
    dataset_id: DatasetId,
    invite: &InviteUpload,
) -> Result<(), SyncError> {
    let role = schema
        .role_by_name(&invite.role_name)
        .ok_or_else(|| SchemaError::UnknownName { kind: "role", name: invite.role_name.clone() })?;
    let identifier = invite.email.to_lowercase();
    let invited_user = match dao.read_user_by_identifier(context, &identifier).await? {
        Some(existing) => existing,
        None => {
            let user = UserRecord {
                id: beehive_core::UserId::new(),
                context,
                identifier,
                name: invite.name.clone(),
                user_type: UserType::Internal,
                password_hash: None,
                salt: None,
            };
            dao.save_user(user.clone()).await?;
            user
        }
    };
    dao.save_member(MemberRecord {
        dataset: dataset_id,
        user: invited_user.id,
        role: role.id,
        name: invite.name.clone(),
        status: MemberStatus::Active,
    })
    .await?;
    Ok(())
}

fn operation_from_byte(byte: u8) -> Result<Operation, SyncError> {
    Ok(match byte {
        0 => Operation::Insert,
        1 => Operation::Update,
        2 => Operation::Delete,
        other => return Err(beehive_wire::WireError::UnknownTag(other).into()),
    })
}

fn operation_to_byte(operation: Operation) -> u8 {
    match operation {
        Operation::Insert => 0,
        Operation::Update => 1,
        Operation::Delete => 2,
    }
}

/// Decode one uploaded [`ChangeFrame`] into a [`Change`] for the validator.
/// `old_data` is read off the wire by [`ChangeFrame::read`] to keep the
/// frame reader aligned but carries nothing the validator needs (§4.3
/// changes never reference a prior data tuple), so it's discarded here.
fn change_frame_to_change(frame: &ChangeFrame) -> Result<Change, SyncError> {
    Ok(Change {
        entity_name: frame.entity_name.clone(),
        operation: operation_from_byte(frame.operation)?,
        new_pk: codec::decode(&frame.new_pk)?,
        new_data: codec::decode(&frame.new_data)?,
        old_pk: codec::decode(&frame.old_pk)?,
    })
}

/// Reshape a stored (binary-form) `UuidV1`/`UuidV4` key back into the
/// 36-char text form the wire carries (the inverse of the validator's
/// text-to-binary reshape, §4.1).
fn reshape_pk_to_text(entity: &Entity, pk: &[AttributeRecord]) -> Vec<AttributeRecord> {
    pk.iter()
        .map(|(id, value)| match entity.key(AttributeId(*id)) {
            Some(key) if matches!(key.ty, beehive_core::KeyType::UuidV1 | beehive_core::KeyType::UuidV4) => {
                (*id, blob_to_uuid_text(value).unwrap_or_else(|| value.clone()))
            }
            _ => (*id, value.clone()),
        })
        .collect()
}

fn reshape_data_to_text(entity: &Entity, data: &[AttributeRecord]) -> Vec<AttributeRecord> {
    data.iter()
        .map(|(id, value)| match entity.attribute(AttributeId(*id)) {
            Some(attr) if matches!(attr.ty, beehive_core::AttrType::UuidV1 | beehive_core::AttrType::UuidV4) => {
                (*id, blob_to_uuid_text(value).unwrap_or_else(|| value.clone()))
            }
            _ => (*id, value.clone()),
        })
        .collect()
}

fn blob_to_uuid_text(value: &AttributeValue) -> Option<AttributeValue> {
    let AttributeValue::Blob(bytes) = value else {
        return None;
    };
    let uuid = Uuid::from_slice(bytes).ok()?;
    Some(AttributeValue::Text(uuid.hyphenated().to_string()))
}

fn filter_by_mask(data: &[AttributeRecord], mask: &HashSet<AttributeId>) -> Vec<AttributeRecord> {
    data.iter().filter(|(id, _)| mask.contains(&AttributeId(*id))).cloned().collect()
}

/// Reshape and re-encode one stored [`ChangeRecord`] into a wire
/// [`ChangeFrame`], optionally filtering `new_data` to a visible mask
/// (§4.9 Phase C(v): unmasked for the caller's own headers, masked for a
/// peer's).
fn change_record_to_frame(
    schema: &SchemaVersion,
    change: &ChangeRecord,
    mask: Option<&HashSet<AttributeId>>,
) -> Option<Result<ChangeFrame, SyncError>> {
    let entity = schema.entity(change.entity)?;
    Some((|| {
        let new_pk = reshape_pk_to_text(entity, &change.new_pk);
        let old_pk = reshape_pk_to_text(entity, &change.old_pk);
        let mut new_data = reshape_data_to_text(entity, &change.new_data);
        if let Some(mask) = mask {
            new_data = filter_by_mask(&new_data, mask);
        }
        Ok(ChangeFrame {
            id_change: change.id_change.0,
            operation: operation_to_byte(change.operation),
            entity_name: entity.name.clone(),
            new_pk: codec::encode(&new_pk)?,
            old_pk: codec::encode(&old_pk)?,
            new_data: codec::encode(&new_data)?,
            old_data: Vec::new(),
        })
    })())
}

fn changes_to_frames(
    schema: &SchemaVersion,
    changes: &[ChangeRecord],
    mask: Option<&HashSet<AttributeId>>,
) -> Result<Vec<ChangeFrame>, SyncError> {
    let mut out = Vec::with_capacity(changes.len());
    for change in changes {
        match change_record_to_frame(schema, change, mask) {
            Some(frame) => out.push(frame?),
            None => tracing::warn!(entity = %change.entity, "dropping change for entity no longer in schema"),
        }
    }
    Ok(out)
}

/// Build Phase C's download for one dataset the caller is an active
/// member of: container announce, members, pushes, and either a
/// first-sync snapshot or the incremental header stream.
async fn build_dataset_download(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    session: &AuthenticatedSession,
    dataset_id: DatasetId,
) -> Result<DatasetDownload, SyncError> {
    let dataset = dao.read_dataset(dataset_id).await?.ok_or(beehive_auth::AuthError::NotFound { kind: "dataset" })?;
    let announce = ContainerAnnounce { dataset: dataset_id.uuid(), id_header: dataset.id_header.0 };

    let member_records = dao.list_members(dataset_id).await?;
    let mut members = Vec::with_capacity(member_records.len());
    for m in &member_records {
        let role_name = schema.role(m.role).map(|r| r.name.clone()).unwrap_or_else(|| "Unknown".into());
        let email = dao.read_user(dataset.context, m.user).await?.map(|u| u.identifier).unwrap_or_default();
        members.push(MemberAnnounce {
            user: m.user.uuid(),
            role_name,
            email,
            name: m.name.clone(),
            status: m.status as u8,
        });
    }

    let pushes = dao
        .list_pushes(dataset_id)
        .await?
        .into_iter()
        .map(|p| PushAnnounce {
            uuid: p.uuid,
            role_name: schema.role(p.role).map(|r| r.name.clone()).unwrap_or_else(|| "Unknown".into()),
            until: p.until,
            number: p.number,
        })
        .collect();

    let cursor = dao.read_downloaded(session.node, dataset_id).await?;
    let caller_member = member_records.into_iter().find(|m| m.user == session.user);

    let (snapshot, headers) = if cursor.last_applied_id_header == 0 && cursor.last_seen_author_id_node == 0 {
        (build_snapshot(dao, schema, session, &caller_member, dataset_id).await?, vec![])
    } else {
        (vec![], build_incremental_headers(dao, schema, session, &caller_member, dataset_id, cursor).await?)
    };

    let mut final_cursor = cursor;
    final_cursor.last_applied_id_header = dataset.id_header.0;
    dao.save_downloaded(session.node, dataset_id, final_cursor).await?;

    Ok(DatasetDownload { announce, members, pushes, snapshot, headers })
}

/// First-sync full-entity snapshot (§4.9 Phase C(iv)): one [`RowSnapshot`]
/// per row of every entity visible to the caller's role and module,
/// carrying a single running `idChange` counter across all entities — the
/// minimum per-dataset monotonicity the wire format pins down.
async fn build_snapshot(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    session: &AuthenticatedSession,
    caller_member: &Option<MemberRecord>,
    dataset_id: DatasetId,
) -> Result<Vec<RowSnapshot>, SyncError> {
    let Some(member) = caller_member else {
        return Ok(vec![]);
    };
    let role = beehive_auth::resolve_role(schema, member)?;
    let Some(module) = schema.module(session.module) else {
        tracing::warn!(module = %session.module, "session module not found in schema, skipping snapshot");
        return Ok(vec![]);
    };

    let mut snapshot = Vec::new();
    let mut id_change: u16 = 0;
    for entity in schema.entities() {
        let mask = schema.visible_mask(entity.id, role, module);
        if mask.is_empty() {
            continue;
        }
        for (pk_bytes, data_bytes) in dao.list_rows(dataset_id, entity.id).await? {
            let pk = codec::decode(&pk_bytes)?;
            let data = codec::decode(&data_bytes)?;
            let visible_data = filter_by_mask(&data, &mask);
            snapshot.push(RowSnapshot {
                id_change,
                entity_name: entity.name.clone(),
                new_pk: codec::encode(&reshape_pk_to_text(entity, &pk))?,
                new_data: codec::encode(&reshape_data_to_text(entity, &visible_data))?,
            });
            id_change = id_change.wrapping_add(1);
        }
    }
    Ok(snapshot)
}

/// Incremental header stream (§4.9 Phase C(v)): the caller's own headers
/// are echoed as-is; a peer's successful header is re-tagged `approved`
/// with `idNode = 0` and its changes visible-mask filtered; a peer's
/// failed header is dropped.
async fn build_incremental_headers(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    session: &AuthenticatedSession,
    caller_member: &Option<MemberRecord>,
    dataset_id: DatasetId,
    cursor: Downloaded,
) -> Result<Vec<HeaderDownload>, SyncError> {
    let visible_mask_for = |entity: EntityId| -> Option<HashSet<AttributeId>> {
        let member = caller_member.as_ref()?;
        let role = schema.role(member.role)?;
        let module = schema.module(session.module)?;
        Some(schema.visible_mask(entity, role, module))
    };

    let headers = dao.read_headers_after(dataset_id, HeaderId(cursor.last_applied_id_header)).await?;
    let mut out = Vec::with_capacity(headers.len());
    for header in &headers {
        if header.node == session.node {
            let changes = changes_to_frames(schema, &header.changes, None)?;
            out.push(to_header_download(header, header.id_node.0, header.status.code(), changes));
        } else if header.status == beehive_core::ValidationCode::Success {
            let changes = masked_changes_to_frames(schema, &header.changes, &visible_mask_for)?;
            out.push(to_header_download(
                header,
                0,
                beehive_core::ValidationCode::Approved.code(),
                changes,
            ));
        }
        // peer-authored, non-success: dropped entirely
    }
    Ok(out)
}

fn masked_changes_to_frames(
    schema: &SchemaVersion,
    changes: &[ChangeRecord],
    mask_for: &impl Fn(EntityId) -> Option<HashSet<AttributeId>>,
    ) -> Result<Vec<ChangeFrame>, SyncError> {
    let mut out = Vec::with_capacity(changes.len());
    for change in changes {
        let mask = mask_for(change.entity).unwrap_or_default();
        match change_record_to_frame(schema, change, Some(&mask)) {
            Some(frame) => out.push(frame?),
            None => tracing::warn!(entity = %change.entity, "dropping change for entity no longer in schema"),
        }
    }
    Ok(out)
}

fn to_header_download(header: &HeaderRecord, id_node: u32, status: u16, changes: Vec<ChangeFrame>) -> HeaderDownload {
    HeaderDownload {
        id_header: header.id.0,
        id_node,
        status,
        transaction_name: header.transaction_name.clone(),
        version: header.version.0,
        changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beehive_core::{AttrType, Attribute, AttributeCheck, EntityTxView, Key, KeyType, RoleId, SchemaVersion as SV, Transaction, TransactionId, Version as V};
    use beehive_storage::{MemoryDao, NoopHooks};
    use std::collections::HashMap;

    fn item_schema() -> (SV, RoleId, ModuleIdAlias) {
        let entity_id = EntityId::new();
        let entity = Entity {
            id: entity_id,
            name: "Item".into(),
            keys: vec![Key { id: AttributeId(1), name: "id".into(), ty: KeyType::Integer }],
            attributes: vec![Attribute {
                id: AttributeId(2),
                name: "label".into(),
                ty: AttrType::Text,
                notnull: false,
                check: AttributeCheck::Always,
            }],
        };
        let tx_id = TransactionId::new();
        let mut touches = HashMap::new();
        touches.insert(
            entity_id,
            EntityTxView { add: true, remove: false, update_ids: [AttributeId(2)].into_iter().collect() },
        );
        let transaction = Transaction { id: tx_id, name: "Create".into(), touches, pre_script: None, post_script: None };

        let mut entity_masks = HashMap::new();
        entity_masks.insert(entity_id, [AttributeId(1), AttributeId(2)].into_iter().collect());
        let role_id = RoleId::new();
        let role = Role {
            id: role_id,
            name: "Writer".into(),
            default_role: true,
            entity_masks: entity_masks.clone(),
            allowed_transactions: [tx_id].into_iter().collect(),
            ..Default::default()
        };
        let module_id = beehive_core::ModuleId::new();
        let module = Module { id: module_id, name: "default".into(), entity_masks };
        let schema = SV::new(V(1), vec![entity], vec![transaction], vec![role], vec![module]).unwrap();
        (schema, role_id, module_id)
    }

    type ModuleIdAlias = beehive_core::ModuleId;

    async fn seed_session(dao: &MemoryDao, role: RoleId, module: beehive_core::ModuleId) -> (AuthenticatedSession, DatasetId) {
        let context = beehive_core::ContextId::new();
        let user = beehive_core::UserId::new();
        dao.save_user(UserRecord {
            id: user,
            context,
            identifier: "a@example.com".into(),
            name: "A".into(),
            user_type: UserType::Internal,
            password_hash: None,
            salt: None,
        })
        .await
        .unwrap();
        let node = beehive_core::NodeId::new();
        let dataset = DatasetId::new();
        dao.save_dataset(DatasetRecord {
            id: dataset,
            context,
            owner: user,
            id_header: HeaderId(0),
            status: DatasetStatus::Active,
        })
        .await
        .unwrap();
        dao.save_member(MemberRecord { dataset, user, role, name: "A".into(), status: MemberStatus::Active })
            .await
            .unwrap();
        (AuthenticatedSession { user, node, context, module, version: Version(1) }, dataset)
    }

    #[tokio::test]
    async fn upload_then_download_round_trips_a_new_row() {
        let dao = MemoryDao::new();
        let (schema, role, module) = item_schema();
        let (session, dataset) = seed_session(&dao, role, module).await;

        let request = FullSyncRequest {
            declared_datasets: vec![dataset.uuid()],
            uploads: vec![DatasetUploadBundle {
                upload: DatasetUpload { dataset: dataset.uuid(), reported_id_header: 0, status: 0 },
                invites: vec![],
                headers: vec![HeaderUpload {
                    id_node: 1,
                    transaction_name: "Create".into(),
                    version: 1,
                    changes: vec![ChangeFrame {
                        id_change: 0,
                        operation: 0,
                        entity_name: "Item".into(),
                        new_pk: codec::encode(&[(1, AttributeValue::Integer(7))]).unwrap(),
                        old_pk: vec![],
                        new_data: codec::encode(&[(2, AttributeValue::Text("hello".into()))]).unwrap(),
                        old_data: vec![],
                    }],
                }],
            }],
        };

        let response = run_full_sync(&dao, &schema, &NoopHooks, &session, request).await.unwrap();
        assert_eq!(response.downloads.len(), 1);
        let download = &response.downloads[0];
        assert_eq!(download.announce.id_header, 1);
        // First sync for this node: a snapshot, not an incremental stream.
        assert_eq!(download.snapshot.len(), 1);
        assert!(download.headers.is_empty());
        assert_eq!(download.snapshot[0].entity_name, "Item");
    }

    #[tokio::test]
    async fn second_sync_streams_own_header_instead_of_snapshot() {
        let dao = MemoryDao::new();
        let (schema, role, module) = item_schema();
        let (session, dataset) = seed_session(&dao, role, module).await;

        let first = FullSyncRequest {
            declared_datasets: vec![],
            uploads: vec![DatasetUploadBundle {
                upload: DatasetUpload { dataset: dataset.uuid(), reported_id_header: 0, status: 0 },
                invites: vec![],
                headers: vec![HeaderUpload {
                    id_node: 1,
                    transaction_name: "Create".into(),
                    version: 1,
                    changes: vec![ChangeFrame {
                        id_change: 0,
                        operation: 0,
                        entity_name: "Item".into(),
                        new_pk: codec::encode(&[(1, AttributeValue::Integer(1))]).unwrap(),
                        old_pk: vec![],
                        new_data: codec::encode(&[(2, AttributeValue::Text("x".into()))]).unwrap(),
                        old_data: vec![],
                    }],
                }],
            }],
        };
        run_full_sync(&dao, &schema, &NoopHooks, &session, first).await.unwrap();

        let second = FullSyncRequest { declared_datasets: vec![], uploads: vec![] };
        let response = run_full_sync(&dao, &schema, &NoopHooks, &session, second).await.unwrap();
        let download = &response.downloads[0];
        assert!(download.snapshot.is_empty());
        assert_eq!(download.headers.len(), 1);
        assert_eq!(download.headers[0].id_node, 1);
    }

    #[test]
    fn uuid_pk_reshapes_back_to_text_form() {
        let entity = Entity {
            id: EntityId::new(),
            name: "Device".into(),
            keys: vec![Key { id: AttributeId(1), name: "id".into(), ty: KeyType::UuidV4 }],
            attributes: vec![],
        };
        let uuid = Uuid::new_v4();
        let stored = vec![(1u16, AttributeValue::Blob(uuid.as_bytes().to_vec()))];
        let text = reshape_pk_to_text(&entity, &stored);
        assert_eq!(text[0].1, AttributeValue::Text(uuid.hyphenated().to_string()));
    }
}
