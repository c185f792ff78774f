//! End-to-end full-sync scenarios (§8 S1–S3), exercised against the whole
//! `beehive-sync` stack rather than any one crate's internals. S4–S6 are
//! covered at the layer that owns them: push expiry in
//! `beehive_auth::share`, dataset ownership in `beehive_auth::dataset`,
//! and CRC tamper detection in `beehive_wire::framer`.

use beehive_core::{
    codec, AttrType, Attribute, AttributeCheck, AttributeValue, Entity, EntityId, EntityTxView, HeaderId, Key,
    KeyType, Module, ModuleId, Role, RoleId, SchemaVersion, Transaction, TransactionId, Version,
};
use beehive_storage::{
    DatasetRecord, DatasetStatus, MemberRecord, MemberStatus, MemoryDao, NoopHooks, UserRecord, UserType,
};
use beehive_sync::fsm::{run_full_sync, DatasetUploadBundle, FullSyncRequest};
use beehive_sync::session::AuthenticatedSession;
use beehive_wire::fullsync::{ChangeFrame, DatasetUpload, HeaderUpload};
use beehive_wire::{FrameReader, FrameWriter, Reconnect, ResponseCode};
use base64::Engine;
use std::collections::HashMap;

/// One `Item(k1: Integer notnull, a1: Text notnull)` entity, an `AddItem`
/// transaction that may insert it, an `EditItem` transaction that may
/// update attribute `a1`, and a `NoEdit` transaction that touches the
/// entity without granting any update bits (S3's forbidden-update schema).
struct Fixture {
    schema: SchemaVersion,
    role: RoleId,
    module: ModuleId,
}

fn build_fixture() -> Fixture {
    let entity_id = EntityId::new();
    let entity = Entity {
        id: entity_id,
        name: "Item".into(),
        keys: vec![Key { id: beehive_core::AttributeId(1), name: "k1".into(), ty: KeyType::Integer }],
        attributes: vec![Attribute {
            id: beehive_core::AttributeId(2),
            name: "a1".into(),
            ty: AttrType::Text,
            notnull: true,
            check: AttributeCheck::Always,
        }],
    };

    let add_tx = TransactionId::new();
    let mut add_touches = HashMap::new();
    add_touches.insert(entity_id, EntityTxView { add: true, remove: false, update_ids: Default::default() });
    let add_item = Transaction { id: add_tx, name: "AddItem".into(), touches: add_touches, pre_script: None, post_script: None };

    let edit_tx = TransactionId::new();
    let mut edit_touches = HashMap::new();
    edit_touches.insert(
        entity_id,
        EntityTxView { add: false, remove: false, update_ids: [beehive_core::AttributeId(2)].into_iter().collect() },
    );
    let edit_item = Transaction { id: edit_tx, name: "EditItem".into(), touches: edit_touches, pre_script: None, post_script: None };

    let no_edit_tx = TransactionId::new();
    let mut no_edit_touches = HashMap::new();
    no_edit_touches.insert(entity_id, EntityTxView { add: false, remove: false, update_ids: Default::default() });
    let no_edit = Transaction { id: no_edit_tx, name: "NoEdit".into(), touches: no_edit_touches, pre_script: None, post_script: None };

    let mut entity_masks = HashMap::new();
    entity_masks.insert(entity_id, [beehive_core::AttributeId(1), beehive_core::AttributeId(2)].into_iter().collect());
    let role_id = RoleId::new();
    let role = Role {
        id: role_id,
        name: "Writer".into(),
        default_role: true,
        entity_masks: entity_masks.clone(),
        allowed_transactions: [add_tx, edit_tx, no_edit_tx].into_iter().collect(),
        ..Default::default()
    };

    let module_id = ModuleId::new();
    let module = Module { id: module_id, name: "default".into(), entity_masks };

    let schema = SchemaVersion::new(Version(1), vec![entity], vec![add_item, edit_item, no_edit], vec![role], vec![module]).unwrap();
    Fixture { schema, role: role_id, module: module_id }
}

async fn seed_member(dao: &MemoryDao, role: RoleId) -> (AuthenticatedSession, beehive_core::DatasetId) {
    let context = beehive_core::ContextId::new();
    let user = beehive_core::UserId::new();
    dao.save_user(UserRecord {
        id: user,
        context,
        identifier: "writer@example.com".into(),
        name: "Writer".into(),
        user_type: UserType::Internal,
        password_hash: None,
        salt: None,
    })
    .await
    .unwrap();
    let node = beehive_core::NodeId::new();
    let dataset = beehive_core::DatasetId::new();
    dao.save_dataset(DatasetRecord {
        id: dataset,
        context,
        owner: user,
        id_header: HeaderId(0),
        status: DatasetStatus::Active,
    })
    .await
    .unwrap();
    dao.save_member(MemberRecord { dataset, user, role, name: "Writer".into(), status: MemberStatus::Active })
        .await
        .unwrap();
    (AuthenticatedSession { user, node, context, module: ModuleId::new(), version: Version(1) }, dataset)
}

fn insert_header(dataset: beehive_core::DatasetId) -> DatasetUploadBundle {
    DatasetUploadBundle {
        upload: DatasetUpload { dataset: dataset.uuid(), reported_id_header: 0, status: 0 },
        invites: vec![],
        headers: vec![HeaderUpload {
            id_node: 1,
            transaction_name: "AddItem".into(),
            version: 1,
            changes: vec![ChangeFrame {
                id_change: 0,
                operation: 0,
                entity_name: "Item".into(),
                new_pk: codec::encode(&[(1, AttributeValue::Integer(42))]).unwrap(),
                old_pk: vec![],
                new_data: codec::encode(&[(2, AttributeValue::Text("hello".into()))]).unwrap(),
                old_data: vec![],
            }],
        }],
    }
}

#[tokio::test]
async fn s1_insert_round_trips_to_a_fresh_peer() {
    let fixture = build_fixture();
    let dao = MemoryDao::new();
    let (mut session, dataset) = seed_member(&dao, fixture.role).await;
    session.module = fixture.module;

    let request = FullSyncRequest { declared_datasets: vec![dataset.uuid()], uploads: vec![insert_header(dataset)] };
    let response = run_full_sync(&dao, &fixture.schema, &NoopHooks, &session, request).await.unwrap();
    let download = &response.downloads[0];
    assert_eq!(download.announce.id_header, 1);

    // A fresh peer member (never synced this dataset) gets the first-sync
    // snapshot, not the incremental header it would get on a later sync.
    assert_eq!(download.snapshot.len(), 1);
    let row = &download.snapshot[0];
    assert_eq!(row.entity_name, "Item");
    let data = codec::decode(&row.new_data).unwrap();
    assert_eq!(data, vec![(2u16, AttributeValue::Text("hello".into()))]);
}

#[tokio::test]
async fn s2_sparse_update_only_touches_the_edited_attribute() {
    let fixture = build_fixture();
    let dao = MemoryDao::new();
    let (mut session, dataset) = seed_member(&dao, fixture.role).await;
    session.module = fixture.module;

    run_full_sync(
        &dao,
        &fixture.schema,
        &NoopHooks,
        &session,
        FullSyncRequest { declared_datasets: vec![], uploads: vec![insert_header(dataset)] },
    )
    .await
    .unwrap();

    let update_bundle = DatasetUploadBundle {
        upload: DatasetUpload { dataset: dataset.uuid(), reported_id_header: 1, status: 0 },
        invites: vec![],
        headers: vec![HeaderUpload {
            id_node: 2,
            transaction_name: "EditItem".into(),
            version: 1,
            changes: vec![ChangeFrame {
                id_change: 0,
                operation: 1,
                entity_name: "Item".into(),
                new_pk: codec::encode(&[(1, AttributeValue::Integer(42))]).unwrap(),
                old_pk: codec::encode(&[(1, AttributeValue::Integer(42))]).unwrap(),
                new_data: codec::encode(&[(2, AttributeValue::Text("world".into()))]).unwrap(),
                old_data: codec::encode(&[(2, AttributeValue::Text("hello".into()))]).unwrap(),
            }],
        }],
    };
    let response = run_full_sync(
        &dao,
        &fixture.schema,
        &NoopHooks,
        &session,
        FullSyncRequest { declared_datasets: vec![], uploads: vec![update_bundle] },
    )
    .await
    .unwrap();
    assert_eq!(response.downloads[0].announce.id_header, 2);

    let entity_id = fixture.schema.entity_by_name("Item").unwrap().id;
    let rows = dao.list_rows(dataset, entity_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    let stored = codec::decode(&rows[0].1).unwrap();
    assert_eq!(stored, vec![(2u16, AttributeValue::Text("world".into()))]);
}

#[tokio::test]
async fn s3_forbidden_update_is_rejected_and_row_unchanged() {
    let fixture = build_fixture();
    let dao = MemoryDao::new();
    let (mut session, dataset) = seed_member(&dao, fixture.role).await;
    session.module = fixture.module;

    run_full_sync(
        &dao,
        &fixture.schema,
        &NoopHooks,
        &session,
        FullSyncRequest { declared_datasets: vec![], uploads: vec![insert_header(dataset)] },
    )
    .await
    .unwrap();

    let forbidden_bundle = DatasetUploadBundle {
        upload: DatasetUpload { dataset: dataset.uuid(), reported_id_header: 1, status: 0 },
        invites: vec![],
        headers: vec![HeaderUpload {
            id_node: 2,
            transaction_name: "NoEdit".into(),
            version: 1,
            changes: vec![ChangeFrame {
                id_change: 0,
                operation: 1,
                entity_name: "Item".into(),
                new_pk: codec::encode(&[(1, AttributeValue::Integer(42))]).unwrap(),
                old_pk: codec::encode(&[(1, AttributeValue::Integer(42))]).unwrap(),
                new_data: codec::encode(&[(2, AttributeValue::Text("world".into()))]).unwrap(),
                old_data: codec::encode(&[(2, AttributeValue::Text("hello".into()))]).unwrap(),
            }],
        }],
    };
    run_full_sync(
        &dao,
        &fixture.schema,
        &NoopHooks,
        &session,
        FullSyncRequest { declared_datasets: vec![], uploads: vec![forbidden_bundle] },
    )
    .await
    .unwrap();

    // Row is unchanged: still "hello". The rejected header still advanced
    // idHeader (invariant I3: every submitted header is persisted).
    let entity_id = fixture.schema.entity_by_name("Item").unwrap().id;
    let rows = dao.list_rows(dataset, entity_id).await.unwrap();
    let stored = codec::decode(&rows[0].1).unwrap();
    assert_eq!(stored, vec![(2u16, AttributeValue::Text("hello".into()))]);

    let headers = dao.read_headers_after(dataset, HeaderId(1)).await.unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].status.code(), 130); // notValidOperation
}

/// P1: header ids are dense, 1-based, and bounded by the dataset's head.
#[tokio::test]
async fn p1_header_ids_are_dense_and_bounded() {
    let fixture = build_fixture();
    let dao = MemoryDao::new();
    let (mut session, dataset) = seed_member(&dao, fixture.role).await;
    session.module = fixture.module;

    for seq in 1..=3u32 {
        let mut bundle = insert_header(dataset);
        bundle.upload.reported_id_header = seq - 1;
        bundle.headers[0].id_node = seq;
        bundle.headers[0].changes[0].new_pk = codec::encode(&[(1, AttributeValue::Integer(seq as i64))]).unwrap();
        run_full_sync(
            &dao,
            &fixture.schema,
            &NoopHooks,
            &session,
            FullSyncRequest { declared_datasets: vec![], uploads: vec![bundle] },
        )
        .await
        .unwrap();
    }

    let dataset_record = dao.read_dataset(dataset).await.unwrap().unwrap();
    assert_eq!(dataset_record.id_header, HeaderId(3));
    let headers = dao.read_headers_after(dataset, HeaderId(0)).await.unwrap();
    let mut ids: Vec<u32> = headers.iter().map(|h| h.id.0).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
}

/// A conformant client only ever sees the `C` opener's token field the way
/// it came off the wire in the sign-in reply: the literal bytes a
/// `Success` reply carries after the user's binary-form uuid, with no
/// separate decode step. This builds that reply frame exactly as
/// `beehive-server::connection::success_reply` does, then carries its
/// token bytes straight into a `Reconnect` frame — the round trip that
/// must hold for reconnect to be usable at all.
#[tokio::test]
async fn reconnect_token_round_trips_through_the_literal_sign_in_reply_bytes() {
    let module_id = ModuleId::new();
    let module = Module { id: module_id, name: "default".into(), entity_masks: Default::default() };
    let schema = SchemaVersion::new(Version(1), vec![], vec![], vec![Role::default()], vec![module]).unwrap();
    let dao = MemoryDao::new();

    let sign_in = beehive_wire::PasswordSignIn {
        email: "a@example.com".into(),
        password: "hunter2".into(),
        context: beehive_core::ContextId::new().uuid().to_string(),
        module: "default".into(),
        node_uuid: uuid::Uuid::new_v4(),
        version: 1,
    };
    let up = beehive_wire::SignUp { name: "Alice".into(), sign_in: sign_in.clone() };
    let (session, token) = beehive_sync::sign_up(&dao, &beehive_auth::Sha256Hasher, &schema, &up).await.unwrap();

    // Build the reply frame the way `success_reply` does: the user's
    // binary-form uuid, then the raw token bytes (not base64 text).
    let raw_token = base64::engine::general_purpose::STANDARD.decode(&token).unwrap();
    let mut reply = FrameWriter::new();
    reply.write_u8(ResponseCode::Success.code());
    reply.write_uuid_binary(session.user.uuid());
    reply.write_blob_exact(&raw_token);
    let reply_bytes = reply.finish();

    // A client parses the reply the same way: response code, then uuid,
    // then the token's fixed-length blob.
    let mut r = FrameReader::new(&reply_bytes[1..]);
    let replied_user = r.read_uuid_binary("user").unwrap();
    let replied_token = r.read_blob_exact(beehive_auth::RECONNECT_TOKEN_RAW_LEN, "token").unwrap();
    assert_eq!(replied_user, session.user.uuid());

    // That token, echoed back verbatim inside a fresh `Reconnect` opener,
    // must complete a reconnect exactly like the one issued at sign-up.
    let reconnect_frame = Reconnect { token: replied_token, version: 2 };
    let encoded = reconnect_frame.encode().unwrap();
    let decoded = Reconnect::decode(&encoded).unwrap();
    let reconnected = beehive_sync::reconnect(&dao, &decoded).await.unwrap();
    assert_eq!(reconnected.user, session.user);
    assert_eq!(reconnected.node, session.node);
}
