//! One TCP connection's lifecycle (§6.1, §4.7, §4.9).
//!
//! The wire crate frames individual messages byte-for-byte but never says
//! how a stream demarcates one message from the next. This module adds a
//! minimal u32 length-prefixed envelope around every CRC-framed message —
//! purely a transport concern, outside the CRC the wire crate computes —
//! so a `read_exact` can pull exactly one frame's bytes off the socket
//! before handing them to `beehive_wire`. See `DESIGN.md`.
//!
//! It also composes `beehive_wire::fullsync`'s leaf frames into the `z`
//! exchange's request/response envelope, and invents minimal wire layouts
//! for the eight other post-auth operation tags, none of which spec.md
//! gives a literal byte table for beyond their single-letter tag.

use crate::errors::response_code_for;
use crate::state::AppState;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use beehive_core::{ContextId, DatasetId, RoleId, SchemaVersion, UserId};
use beehive_storage::NoopHooks;
use beehive_sync::fsm::{run_full_sync, DatasetDownload, DatasetUploadBundle, FullSyncRequest, FullSyncResponse};
use beehive_sync::{AuthenticatedSession, SyncError};
use beehive_wire::fullsync::{ContainerAnnounce, DatasetUpload, HeaderUpload, InviteUpload, MemberAnnounce, PushAnnounce, RowSnapshot};
use beehive_wire::{AuthOpener, FrameReader, FrameWriter, OperationTag, ResponseCode, WireError};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::Instrument;
use uuid::Uuid;

async fn read_envelope(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(Some(body))
}

async fn write_envelope(stream: &mut TcpStream, body: &[u8]) -> std::io::Result<()> {
    stream.write_u32(body.len() as u32).await?;
    stream.write_all(body).await?;
    stream.flush().await
}

fn error_reply(code: ResponseCode) -> Vec<u8> {
    let mut w = FrameWriter::new();
    w.write_u8(code.code());
    w.finish()
}

fn parse_context_str(raw: &str) -> Result<ContextId, SyncError> {
    Uuid::parse_str(raw).map(ContextId::from_uuid).map_err(|_| SyncError::MalformedContext(raw.to_string()))
}

/// Accept one connection and run its protocol loop to completion, logging
/// (rather than propagating) any I/O failure — a dropped peer is routine,
/// not an error worth surfacing past this task.
pub async fn handle_connection(stream: TcpStream, state: Arc<AppState>) {
    let conn_id = Uuid::new_v4();
    let peer = stream.peer_addr().ok();
    let span = tracing::info_span!("sync_connection", %conn_id, ?peer, user = tracing::field::Empty);
    async move {
        if let Err(err) = run_connection(stream, state).await {
            tracing::warn!(%err, "connection ended");
        }
    }
    .instrument(span)
    .await;
}

async fn run_connection(mut stream: TcpStream, state: Arc<AppState>) -> anyhow::Result<()> {
    let Some(body) = read_envelope(&mut stream).await? else {
        return Ok(());
    };
    if body.is_empty() {
        write_envelope(&mut stream, &error_reply(ResponseCode::TransmissionError)).await?;
        return Ok(());
    }
    let tag = body[0];
    let rest = &body[1..];

    let opener = match AuthOpener::decode(tag, rest) {
        Ok(opener) => opener,
        Err(err) => {
            tracing::info!(%err, "rejecting malformed auth opener");
            write_envelope(&mut stream, &error_reply(response_code_for_wire(&err))).await?;
            return Ok(());
        }
    };

    let outcome = match authenticate(&state, opener).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::info!(%err, "authentication failed");
            write_envelope(&mut stream, &error_reply(response_code_for(&err))).await?;
            return Ok(());
        }
    };

    let session = match outcome {
        AuthOutcome::SignedOff => {
            write_envelope(&mut stream, &success_reply(None)).await?;
            return Ok(());
        }
        AuthOutcome::Established { session, token } => {
            write_envelope(&mut stream, &success_reply(Some((session.user.uuid(), &token)))).await?;
            session
        }
    };

    tracing::Span::current().record("user", tracing::field::display(session.user));
    operation_loop(&mut stream, &state, session).await
}

fn response_code_for_wire(err: &WireError) -> ResponseCode {
    match err {
        WireError::TransmissionError { .. } => ResponseCode::TransmissionError,
        _ => ResponseCode::InternalError,
    }
}

fn success_reply(established: Option<(Uuid, &str)>) -> Vec<u8> {
    let mut w = FrameWriter::new();
    w.write_u8(ResponseCode::Success.code());
    if let Some((user, token)) = established {
        w.write_uuid_binary(user);
        // `token` is base64 of the raw reconnection token; the `C` opener's
        // `Reconnect::decode` reads it back as a fixed-length raw blob
        // (`RECONNECT_TOKEN_LEN`), so decode before writing.
        let raw = BASE64.decode(token).expect("internally issued reconnection token is valid base64");
        w.write_blob_exact(&raw);
    }
    w.finish()
}

enum AuthOutcome {
    Established { session: AuthenticatedSession, token: String },
    SignedOff,
}

async fn authenticate(state: &AppState, opener: AuthOpener) -> Result<AuthOutcome, SyncError> {
    let dao = state.dao.as_ref();
    match opener {
        AuthOpener::JwtSignIn(frame) => {
            let context = parse_context_str(&frame.context)?;
            let schema = current_schema(state, context)?;
            let verifier = state.jwt_verifier(context).map_err(|e| SyncError::MalformedContext(e.to_string()))?;
            let (session, token) = beehive_sync::sign_in_jwt(dao, verifier.as_ref(), &schema, &frame).await?;
            Ok(AuthOutcome::Established { session, token })
        }
        AuthOpener::PasswordSignIn(frame) => {
            let context = parse_context_str(&frame.context)?;
            let schema = current_schema(state, context)?;
            let (session, token) = beehive_sync::sign_in_password(dao, state.hasher.as_ref(), &schema, &frame).await?;
            Ok(AuthOutcome::Established { session, token })
        }
        AuthOpener::SignUp(frame) => {
            let context = parse_context_str(&frame.sign_in.context)?;
            let schema = current_schema(state, context)?;
            let (session, token) = beehive_sync::sign_up(dao, state.hasher.as_ref(), &schema, &frame).await?;
            Ok(AuthOutcome::Established { session, token })
        }
        AuthOpener::Reconnect(frame) => {
            let session = beehive_sync::reconnect(dao, &frame).await?;
            let node = dao
                .read_node(session.user, session.node)
                .await
                .map_err(SyncError::Storage)?
                .ok_or(beehive_auth::AuthError::NotFound { kind: "node" })?;
            let token = beehive_auth::issue_reconnect_token(&node, session.user);
            Ok(AuthOutcome::Established { session, token })
        }
        AuthOpener::SignOffJwt(frame) => {
            let context = parse_context_str(&frame.context)?;
            let verifier = state.jwt_verifier(context).map_err(|e| SyncError::MalformedContext(e.to_string()))?;
            beehive_sync::sign_off_jwt(dao, verifier.as_ref(), &frame).await?;
            Ok(AuthOutcome::SignedOff)
        }
        AuthOpener::SignOffLocal(frame) => {
            beehive_sync::sign_off_local(dao, state.hasher.as_ref(), &frame).await?;
            Ok(AuthOutcome::SignedOff)
        }
    }
}

fn current_schema(state: &AppState, context: ContextId) -> Result<Arc<SchemaVersion>, SyncError> {
    state
        .registry(context)
        .current()
        .ok_or_else(|| SyncError::MalformedContext(format!("context {context} has no published schema")))
}

/// Read and dispatch operation frames until the peer signs out, closes the
/// socket, or sends something the session can't recover from.
async fn operation_loop(stream: &mut TcpStream, state: &AppState, session: AuthenticatedSession) -> anyhow::Result<()> {
    let dao = state.dao.as_ref();
    let schema = current_schema(state, session.context)?;
    loop {
        let Some(body) = read_envelope(stream).await? else {
            return Ok(());
        };
        if body.is_empty() {
            write_envelope(stream, &error_reply(ResponseCode::TransmissionError)).await?;
            return Ok(());
        }
        let tag = body[0];
        let op = match OperationTag::from_tag(tag) {
            Ok(op) => op,
            Err(err) => {
                write_envelope(stream, &error_reply(response_code_for_wire(&err))).await?;
                continue;
            }
        };

        let result = run_operation(dao, &schema, &session, op, &body[1..]).await;
        match result {
            Ok(OperationReply::Plain) => {
                write_envelope(stream, &error_reply(ResponseCode::Success)).await?;
            }
            Ok(OperationReply::Bytes(reply)) => {
                write_envelope(stream, &reply).await?;
            }
            Ok(OperationReply::SignedOut) => {
                write_envelope(stream, &error_reply(ResponseCode::Success)).await?;
                return Ok(());
            }
            Err(err) => {
                tracing::info!(%err, op = ?op, "operation failed");
                write_envelope(stream, &error_reply(response_code_for(&err))).await?;
            }
        }
    }
}

enum OperationReply {
    Plain,
    Bytes(Vec<u8>),
    SignedOut,
}

async fn run_operation(
    dao: &dyn beehive_storage::Dao,
    schema: &SchemaVersion,
    session: &AuthenticatedSession,
    op: OperationTag,
    body: &[u8],
) -> Result<OperationReply, SyncError> {
    match op {
        OperationTag::SignOut => {
            beehive_auth::sign_out_node(dao, session.user, session.node).await?;
            Ok(OperationReply::SignedOut)
        }
        OperationTag::DeleteDataset => {
            let mut r = FrameReader::new(body);
            let dataset = DatasetId::from_uuid(r.read_uuid_text("dataset")?);
            r.read_final_crc()?;
            beehive_auth::dataset::delete_dataset(dao, dataset, session.user).await?;
            Ok(OperationReply::Plain)
        }
        OperationTag::PushDataset => {
            let mut r = FrameReader::new(body);
            let dataset = DatasetId::from_uuid(r.read_uuid_text("dataset")?);
            let role_name = r.read_string_u8("role")?;
            let until = r.read_u64("until")? as i64;
            let number = r.read_u32("number")?;
            r.read_final_crc()?;
            let role = resolve_role_by_name(schema, &role_name)?;
            let record = beehive_auth::share::push(dao, schema, dataset, session.user, role, until, number).await?;
            let mut w = FrameWriter::new();
            w.write_u8(ResponseCode::Success.code());
            w.write_string_u8(&record.uuid)?;
            Ok(OperationReply::Bytes(w.finish()))
        }
        OperationTag::PopDataset => {
            let mut r = FrameReader::new(body);
            let dataset = DatasetId::from_uuid(r.read_uuid_text("dataset")?);
            let push_uuid = r.read_string_u8("pushUuid")?;
            r.read_final_crc()?;
            let member = dao.read_member(dataset, session.user).await?;
            let caller_name = member.map(|m| m.name).unwrap_or_default();
            let now = chrono::Utc::now().timestamp();
            beehive_auth::share::pop(dao, dataset, &push_uuid, session.user, &caller_name, now).await?;
            Ok(OperationReply::Plain)
        }
        OperationTag::PutDataset => {
            let mut r = FrameReader::new(body);
            let dataset = DatasetId::from_uuid(r.read_uuid_text("dataset")?);
            r.read_final_crc()?;
            create_dataset(dao, schema, session, dataset).await?;
            Ok(OperationReply::Plain)
        }
        OperationTag::PullDataset => {
            let mut r = FrameReader::new(body);
            let dataset = DatasetId::from_uuid(r.read_uuid_text("dataset")?);
            let push_uuid = r.read_string_u8("pushUuid")?;
            r.read_final_crc()?;
            beehive_auth::share::pull(dao, schema, dataset, session.user, &push_uuid).await?;
            Ok(OperationReply::Plain)
        }
        OperationTag::LeaveDataset => {
            let mut r = FrameReader::new(body);
            let dataset = DatasetId::from_uuid(r.read_uuid_text("dataset")?);
            r.read_final_crc()?;
            // Self-leave bypasses `ManageMembers`: a member always may drop
            // their own membership without needing the capability that
            // gates removing someone *else*.
            dao.remove_member(dataset, session.user).await?;
            Ok(OperationReply::Plain)
        }
        OperationTag::UpdateMember => {
            let mut r = FrameReader::new(body);
            let dataset = DatasetId::from_uuid(r.read_uuid_text("dataset")?);
            let target = UserId::from_uuid(r.read_uuid_text("target")?);
            let role_name = r.read_string_u8("role")?;
            r.read_final_crc()?;
            let role = resolve_role_by_name(schema, &role_name)?;
            beehive_auth::dataset::update_member_role(dao, schema, dataset, session.user, target, role).await?;
            Ok(OperationReply::Plain)
        }
        OperationTag::DeleteMember => {
            let mut r = FrameReader::new(body);
            let dataset = DatasetId::from_uuid(r.read_uuid_text("dataset")?);
            let target = UserId::from_uuid(r.read_uuid_text("target")?);
            r.read_final_crc()?;
            beehive_auth::dataset::remove_member(dao, schema, dataset, session.user, target).await?;
            Ok(OperationReply::Plain)
        }
        OperationTag::FullSync => {
            let request = decode_full_sync_request(body)?;
            let response = run_full_sync(dao, schema, &NoopHooks, session, request).await?;
            Ok(OperationReply::Bytes(encode_full_sync_response(&response)?))
        }
    }
}

fn resolve_role_by_name(schema: &SchemaVersion, name: &str) -> Result<RoleId, SyncError> {
    schema
        .role_by_name(name)
        .map(|r| r.id)
        .ok_or_else(|| beehive_core::SchemaError::UnknownName { kind: "role", name: name.to_string() }.into())
}

async fn create_dataset(
    dao: &dyn beehive_storage::Dao,
    schema: &SchemaVersion,
    session: &AuthenticatedSession,
    dataset: DatasetId,
) -> Result<(), SyncError> {
    if dao.read_dataset(dataset).await?.is_some() {
        return Err(beehive_auth::AuthError::AlreadyExists { kind: "dataset" }.into());
    }
    let default_role = schema
        .default_role()
        .ok_or_else(|| beehive_core::SchemaError::UnknownName { kind: "role", name: "default".into() })?;
    let owner = dao
        .read_user(session.context, session.user)
        .await?
        .ok_or(beehive_auth::AuthError::NotFound { kind: "user" })?;
    dao.save_dataset(beehive_storage::DatasetRecord {
        id: dataset,
        context: session.context,
        owner: session.user,
        id_header: beehive_core::HeaderId(0),
        status: beehive_storage::DatasetStatus::Active,
    })
    .await?;
    dao.save_member(beehive_storage::MemberRecord {
        dataset,
        user: session.user,
        role: default_role.id,
        name: owner.name,
        status: beehive_storage::MemberStatus::Active,
    })
    .await?;
    Ok(())
}

/// Decode the `z` request envelope: Phase A's declared-dataset list, then
/// every Phase B upload bundle (cursor announcement plus optional invite
/// and header sub-streams), each repetition level u16-count-prefixed to
/// match `fullsync::read_changes`'s own convention.
fn decode_full_sync_request(body: &[u8]) -> Result<FullSyncRequest, SyncError> {
    let mut r = FrameReader::new(body);
    let declared_count = r.read_u16("declaredDatasetCount")?;
    let mut declared_datasets = Vec::with_capacity(declared_count as usize);
    for _ in 0..declared_count {
        declared_datasets.push(beehive_wire::fullsync::read_dataset_uuid(&mut r)?);
    }

    let upload_count = r.read_u16("datasetUploadCount")?;
    let mut uploads = Vec::with_capacity(upload_count as usize);
    for _ in 0..upload_count {
        let upload = DatasetUpload::read(&mut r)?;
        let invite_count = r.read_u16("inviteCount")?;
        let mut invites = Vec::with_capacity(invite_count as usize);
        for _ in 0..invite_count {
            invites.push(InviteUpload::read(&mut r)?);
        }
        let header_count = r.read_u16("headerUploadCount")?;
        let mut headers = Vec::with_capacity(header_count as usize);
        for _ in 0..header_count {
            headers.push(HeaderUpload::read(&mut r)?);
        }
        uploads.push(DatasetUploadBundle { upload, invites, headers });
    }
    r.read_final_crc()?;
    Ok(FullSyncRequest { declared_datasets, uploads })
}

/// Encode the `z` response envelope: one [`DatasetDownload`] per dataset,
/// each of its four sub-streams u16-count-prefixed, mirroring
/// [`decode_full_sync_request`].
fn encode_full_sync_response(response: &FullSyncResponse) -> Result<Vec<u8>, SyncError> {
    let mut w = FrameWriter::new();
    w.write_u8(ResponseCode::Success.code());
    w.write_u16(response.downloads.len() as u16);
    for download in &response.downloads {
        write_dataset_download(&mut w, download)?;
    }
    Ok(w.finish())
}

fn write_dataset_download(w: &mut FrameWriter, download: &DatasetDownload) -> Result<(), SyncError> {
    write_announce(w, &download.announce);
    w.write_u16(download.members.len() as u16);
    for member in &download.members {
        write_member(w, member)?;
    }
    w.write_u16(download.pushes.len() as u16);
    for push in &download.pushes {
        write_push(w, push)?;
    }
    w.write_u16(download.snapshot.len() as u16);
    for row in &download.snapshot {
        write_row(w, row)?;
    }
    w.write_u16(download.headers.len() as u16);
    for header in &download.headers {
        header.write(w)?;
    }
    Ok(())
}

fn write_announce(w: &mut FrameWriter, announce: &ContainerAnnounce) {
    announce.write(w);
}

fn write_member(w: &mut FrameWriter, member: &MemberAnnounce) -> Result<(), SyncError> {
    Ok(member.write(w)?)
}

fn write_push(w: &mut FrameWriter, push: &PushAnnounce) -> Result<(), SyncError> {
    Ok(push.write(w)?)
}

fn write_row(w: &mut FrameWriter, row: &RowSnapshot) -> Result<(), SyncError> {
    Ok(row.write(w)?)
}
