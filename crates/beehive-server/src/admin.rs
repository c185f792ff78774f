//! Thin admin HTTP surface (§6.2): schema version lifecycle, user admin,
//! and the `synch/*` session endpoints, all under `/context/{context}`.
//!
//! Bit-exactness only matters where a sync client observes the wire (the
//! TCP listener in [`crate::connection`]); this surface exists to exercise
//! the DAO/auth contracts behind it, not to reproduce a particular HTTP
//! API byte-for-byte.

use crate::errors::AdminError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, on, post, MethodFilter};
use axum::{Json, Router};
use beehive_auth::{sign_in_local, sign_off, sign_up_local, Sha256Hasher};
use beehive_core::{ContextId, ModuleId, UserId, Version};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Build the admin router, scoped under `/context`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/context/:context/versions", get(list_versions))
        .route("/context/:context/versions/:n", get(get_version))
        .route(
            "/context/:context",
            on(MethodFilter::from_bytes(b"LINK").unwrap(), publish_version),
        )
        .route(
            "/context/:context",
            on(MethodFilter::from_bytes(b"UNLINK").unwrap(), revert_version),
        )
        .route("/context/:context/users", get(list_placeholder))
        .route("/context/:context/synch/signup", post(synch_signup))
        .route("/context/:context/synch/signin", post(synch_signin))
        .route("/context/:context/synch/signout", post(synch_signout))
        .route("/context/:context/synch/signoff", post(synch_signoff))
        .with_state(state)
}

fn parse_context(raw: &str) -> Result<ContextId, AdminError> {
    Uuid::parse_str(raw)
        .map(ContextId::from_uuid)
        .map_err(|_| AdminError::Config(anyhow::anyhow!("malformed context uuid: {raw}")))
}

async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
) -> Result<Json<Value>, AdminError> {
    let context = parse_context(&context)?;
    let registry = state.registry(context);
    Ok(Json(json!({
        "current": registry.current_version(),
        "edited": registry.edited_version(),
    })))
}

async fn get_version(
    State(state): State<Arc<AppState>>,
    Path((context, n)): Path<(String, u32)>,
) -> Result<Json<Value>, AdminError> {
    let context = parse_context(&context)?;
    let registry = state.registry(context);
    match registry.get(n) {
        Some(version) => Ok(Json(json!({ "version": version.version.0 }))),
        None => Err(AdminError::Schema(beehive_core::SchemaError::VersionNotFound(n))),
    }
}

async fn publish_version(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
) -> Result<Json<Value>, AdminError> {
    let context = parse_context(&context)?;
    let published = state.registry(context).publish()?;
    Ok(Json(json!({ "published": published })))
}

async fn revert_version(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
) -> Result<Json<Value>, AdminError> {
    let context = parse_context(&context)?;
    let registry = state.registry(context);
    let edited = registry.current_version();
    registry.downgrade(edited);
    Ok(Json(json!({ "edited": edited })))
}

/// User admin (§6.2 `/context/{uuid}/users`) is left as a stub that
/// exercises the route shape without a body schema of its own — user
/// lifecycle outside the `synch/*` endpoints isn't consumed by the sync
/// wire, and a full admin CRUD surface is explicitly the part of §1
/// "out of scope, specify only the contracts the core consumes."
async fn list_placeholder(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
) -> Result<Json<Value>, AdminError> {
    let context = parse_context(&context)?;
    let _ = state.registry(context);
    Ok(Json(json!({ "users": [] })))
}

#[derive(Debug, Deserialize)]
struct SignUpBody {
    identifier: String,
    password: String,
    name: String,
    node: Uuid,
    module: Uuid,
    version: u32,
}

#[derive(Debug, Serialize)]
struct SessionReply {
    #[serde(rename = "sessionId")]
    session_id: String,
    user: Uuid,
}

async fn synch_signup(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
    Json(body): Json<SignUpBody>,
) -> Result<Json<SessionReply>, AdminError> {
    let context = parse_context(&context)?;
    let dao = state.dao.as_ref();
    let hasher = Sha256Hasher;
    let user = sign_up_local(dao, &hasher, context, &body.identifier, &body.password, &body.name).await?;
    let (_, token) = beehive_auth::register_node(
        dao,
        user.id,
        context,
        body.node,
        ModuleId::from_uuid(body.module),
        Version(body.version),
    )
    .await?;
    Ok(Json(SessionReply {
        session_id: token,
        user: user.id.uuid(),
    }))
}

#[derive(Debug, Deserialize)]
struct SignInBody {
    identifier: String,
    password: String,
    node: Uuid,
    module: Uuid,
    version: u32,
}

async fn synch_signin(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
    Json(body): Json<SignInBody>,
) -> Result<Json<SessionReply>, AdminError> {
    let context = parse_context(&context)?;
    let dao = state.dao.as_ref();
    let hasher = Sha256Hasher;
    let user = sign_in_local(dao, &hasher, context, &body.identifier, &body.password).await?;
    let (_, token) = beehive_auth::register_node(
        dao,
        user.id,
        context,
        body.node,
        ModuleId::from_uuid(body.module),
        Version(body.version),
    )
    .await?;
    Ok(Json(SessionReply {
        session_id: token,
        user: user.id.uuid(),
    }))
}

#[derive(Debug, Deserialize)]
struct SignOutBody {
    user: Uuid,
    node: Uuid,
}

async fn synch_signout(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
    Json(body): Json<SignOutBody>,
) -> Result<Json<Value>, AdminError> {
    let _ = parse_context(&context)?;
    beehive_auth::sign_out_node(state.dao.as_ref(), UserId::from_uuid(body.user), beehive_core::NodeId::from_uuid(body.node)).await?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize)]
struct SignOffBody {
    user: Uuid,
}

async fn synch_signoff(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
    Json(body): Json<SignOffBody>,
) -> Result<Json<Value>, AdminError> {
    let context = parse_context(&context)?;
    sign_off(state.dao.as_ref(), context, UserId::from_uuid(body.user)).await?;
    Ok(Json(json!({ "status": "ok" })))
}
