//! Turning a decoded auth opener into an authenticated sync session (§4.7).
//!
//! Everything here is a thin translation from [`beehive_wire::messages`]
//! frames into calls against `beehive_auth`: parse the wire's `context`
//! field, resolve the declared `module` name against the session's schema
//! version, run the matching auth flow, and register/rotate the node.

use crate::errors::SyncError;
use beehive_auth::{JwtVerifier, PasswordHasher};
use beehive_core::{ContextId, ModuleId, SchemaError, SchemaVersion, UserId, Version};
use beehive_storage::Dao;
use beehive_wire::messages::{JwtSignIn, PasswordSignIn, Reconnect, SignOffJwt, SignOffLocal, SignUp};
use uuid::Uuid;

/// The authenticated identity and declared client shape behind one sync
/// session (§4.7, §4.9).
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedSession {
    /// The signed-in user.
    pub user: UserId,
    /// The client's node, freshly (re)keyed on every opener except reconnect.
    pub node: beehive_core::NodeId,
    /// The tenant this session is scoped to.
    pub context: ContextId,
    /// The client build's declared visible-attribute module.
    pub module: ModuleId,
    /// Schema version the client advertised.
    pub version: Version,
}

fn parse_context(raw: &str) -> Result<ContextId, SyncError> {
    Uuid::parse_str(raw)
        .map(ContextId::from_uuid)
        .map_err(|_| SyncError::MalformedContext(raw.to_string()))
}

fn resolve_module(schema: &SchemaVersion, name: &str) -> Result<ModuleId, SyncError> {
    schema
        .module_by_name(name)
        .map(|m| m.id)
        .ok_or_else(|| SchemaError::UnknownName { kind: "module", name: name.to_string() }.into())
}

/// `I` — JWT sign-in (§4.7). Returns the session plus a fresh reconnection
/// token to hand back on the wire.
pub async fn sign_in_jwt(
    dao: &dyn Dao,
    verifier: &dyn JwtVerifier,
    schema: &SchemaVersion,
    frame: &JwtSignIn,
) -> Result<(AuthenticatedSession, String), SyncError> {
    let claims = verifier.verify(&frame.token)?;
    let context = parse_context(&frame.context)?;
    let user = beehive_auth::upsert_google_user(dao, context, &claims.email, &claims.name).await?;
    let module = resolve_module(schema, &frame.module)?;
    let version = Version(frame.version);
    let (node, token) = beehive_auth::register_node(dao, user.id, context, frame.node_uuid, module, version).await?;
    Ok((
        AuthenticatedSession { user: user.id, node: node.id, context, module, version },
        token,
    ))
}

/// `S` — password sign-in (§4.7).
pub async fn sign_in_password(
    dao: &dyn Dao,
    hasher: &dyn PasswordHasher,
    schema: &SchemaVersion,
    frame: &PasswordSignIn,
) -> Result<(AuthenticatedSession, String), SyncError> {
    let context = parse_context(&frame.context)?;
    let user = beehive_auth::sign_in_local(dao, hasher, context, &frame.email, &frame.password).await?;
    let module = resolve_module(schema, &frame.module)?;
    let version = Version(frame.version);
    let (node, token) = beehive_auth::register_node(dao, user.id, context, frame.node_uuid, module, version).await?;
    Ok((
        AuthenticatedSession { user: user.id, node: node.id, context, module, version },
        token,
    ))
}

/// `U` — sign-up (§4.7): attaches credentials to an invited user, or
/// behaves as sign-in if the password is already set.
pub async fn sign_up(
    dao: &dyn Dao,
    hasher: &dyn PasswordHasher,
    schema: &SchemaVersion,
    frame: &SignUp,
) -> Result<(AuthenticatedSession, String), SyncError> {
    let sign_in = &frame.sign_in;
    let context = parse_context(&sign_in.context)?;
    let user = beehive_auth::sign_up_local(dao, hasher, context, &sign_in.email, &sign_in.password, &frame.name).await?;
    let module = resolve_module(schema, &sign_in.module)?;
    let version = Version(sign_in.version);
    let (node, token) = beehive_auth::register_node(dao, user.id, context, sign_in.node_uuid, module, version).await?;
    Ok((
        AuthenticatedSession { user: user.id, node: node.id, context, module, version },
        token,
    ))
}

/// `C` — reconnect (§4.7): resumes a session from a previously issued
/// token without re-running credential checks.
pub async fn reconnect(dao: &dyn Dao, frame: &Reconnect) -> Result<AuthenticatedSession, SyncError> {
    let token = beehive_auth::RECONNECT_TOKEN_RAW_LEN;
    debug_assert_eq!(frame.token.len(), token);
    let token_str = base64::engine::general_purpose::STANDARD.encode(&frame.token);
    let node = beehive_auth::reconnect(dao, &token_str).await?;
    Ok(AuthenticatedSession {
        user: node.user,
        node: node.id,
        context: node.context,
        module: node.module,
        version: Version(frame.version),
    })
}

/// `F` — sign-off via JWT (§4.7): verifies the token, then cascades the
/// user's nodes and memberships.
pub async fn sign_off_jwt(dao: &dyn Dao, verifier: &dyn JwtVerifier, frame: &SignOffJwt) -> Result<(), SyncError> {
    let claims = verifier.verify(&frame.token)?;
    let context = parse_context(&frame.context)?;
    let user = dao
        .read_user_by_identifier(context, &claims.email.to_lowercase())
        .await
        .map_err(SyncError::Storage)?
        .ok_or(beehive_auth::AuthError::NotFound { kind: "user" })?;
    beehive_auth::sign_off(dao, context, user.id).await?;
    Ok(())
}

/// `G` — sign-off via local credentials (§4.7).
pub async fn sign_off_local(
    dao: &dyn Dao,
    hasher: &dyn PasswordHasher,
    frame: &SignOffLocal,
) -> Result<(), SyncError> {
    let context = parse_context(&frame.context)?;
    let user = beehive_auth::sign_in_local(dao, hasher, context, &frame.email, &frame.password).await?;
    beehive_auth::sign_off(dao, context, user.id).await?;
    Ok(())
}

use base64::Engine;

#[cfg(test)]
mod tests {
    use super::*;
    use beehive_auth::Sha256Hasher;
    use beehive_core::{Module, Role, Version as V};
    use beehive_storage::MemoryDao;

    fn schema_with_module() -> SchemaVersion {
        let module = Module { id: ModuleId::new(), name: "default".into(), entity_masks: Default::default() };
        SchemaVersion::new(V(1), vec![], vec![], vec![Role::default()], vec![module]).unwrap()
    }

    #[tokio::test]
    async fn password_sign_up_then_reconnect_round_trips() {
        let dao = MemoryDao::new();
        let schema = schema_with_module();
        let sign_in = PasswordSignIn {
            email: "a@example.com".into(),
            password: "hunter2".into(),
            context: ContextId::new().uuid().to_string(),
            module: "default".into(),
            node_uuid: Uuid::new_v4(),
            version: 1,
        };
        let up = SignUp { name: "Alice".into(), sign_in: sign_in.clone() };
        let (session, token) = sign_up(&dao, &Sha256Hasher, &schema, &up).await.unwrap();

        let reconnect_frame = Reconnect {
            token: base64::engine::general_purpose::STANDARD.decode(&token).unwrap(),
            version: 2,
        };
        let reconnected = reconnect(&dao, &reconnect_frame).await.unwrap();
        assert_eq!(reconnected.user, session.user);
        assert_eq!(reconnected.node, session.node);
    }

    #[tokio::test]
    async fn sign_in_with_unknown_module_is_rejected() {
        let dao = MemoryDao::new();
        let schema = schema_with_module();
        let context = ContextId::new();
        beehive_auth::sign_up_local(&dao, &Sha256Hasher, context, "b@example.com", "pw", "Bob")
            .await
            .unwrap();

        let sign_in = PasswordSignIn {
            email: "b@example.com".into(),
            password: "pw".into(),
            context: context.uuid().to_string(),
            module: "nope".into(),
            node_uuid: Uuid::new_v4(),
            version: 1,
        };
        let err = sign_in_password(&dao, &Sha256Hasher, &schema, &sign_in).await.unwrap_err();
        assert!(matches!(err, SyncError::Schema(SchemaError::UnknownName { kind: "module", .. })));
    }
}
