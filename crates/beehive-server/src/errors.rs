//! Mapping domain errors onto wire response codes and HTTP statuses (§7).
//!
//! Every other crate's error enum stays purely domain-shaped; this is the
//! one place that knows what a `NotFound` becomes on the wire versus in a
//! JSON response, matching "domain errors become JSON at the admin
//! boundary" and the wire code table in §6.1/§7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use beehive_auth::AuthError;
use beehive_core::{CodecError, SchemaError};
use beehive_storage::StorageError;
use beehive_sync::SyncError;
use beehive_wire::{ResponseCode, WireError};
use serde_json::json;

/// Translate any domain failure reachable from a sync session into the
/// wire response code §6.1's table assigns it.
pub fn response_code_for(err: &SyncError) -> ResponseCode {
    match err {
        SyncError::Auth(auth) => response_code_for_auth(auth),
        SyncError::Storage(_) => ResponseCode::InternalError,
        SyncError::Schema(_) => ResponseCode::InvalidSchema,
        SyncError::Codec(_) => ResponseCode::InternalError,
        SyncError::Wire(wire) => response_code_for_wire(wire),
        SyncError::MalformedContext(_) => ResponseCode::InvalidSchema,
    }
}

fn response_code_for_auth(err: &AuthError) -> ResponseCode {
    match err {
        AuthError::AuthenticationFailed => ResponseCode::UserNotFound,
        AuthError::NotFound { .. } => ResponseCode::DataNotFound,
        AuthError::AlreadyExists { .. } => ResponseCode::InternalError,
        AuthError::NotEnoughRights { .. } => ResponseCode::NotEnoughRights,
        AuthError::InvalidSchema(_) => ResponseCode::InvalidSchema,
        AuthError::Storage(_) => ResponseCode::InternalError,
        AuthError::Jwt(_) => ResponseCode::UserNotFound,
    }
}

fn response_code_for_wire(err: &WireError) -> ResponseCode {
    match err {
        WireError::TransmissionError { .. } => ResponseCode::TransmissionError,
        _ => ResponseCode::InternalError,
    }
}

/// Admin-surface error: every domain error this crate's HTTP routes can
/// raise, translated to the JSON envelope and status from §7.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

impl AdminError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::AuthenticationFailed) => StatusCode::FORBIDDEN,
            Self::Auth(AuthError::NotEnoughRights { .. }) => StatusCode::FORBIDDEN,
            Self::Auth(AuthError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Auth(AuthError::AlreadyExists { .. }) => StatusCode::CONFLICT,
            Self::Auth(AuthError::InvalidSchema(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(AuthError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(AuthError::Jwt(_)) => StatusCode::FORBIDDEN,
            Self::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Storage(StorageError::AlreadyExists { .. }) => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Codec(_) => StatusCode::BAD_REQUEST,
            Self::Sync(inner) => match inner {
                SyncError::Auth(auth) => return AdminError::Auth(match_clone_auth(auth)).status(),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `AuthError` doesn't implement `Clone` (it wraps other non-`Clone`
/// errors); re-derive just the status-relevant shape for the nested
/// `SyncError::Auth` case rather than fighting the borrow checker over a
/// moved value.
fn match_clone_auth(auth: &AuthError) -> AuthError {
    match auth {
        AuthError::AuthenticationFailed => AuthError::AuthenticationFailed,
        AuthError::NotFound { kind } => AuthError::NotFound { kind },
        AuthError::AlreadyExists { kind } => AuthError::AlreadyExists { kind },
        AuthError::NotEnoughRights { capability } => AuthError::NotEnoughRights { capability },
        AuthError::InvalidSchema(e) => AuthError::InvalidSchema(e.clone()),
        AuthError::Storage(StorageError::NotFound { kind }) => AuthError::Storage(StorageError::NotFound { kind }),
        AuthError::Storage(StorageError::AlreadyExists { kind }) => {
            AuthError::Storage(StorageError::AlreadyExists { kind })
        }
        AuthError::Storage(StorageError::TransactionNotActive(id)) => {
            AuthError::Storage(StorageError::TransactionNotActive(*id))
        }
        AuthError::Storage(StorageError::Codec(e)) => AuthError::Storage(StorageError::Codec(e.clone())),
        AuthError::Jwt(msg) => AuthError::Jwt(msg.clone()),
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(error = %self, %status, "admin request failed");
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
