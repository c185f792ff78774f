//! Session authentication and full-sync orchestration for the Beehive sync
//! server (§4.7–§4.9).
//!
//! This crate has no transport of its own: it decodes nothing off a socket
//! and writes nothing back onto one. It exists to turn an already-decoded
//! [`beehive_wire`] frame into calls against `beehive_auth`/
//! `beehive_storage`, and an already-decoded [`fsm::FullSyncRequest`] into
//! an [`fsm::FullSyncResponse`]. `beehive-server` owns the socket and the
//! frame (de)serialization; this crate owns what happens in between.

pub mod errors;
pub mod fsm;
pub mod session;

pub use errors::SyncError;
pub use fsm::{
    run_full_sync, DatasetDownload, DatasetUploadBundle, FullSyncRequest, FullSyncResponse,
};
pub use session::{
    reconnect, sign_in_jwt, sign_in_password, sign_off_jwt, sign_off_local, sign_up, AuthenticatedSession,
};
