//! Sessions, node registration, authorization, and share tokens for the
//! Beehive sync server (§4.6, §4.7, §4.8).
//!
//! Password hashing and JWT key distribution are both named out-of-scope
//! "thin collaborator" concerns (`spec.md` §1); [`user::PasswordHasher`]
//! and [`jwt::JwtVerifier`] are the seams a deployment plugs a real
//! implementation into.

pub mod dataset;
pub mod errors;
pub mod jwt;
pub mod node;
pub mod share;
pub mod user;

pub use dataset::{require_active_member, require_capability, require_member, Capability, MemberView};
pub use errors::AuthError;
pub use jwt::{GoogleClaims, GoogleJwtVerifier, JwtVerifier};
pub use node::{issue_reconnect_token, reconnect, register_node, sign_out as sign_out_node, RECONNECT_TOKEN_RAW_LEN};
pub use user::{constant_time_eq, sign_in_local, sign_off, sign_up_local, upsert_google_user, PasswordHasher, Sha256Hasher};
