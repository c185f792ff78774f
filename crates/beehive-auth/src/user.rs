//! User resolution for sign-in/sign-up (§4.7).
//!
//! Password hashing itself is a named out-of-scope collaborator
//! (`spec.md` §1); [`PasswordHasher`] is the seam. [`Sha256Hasher`] is a
//! concrete default so the crate has something runnable, not a claim that
//! salted SHA-256 is production-grade password storage.

use crate::errors::AuthError;
use beehive_core::ContextId;
use beehive_storage::{Dao, UserRecord, UserType};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Computes and verifies a password hash against a per-user salt.
pub trait PasswordHasher: Send + Sync {
    /// Hash `password` salted with `salt`.
    fn hash(&self, password: &str, salt: &[u8]) -> Vec<u8>;
}

/// Salted SHA-256. A placeholder default, not a production KDF — swap in
/// a real one (argon2, scrypt) per deployment by implementing
/// [`PasswordHasher`] and passing it to sign-in/sign-up instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl PasswordHasher for Sha256Hasher {
    fn hash(&self, password: &str, salt: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().to_vec()
    }
}

/// Constant-time byte comparison, for password hashes and node keys alike.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn fresh_salt() -> Vec<u8> {
    let mut salt = vec![0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Sign-in (local, §4.7): lowercase email, look up the user, require
/// `type == internal`, recompute the password hash with the stored salt,
/// constant-time compare.
pub async fn sign_in_local(
    dao: &dyn Dao,
    hasher: &dyn PasswordHasher,
    context: ContextId,
    identifier: &str,
    password: &str,
) -> Result<UserRecord, AuthError> {
    let identifier = identifier.to_lowercase();
    let user = dao
        .read_user_by_identifier(context, &identifier)
        .await?
        .ok_or(AuthError::NotFound { kind: "user" })?;
    verify_internal_password(&user, password, hasher)?;
    Ok(user)
}

fn verify_internal_password(user: &UserRecord, password: &str, hasher: &dyn PasswordHasher) -> Result<(), AuthError> {
    if user.user_type != UserType::Internal {
        return Err(AuthError::AuthenticationFailed);
    }
    let salt = user.salt.as_deref().ok_or(AuthError::AuthenticationFailed)?;
    let expected = user.password_hash.as_deref().ok_or(AuthError::AuthenticationFailed)?;
    let computed = hasher.hash(password, salt);
    if !constant_time_eq(&computed, expected) {
        return Err(AuthError::AuthenticationFailed);
    }
    Ok(())
}

/// Sign-up (local, §4.7): behaves like sign-in, except a pre-existing user
/// with no password set (created by an invite) gets credentials attached
/// instead of being rejected; a user with a password already set must
/// match it (never silently overwritten).
pub async fn sign_up_local(
    dao: &dyn Dao,
    hasher: &dyn PasswordHasher,
    context: ContextId,
    identifier: &str,
    password: &str,
    name: &str,
) -> Result<UserRecord, AuthError> {
    let identifier = identifier.to_lowercase();
    match dao.read_user_by_identifier(context, &identifier).await? {
        Some(mut user) if user.password_hash.is_none() => {
            let salt = fresh_salt();
            user.password_hash = Some(hasher.hash(password, &salt));
            user.salt = Some(salt);
            dao.save_user(user.clone()).await?;
            Ok(user)
        }
        Some(user) => {
            verify_internal_password(&user, password, hasher)?;
            Ok(user)
        }
        None => {
            let salt = fresh_salt();
            let user = UserRecord {
                id: beehive_core::UserId::new(),
                context,
                identifier,
                name: name.to_string(),
                user_type: UserType::Internal,
                password_hash: Some(hasher.hash(password, &salt)),
                salt: Some(salt),
            };
            dao.save_user(user.clone()).await?;
            Ok(user)
        }
    }
}

/// Resolve (creating if absent) the user behind a verified Google JWT
/// (§4.7): `type = google`, identifier is the token's `email` claim.
pub async fn upsert_google_user(
    dao: &dyn Dao,
    context: ContextId,
    email: &str,
    name: &str,
) -> Result<UserRecord, AuthError> {
    let identifier = email.to_lowercase();
    if let Some(user) = dao.read_user_by_identifier(context, &identifier).await? {
        return Ok(user);
    }
    let user = UserRecord {
        id: beehive_core::UserId::new(),
        context,
        identifier,
        name: name.to_string(),
        user_type: UserType::Google,
        password_hash: None,
        salt: None,
    };
    dao.save_user(user.clone()).await?;
    Ok(user)
}

/// Sign-off (§4.7): delete the user, cascading all of its nodes and
/// dataset memberships.
pub async fn sign_off(dao: &dyn Dao, context: ContextId, user: beehive_core::UserId) -> Result<(), AuthError> {
    dao.remove_nodes_by_user(user).await?;
    dao.remove_members_by_user(user).await?;
    dao.remove_user(context, user).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beehive_storage::MemoryDao;

    #[tokio::test]
    async fn sign_up_then_sign_in_round_trips() {
        let dao = MemoryDao::new();
        let hasher = Sha256Hasher;
        let context = ContextId::new();
        sign_up_local(&dao, &hasher, context, "User@Example.com", "hunter2", "Example User")
            .await
            .unwrap();
        let user = sign_in_local(&dao, &hasher, context, "user@example.com", "hunter2").await.unwrap();
        assert_eq!(user.identifier, "user@example.com");
    }

    #[tokio::test]
    async fn sign_in_wrong_password_fails() {
        let dao = MemoryDao::new();
        let hasher = Sha256Hasher;
        let context = ContextId::new();
        sign_up_local(&dao, &hasher, context, "user@example.com", "hunter2", "User").await.unwrap();
        let err = sign_in_local(&dao, &hasher, context, "user@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn sign_up_attaches_credentials_to_invited_user_without_overwriting() {
        let dao = MemoryDao::new();
        let hasher = Sha256Hasher;
        let context = ContextId::new();
        // Simulate a user created by an invite: no password set yet.
        let invited = UserRecord {
            id: beehive_core::UserId::new(),
            context,
            identifier: "invitee@example.com".into(),
            name: "Invitee".into(),
            user_type: UserType::Internal,
            password_hash: None,
            salt: None,
        };
        dao.save_user(invited).await.unwrap();

        sign_up_local(&dao, &hasher, context, "invitee@example.com", "first-password", "Invitee")
            .await
            .unwrap();
        // A second sign-up with a different password must fail, not overwrite.
        let err = sign_up_local(&dao, &hasher, context, "invitee@example.com", "second-password", "Invitee")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }
}
