//! Google JWT sign-in (§4.7): verify `iss == accounts.google.com` against
//! a rotating set of Google's published RSA public keys.
//!
//! Key rotation is out of band (an operator task, or a future poller
//! against Google's JWKS endpoint); this module only holds the keys and
//! verifies against whichever are currently loaded.

use crate::errors::AuthError;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// The identity claims this crate cares about out of a verified Google ID
/// token; everything else in the token is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleClaims {
    /// Token issuer; checked against [`GOOGLE_ISSUERS`] on top of signature
    /// verification since `jsonwebtoken`'s issuer check is a plain string
    /// match and Google accepts either form.
    pub iss: String,
    /// The user's email address; the identifier Beehive stores users by.
    pub email: String,
    /// Display name, used to seed a newly created user's name.
    #[serde(default)]
    pub name: String,
}

/// Verifies a signed token and returns the identity claims it carries.
pub trait JwtVerifier: Send + Sync {
    /// Verify `token`, returning the claims on success.
    fn verify(&self, token: &str) -> Result<GoogleClaims, AuthError>;
}

/// Verifies Google-issued ID tokens against a set of RSA public keys held
/// under a read-mostly lock, so key rotation doesn't block in-flight
/// verifications.
pub struct GoogleJwtVerifier {
    keys: RwLock<Vec<DecodingKey>>,
}

impl GoogleJwtVerifier {
    /// Build a verifier from a set of PEM-encoded RSA public keys.
    pub fn from_pem_keys(pem_keys: &[String]) -> Result<Self, AuthError> {
        let keys = Self::parse_keys(pem_keys)?;
        Ok(Self { keys: RwLock::new(keys) })
    }

    /// Replace the held key set, e.g. after Google rotates its signing keys.
    pub fn rotate_keys(&self, pem_keys: &[String]) -> Result<(), AuthError> {
        let keys = Self::parse_keys(pem_keys)?;
        *self.keys.write() = keys;
        Ok(())
    }

    fn parse_keys(pem_keys: &[String]) -> Result<Vec<DecodingKey>, AuthError> {
        pem_keys
            .iter()
            .map(|pem| DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| AuthError::Jwt(e.to_string())))
            .collect()
    }
}

impl JwtVerifier for GoogleJwtVerifier {
    fn verify(&self, token: &str) -> Result<GoogleClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let keys = self.keys.read();
        for key in keys.iter() {
            if let Ok(data) = jsonwebtoken::decode::<GoogleClaims>(token, key, &validation) {
                return Ok(data.claims);
            }
        }
        Err(AuthError::Jwt("no loaded key verified the token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_set_rejects_every_token() {
        let verifier = GoogleJwtVerifier::from_pem_keys(&[]).unwrap();
        let err = verifier.verify("not-a-real-token").unwrap_err();
        assert!(matches!(err, AuthError::Jwt(_)));
    }
}
