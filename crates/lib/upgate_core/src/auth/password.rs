//! Password hashing via bcrypt with an explicit per-user salt.
//!
//! The salt is generated here rather than by bcrypt so it can be stored
//! beside the hash. Verification recomputes the hash with the stored salt
//! and compares in constant time. Passwords longer than bcrypt's input limit
//! are refused rather than truncated.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bcrypt::Version;
use rand::RngCore;
use subtle::ConstantTimeEq;

use super::AuthError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Salt length in bytes (bcrypt's native salt size).
pub const SALT_LEN: usize = 16;

/// Longest password bcrypt hashes without truncation, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hash a password with a fresh random salt. Returns `(hash, base64 salt)`.
pub fn hash_with_salt(password: &str) -> Result<(String, String), AuthError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let hash = digest(password, salt)?;
    Ok((hash, STANDARD.encode(salt)))
}

/// Check `password` against a stored hash and salt.
///
/// Returns `false` on mismatch, on an empty stored hash (OAuth-only users),
/// on a malformed salt and on a password over [`MAX_PASSWORD_BYTES`].
pub fn verify(password: &str, stored_hash: &str, stored_salt: &str) -> bool {
    if stored_hash.is_empty() {
        return false;
    }
    let Ok(decoded) = STANDARD.decode(stored_salt) else {
        return false;
    };
    let Ok(salt) = <[u8; SALT_LEN]>::try_from(decoded.as_slice()) else {
        return false;
    };
    match digest(password, salt) {
        Ok(candidate) => candidate.as_bytes().ct_eq(stored_hash.as_bytes()).into(),
        Err(_) => false,
    }
}

/// Do the bcrypt work of a [`verify`] call without a stored credential, so a
/// login for an unknown account takes as long as one with a wrong password.
pub fn dummy_verify(password: &str) {
    let _hashed: Result<String, AuthError> = digest(password, [0u8; SALT_LEN]);
}

fn digest(password: &str, salt: [u8; SALT_LEN]) -> Result<String, AuthError> {
    bcrypt::non_truncating_hash_with_salt(password, BCRYPT_COST, salt)
        .map(|parts| parts.format_for_version(Version::TwoB))
        .map_err(|e| AuthError::internal("bcrypt hash").with_source(e))
}
