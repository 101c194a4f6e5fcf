//! Credential manager: password hashing and verification.
//!
//! Passwords are stored only as Argon2 PHC strings (algorithm, parameters and
//! salt embedded), so verification is self-describing. No plaintext password
//! is ever persisted, logged, or returned to a client.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use crate::error::{AppError, AppResult};

/// Hash a password into a PHC string with a fresh 16-byte random salt.
/// Fails only on empty input.
pub fn hash_password(password: &str) -> AppResult<String> {
    if password.is_empty() {
        return Err(AppError::validation("empty_password", "password must not be empty"));
    }
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AppError::internal("salt_failed".to_string(), e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::internal("salt_failed".to_string(), e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal("hash_failed".to_string(), e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Verify a password against a stored PHC string.
/// A malformed hash never errors; it verifies false.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}
