// Credential hashing with Argon2id
// Hashes are one-way; verification is the only way to test a candidate

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use crate::error::AuthError;

/// Hash a plaintext password with Argon2id and a fresh random salt.
///
/// Cost parameters come from [`Argon2::default`]; the salt is embedded in the
/// returned PHC string, so two hashes of the same password differ.
pub fn hash(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a candidate password against a stored PHC hash string.
///
/// A malformed stored hash yields `false`, never an error.
pub fn verify(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
