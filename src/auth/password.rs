use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;
use tokio::task::{self, JoinError};

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(password_hash::Error),

    #[error("password task failed: {0}")]
    Task(#[from] JoinError),
}

fn hash_blocking(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

fn verify_blocking(password: &str, stored: &str) -> bool {
    // An unparsable stored hash never matches
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Argon2id PHC string for `password`, computed on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, PasswordError> {
    task::spawn_blocking(move || hash_blocking(&password)).await?
}

/// Checks `password` against a PHC string on the blocking pool.
pub async fn verify_password(password: String, stored: String) -> Result<bool, PasswordError> {
    Ok(task::spawn_blocking(move || verify_blocking(&password, &stored)).await?)
}
