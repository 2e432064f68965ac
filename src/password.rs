//! Password hashing and strength policy.

use std::sync::OnceLock;

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use argon2::{Algorithm, Argon2, Params, Version};
use validator::ValidationError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

// 19 MiB, 2 passes, 1 lane.
const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("argon2 error: {0}")]
    Argon2(String),
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| PasswordError::Argon2(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Argon2(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    match hasher() {
        Ok(argon2) => argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hash on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// Verify on the blocking pool.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, PasswordError> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?)
}

/// A valid hash of a random secret. Verified against when a login names an
/// unknown email, so both failure paths cost one argon2 verification.
pub fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        let secret = uuid::Uuid::new_v4().to_string();
        hash_password(&secret).unwrap_or_default()
    })
}

/// Password strength policy: 8 to 128 characters with at least one
/// uppercase letter, one lowercase letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(policy_error(
            "password_too_short",
            "Password must be at least 8 characters long",
        ));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(policy_error(
            "password_too_long",
            "Password must be at most 128 characters long",
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(policy_error(
            "password_no_uppercase",
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(policy_error(
            "password_no_lowercase",
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(policy_error(
            "password_no_digit",
            "Password must contain at least one number",
        ));
    }
    Ok(())
}

fn policy_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Secur3Pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secur3Pass", &hash));
        assert!(!verify_password("secur3pass", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("Secur3Pass").unwrap();
        let b = hash_password("Secur3Pass").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn test_dummy_hash_is_valid_phc() {
        assert!(PasswordHash::new(dummy_hash()).is_ok());
        assert!(!verify_password("Secur3Pass", dummy_hash()));
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hash = hash_password_blocking("Secur3Pass".to_string())
            .await
            .unwrap();
        assert!(
            verify_password_blocking("Secur3Pass".to_string(), hash)
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password_strength("Secur3Pass").is_ok());

        let cases = [
            ("Sh0rt", "password_too_short"),
            ("alllowercase1", "password_no_uppercase"),
            ("ALLUPPERCASE1", "password_no_lowercase"),
            ("NoDigitsHere", "password_no_digit"),
        ];
        for (password, code) in cases {
            let err = validate_password_strength(password).unwrap_err();
            assert_eq!(err.code, code, "password {password:?}");
        }

        let long = format!("Aa1{}", "x".repeat(MAX_PASSWORD_LENGTH));
        assert_eq!(
            validate_password_strength(&long).unwrap_err().code,
            "password_too_long"
        );
    }
}
