//! Password hashing, opaque token minting and one-time codes.
//!
//! Secrets handed to clients are random alphanumeric strings. Only their
//! SHA-256 digest is stored, so a leaked table cannot be replayed.

use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use crate::error::AppError;

pub const TOKEN_SECRET_LEN: usize = 40;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Pbkdf2.hash_password(password.as_bytes(), &salt)?.to_string())
}

/// `false` for a mismatch and for a hash that cannot be parsed.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok(),
        Err(err) => {
            tracing::warn!("Stored password hash is malformed: {}", err);
            false
        }
    }
}

/// A hash nobody knows the password for.
pub fn unusable_password_hash() -> Result<String, AppError> {
    hash_password(&random_secret(TOKEN_SECRET_LEN))
}

pub fn random_secret(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Hex SHA-256 digest used to store token secrets.
pub fn hash_token(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Four-digit one-time code in `1000..=9999`.
pub fn generate_otp() -> String {
    OsRng.gen_range(1000..=9999).to_string()
}

/// Bearer token as given to clients: `"{id}|{secret}"`.
pub fn format_access_token(id: i64, secret: &str) -> String {
    format!("{}|{}", id, secret)
}

/// Split a bearer token into its row id and secret.
pub fn parse_access_token(raw: &str) -> Option<(i64, &str)> {
    let (id, secret) = raw.trim().split_once('|')?;
    let id = id.parse::<i64>().ok()?;
    if secret.is_empty() {
        return None;
    }
    Some((id, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("rahasia123").unwrap();
        assert!(hash.starts_with("$pbkdf2"));
        assert!(verify_password("rahasia123", &hash));
        assert!(!verify_password("rahasia124", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn otp_is_four_digits() {
        for _ in 0..200 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 4);
            let n: u32 = otp.parse().unwrap();
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn secrets_are_alphanumeric_and_distinct() {
        let a = random_secret(TOKEN_SECRET_LEN);
        let b = random_secret(TOKEN_SECRET_LEN);
        assert_eq!(a.len(), TOKEN_SECRET_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn access_token_format_parses_back() {
        let raw = format_access_token(42, "s3cret");
        assert_eq!(parse_access_token(&raw), Some((42, "s3cret")));
        assert_eq!(parse_access_token("42|"), None);
        assert_eq!(parse_access_token("abc|s3cret"), None);
        assert_eq!(parse_access_token("no-separator"), None);
    }
}
