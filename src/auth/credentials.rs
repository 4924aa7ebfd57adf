//! Password hashing, validation, and secure token generation.

use anyhow::{Context, Result};
use base64::Engine;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};

use super::error::AuthError;

/// Intentionally minimal; the original policy never enforced more than length.
pub const MIN_PASSWORD_LEN: usize = 6;

const BCRYPT_COST: u32 = 12;

const UPPER_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGIT_CHARS: &[u8] = b"0123456789";
const SYMBOL_CHARS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";
const GENERATED_PASSWORD_LEN: usize = 8;

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// bcrypt is deliberately slow; run it off the async worker threads so
/// concurrent session lookups are not stalled behind a hash.
pub async fn hash_password(plaintext: &str) -> Result<String> {
    let plaintext = plaintext.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, BCRYPT_COST))
        .await
        .context("password hashing task panicked")?
        .context("failed to hash password")
}

/// Verify a plaintext password against a stored bcrypt digest.
///
/// Returns `Ok(false)` on mismatch; errors only for a malformed digest.
pub async fn verify_password(plaintext: &str, digest: &str) -> Result<bool> {
    let plaintext = plaintext.to_string();
    let digest = digest.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &digest))
        .await
        .context("password verification task panicked")?
        .context("failed to verify password digest")
}

pub fn validate_password(plaintext: &str) -> Result<(), AuthError> {
    if plaintext.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if !(2..=100).contains(&len) {
        return Err("name must be between 2 and 100 characters".to_string());
    }
    Ok(())
}

pub fn validate_company(company: Option<&str>, allowed: &[String]) -> Result<(), String> {
    let Some(company) = company else {
        return Ok(());
    };
    if allowed.iter().any(|valid| valid == company) {
        Ok(())
    } else {
        Err("invalid company name".to_string())
    }
}

/// Create an opaque token for sessions and password resets.
///
/// The raw value is only handed to the caller; the database stores a hash.
pub fn generate_secure_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate secure token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a token so raw values never touch the database.
/// The hash is used for lookups when the token is presented.
#[must_use]
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Generate an 8-character password with at least one uppercase letter, one
/// lowercase letter, one digit, and one symbol.
///
/// Used for resets the user does not choose themselves. Character selection
/// and the final shuffle both draw from the OS CSPRNG through uniform,
/// rejection-sampled APIs.
pub fn generate_strong_password() -> Result<String> {
    let mut chars: Vec<u8> = Vec::with_capacity(GENERATED_PASSWORD_LEN);

    for charset in [UPPER_CHARS, LOWER_CHARS, DIGIT_CHARS, SYMBOL_CHARS] {
        chars.push(charset[OsRng.gen_range(0..charset.len())]);
    }

    let all_chars: Vec<u8> = [UPPER_CHARS, LOWER_CHARS, DIGIT_CHARS, SYMBOL_CHARS].concat();
    while chars.len() < GENERATED_PASSWORD_LEN {
        chars.push(all_chars[OsRng.gen_range(0..all_chars.len())]);
    }

    chars.shuffle(&mut OsRng);

    String::from_utf8(chars).context("generated password was not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Skipper@Example.COM "), "skipper@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("deckhand@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn validate_password_enforces_minimum_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword)
        ));
        assert!(validate_password("longer").is_ok());
    }

    #[test]
    fn validate_name_bounds() {
        assert!(validate_name("A").is_err());
        assert!(validate_name("Al").is_ok());
        assert!(validate_name(&"x".repeat(100)).is_ok());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn validate_company_checks_allow_list() {
        let allowed = vec!["Al Safwan Marine".to_string()];
        assert!(validate_company(None, &allowed).is_ok());
        assert!(validate_company(Some("Al Safwan Marine"), &allowed).is_ok());
        assert!(validate_company(Some("Unknown Corp"), &allowed).is_err());
    }

    #[test]
    fn secure_token_decodes_to_32_bytes() {
        let token = generate_secure_token().unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(token.as_bytes()).unwrap();
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn secure_tokens_do_not_repeat() {
        let first = generate_secure_token().unwrap();
        let second = generate_secure_token().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn hash_token_is_stable_and_discriminating() {
        let first = hash_token("token");
        let second = hash_token("token");
        let different = hash_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn generated_passwords_satisfy_composition() {
        for _ in 0..200 {
            let password = generate_strong_password().unwrap();
            assert_eq!(password.len(), 8);
            assert!(password.bytes().any(|b| b.is_ascii_uppercase()));
            assert!(password.bytes().any(|b| b.is_ascii_lowercase()));
            assert!(password.bytes().any(|b| b.is_ascii_digit()));
            assert!(password.bytes().any(|b| SYMBOL_CHARS.contains(&b)));
        }
    }

    #[tokio::test]
    async fn hash_and_verify_round_trip() {
        let digest = hash_password("hunter2!").await.unwrap();
        assert!(verify_password("hunter2!", &digest).await.unwrap());
        assert!(!verify_password("wrong", &digest).await.unwrap());
    }

    #[tokio::test]
    async fn verify_rejects_previous_password_after_change() {
        let old_digest = hash_password("original-pw").await.unwrap();
        let new_digest = hash_password("replacement-pw").await.unwrap();
        assert!(verify_password("replacement-pw", &new_digest).await.unwrap());
        assert!(!verify_password("original-pw", &new_digest).await.unwrap());
        // The old digest still only matches its own plaintext.
        assert!(verify_password("original-pw", &old_digest).await.unwrap());
    }

    #[tokio::test]
    async fn verify_errors_on_malformed_digest() {
        assert!(verify_password("pw", "not-a-digest").await.is_err());
    }
}
