//! Token and credential primitives
//!
//! Session tokens are opaque random strings. Access tokens are signed
//! payloads carrying the user id and an expiry, verified against the
//! per-database secret stored in `settings`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use trailmark_common::{Error, Result};

use crate::fingerprint::to_canonical_json;

/// Generate an opaque session token (32 random bytes, base64url)
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a random password salt (16 bytes, base64url)
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a password with the given salt
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Verify a password against a stored hash and salt
pub fn verify_password(password: &str, salt: &str, stored_hash: &str) -> bool {
    let computed = hash_password(password, salt);
    // Byte-by-byte comparison without early exit
    if computed.len() != stored_hash.len() {
        return false;
    }
    computed
        .bytes()
        .zip(stored_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Sign an access token for a user
///
/// Format: `base64url(payload) + "." + base64url(sha256(payload || secret))`
/// where payload is canonical JSON with `exp` (unix seconds) and `user_id`.
pub fn sign_access_token(
    user_id: Uuid,
    ttl_days: i64,
    secret: &str,
    now: DateTime<Utc>,
) -> String {
    let exp = (now + Duration::days(ttl_days)).timestamp();
    let mut claims = serde_json::Map::new();
    claims.insert("exp".to_string(), serde_json::json!(exp));
    claims.insert("user_id".to_string(), serde_json::json!(user_id.to_string()));
    let payload = to_canonical_json(&serde_json::Value::Object(claims));
    let signature = sign_payload(&payload, secret);
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

/// Verify an access token and return the user id it was issued for
///
/// Returns `Error::InvalidInput` for malformed or forged tokens and
/// `Error::ExpiredCredential` for valid but expired ones.
pub fn verify_access_token(token: &str, secret: &str, now: DateTime<Utc>) -> Result<Uuid> {
    let (payload_b64, signature_b64) = token
        .split_once('.')
        .ok_or_else(|| Error::InvalidInput("malformed access token".to_string()))?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| Error::InvalidInput("malformed access token".to_string()))?;
    let payload = String::from_utf8(payload_bytes)
        .map_err(|_| Error::InvalidInput("malformed access token".to_string()))?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| Error::InvalidInput("malformed access token".to_string()))?;
    let expected = sign_payload(&payload, secret);
    if signature.len() != expected.len()
        || signature
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            != 0
    {
        return Err(Error::InvalidInput("invalid token signature".to_string()));
    }
    let claims: serde_json::Value = serde_json::from_str(&payload)
        .map_err(|_| Error::InvalidInput("malformed token payload".to_string()))?;
    let exp = claims
        .get("exp")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::InvalidInput("malformed token payload".to_string()))?;
    if now.timestamp() > exp {
        return Err(Error::ExpiredCredential("access token expired".to_string()));
    }
    let user_id = claims
        .get("user_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| Error::InvalidInput("malformed token payload".to_string()))?;
    Ok(user_id)
}

/// Resolve an access token to its user.
pub async fn user_from_token(
    pool: &sqlx::SqlitePool,
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<crate::models::User> {
    let user_id = verify_access_token(token, secret, now)?;
    crate::db::users::get_user(pool, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", user_id)))
}

fn sign_payload(payload: &str, secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}
