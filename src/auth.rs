//! Minimal bearer-token authentication.
//!
//! Repurposes the teacher's AWS SigV4 signing primitives (`hmac` + `hex`,
//! originally in `connector_s3.rs`) for signing session tokens instead of
//! S3 requests: same HMAC-SHA256 primitive, a different message to sign.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::errors::{AppError, AppResult};
use crate::models::Workspace;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    user_id: String,
    expires_at: i64,
}

/// Sign `user_id` + an expiry into an opaque bearer token:
/// `base64(payload_json).hex(hmac)`.
pub fn issue_token(secret_key: &str, user_id: &str, expire_minutes: i64) -> String {
    let payload = TokenPayload {
        user_id: user_id.to_string(),
        expires_at: Utc::now().timestamp() + expire_minutes * 60,
    };
    let payload_json = serde_json::to_string(&payload).expect("TokenPayload always serializes");
    let payload_b64 = STANDARD.encode(&payload_json);

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload_b64.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("{}.{}", payload_b64, signature)
}

/// Verify signature and expiry, returning the signed-in user id.
pub fn verify_token(secret_key: &str, token: &str) -> AppResult<String> {
    let (payload_b64, signature) = token
        .split_once('.')
        .ok_or_else(|| AppError::Unauthorized("malformed token".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload_b64.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    if expected != signature {
        return Err(AppError::Unauthorized("invalid token signature".to_string()));
    }

    let payload_json = STANDARD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized("malformed token payload".to_string()))?;
    let payload: TokenPayload = serde_json::from_slice(&payload_json)
        .map_err(|_| AppError::Unauthorized("malformed token payload".to_string()))?;

    if payload.expires_at < Utc::now().timestamp() {
        return Err(AppError::Unauthorized("token expired".to_string()));
    }

    Ok(payload.user_id)
}

pub async fn register_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    display_name: &str,
) -> AppResult<String> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AppError::field_validation("email", "must be a valid email address"));
    }
    if password.len() < 8 {
        return Err(AppError::field_validation("password", "must be at least 8 characters"));
    }

    let user_id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(password)?;
    let now = Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, display_name, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user_id)
    .bind(email)
    .bind(&password_hash)
    .bind(display_name)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE") {
            AppError::field_validation("email", "already registered")
        } else {
            AppError::from(e)
        }
    })?;

    Ok(user_id)
}

pub async fn authenticate(pool: &SqlitePool, email: &str, password: &str) -> AppResult<String> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT id, password_hash FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

    let (user_id, password_hash) = row
        .ok_or_else(|| AppError::Unauthorized("invalid email or password".to_string()))?;

    if !verify_password(password, &password_hash) {
        return Err(AppError::Unauthorized("invalid email or password".to_string()));
    }

    Ok(user_id)
}

/// Salted Argon2id hash, stored in PHC string format (embeds the salt and
/// parameters alongside the hash, so verification needs only the password).
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::from(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn workspace_owned_by(
    pool: &SqlitePool,
    workspace_id: &str,
    user_id: &str,
) -> AppResult<Workspace> {
    let row = sqlx::query_as::<_, (String, String, String, i64)>(
        "SELECT id, owner_id, name, created_at FROM workspaces WHERE id = ?",
    )
    .bind(workspace_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("workspace", workspace_id))?;

    if row.1 != user_id {
        return Err(AppError::Forbidden("not the workspace owner".to_string()));
    }

    Ok(Workspace {
        id: row.0,
        owner_id: row.1,
        name: row.2,
        created_at: chrono::DateTime::from_timestamp(row.3, 0).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let token = issue_token("secret", "user-1", 60);
        let user_id = verify_token("secret", &token).unwrap();
        assert_eq!(user_id, "user-1");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = issue_token("secret", "user-1", 60);
        let tampered = format!("{}x", token);
        assert!(verify_token("secret", &tampered).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token("secret", "user-1", -1);
        assert!(verify_token("secret", &token).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("secret", "user-1", 60);
        assert!(verify_token("other-secret", &token).is_err());
    }
}
