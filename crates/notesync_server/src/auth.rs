//! Authentication support for the sync server.
//!
//! This module provides token-based authentication using HMAC-SHA256.
//! Tokens include a timestamp for expiration checking.
//!
//! ## Token Format
//!
//! `{payload}.{signature}`, both hex-encoded, where the payload is the
//! UTF-8 user name followed by the issue time (Unix millis, 8 bytes
//! big-endian) and the signature is the HMAC-SHA256 of the payload.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60), // 24 hours
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Token validator for incoming requests.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a new access token for a user.
    pub fn create_token(&self, user_name: &str) -> ServerResult<String> {
        let mut payload = Vec::with_capacity(user_name.len() + 8);
        payload.extend_from_slice(user_name.as_bytes());
        payload.extend_from_slice(&now_millis().to_be_bytes());

        let signature = self.mac(&payload)?.finalize().into_bytes();
        Ok(format!("{}.{}", hex::encode(&payload), hex::encode(signature)))
    }

    /// Validates a token for a request on `expected_user`'s collection.
    ///
    /// A malformed, forged or expired token fails with
    /// `AuthenticationFailed`; a valid token issued to another user fails
    /// with `NotAuthorized`.
    pub fn validate_token(&self, token: &str, expected_user: &str) -> ServerResult<()> {
        let (payload_hex, signature_hex) = token
            .split_once('.')
            .ok_or_else(|| ServerError::AuthenticationFailed("Malformed token".into()))?;
        let payload = hex::decode(payload_hex)
            .map_err(|_| ServerError::AuthenticationFailed("Malformed token".into()))?;
        let signature = hex::decode(signature_hex)
            .map_err(|_| ServerError::AuthenticationFailed("Malformed token".into()))?;

        if payload.len() < 8 {
            return Err(ServerError::AuthenticationFailed("Invalid token length".into()));
        }

        // Verify signature
        self.mac(&payload)?
            .verify_slice(&signature)
            .map_err(|_| ServerError::AuthenticationFailed("Invalid signature".into()))?;

        // Check expiration
        let (user_bytes, timestamp_bytes) = payload.split_at(payload.len() - 8);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(timestamp_bytes);
        let issued_at = u64::from_be_bytes(timestamp);
        let expiry_millis = self.config.token_expiry.as_millis() as u64;
        if now_millis() > issued_at.saturating_add(expiry_millis) {
            return Err(ServerError::AuthenticationFailed("Token expired".into()));
        }

        if user_bytes != expected_user.as_bytes() {
            return Err(ServerError::NotAuthorized(format!(
                "token does not grant access to {expected_user}"
            )));
        }
        Ok(())
    }

    fn mac(&self, data: &[u8]) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("hmac key: {e}")))?;
        mac.update(data);
        Ok(mac)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
