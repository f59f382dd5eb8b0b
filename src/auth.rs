use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub jti: String, // JWT ID (unique per token)
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
    pub iss: String, // Issuer
}

/// Issues and verifies the HS256 token pairs used by the REST API.
///
/// Access tokens are short-lived (hours); refresh tokens are long-lived
/// (days) and tracked in Redis so they can be revoked on logout.
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl_hours: i64,
    refresh_token_ttl_days: i64,
    issuer: String,
}

impl AuthManager {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_token_ttl_hours: config.access_token_ttl_hours,
            refresh_token_ttl_days: config.refresh_token_ttl_days,
            issuer: config.jwt_issuer.clone(),
        }
    }

    /// Create access token (short-lived, for the REST API).
    /// Returns (token, jti, expires_at).
    pub fn create_token(&self, user_id: &Uuid) -> Result<(String, String, i64)> {
        self.create_with_ttl(user_id, Duration::hours(self.access_token_ttl_hours))
    }

    /// Create refresh token (long-lived, revocable via the session store).
    /// Returns (token, jti, expires_at).
    pub fn create_refresh_token(&self, user_id: &Uuid) -> Result<(String, String, i64)> {
        self.create_with_ttl(user_id, Duration::days(self.refresh_token_ttl_days))
    }

    fn create_with_ttl(&self, user_id: &Uuid, ttl: Duration) -> Result<(String, String, i64)> {
        let now = Utc::now();
        let exp = now + ttl;
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: user_id.to_string(),
            jti: jti.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to encode JWT token")?;

        Ok((token, jti, exp.timestamp()))
    }

    /// Verify signature, expiration, and issuer; returns the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.clone()]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Token verification failed")?;

        Ok(token_data.claims)
    }

    /// Access token TTL in seconds, used when denylisting a jti on logout.
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_hours * crate::config::SECONDS_PER_HOUR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager() -> AuthManager {
        AuthManager::new(&AuthConfig {
            jwt_secret: "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6".to_string(),
            jwt_issuer: "nutrack-test".to_string(),
            access_token_ttl_hours: 1,
            refresh_token_ttl_days: 30,
        })
    }

    #[test]
    fn test_token_round_trip() {
        let manager = test_manager();
        let user_id = Uuid::new_v4();

        let (token, jti, expires_at) = manager.create_token(&user_id).unwrap();
        assert!(!token.is_empty());
        assert!(expires_at > Utc::now().timestamp());

        let claims = manager.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.jti, jti);
        assert_eq!(claims.iss, "nutrack-test");
    }

    #[test]
    fn test_access_and_refresh_tokens_have_distinct_jtis() {
        let manager = test_manager();
        let user_id = Uuid::new_v4();

        let (_, access_jti, access_exp) = manager.create_token(&user_id).unwrap();
        let (_, refresh_jti, refresh_exp) = manager.create_refresh_token(&user_id).unwrap();

        assert_ne!(access_jti, refresh_jti);
        assert!(refresh_exp > access_exp);
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = test_manager();
        let user_id = Uuid::new_v4();

        // Token that expired an hour ago, signed with the same secret
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now - Duration::hours(1)).timestamp(),
            iat: (now - Duration::hours(2)).timestamp(),
            iss: "nutrack-test".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6".as_bytes()),
        )
        .unwrap();

        assert!(manager.verify_token(&token).is_err());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let manager = test_manager();
        let other = AuthManager::new(&AuthConfig {
            jwt_secret: "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6".to_string(),
            jwt_issuer: "someone-else".to_string(),
            access_token_ttl_hours: 1,
            refresh_token_ttl_days: 30,
        });

        let (token, _, _) = other.create_token(&Uuid::new_v4()).unwrap();
        assert!(manager.verify_token(&token).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let manager = test_manager();
        let (token, _, _) = manager.create_token(&Uuid::new_v4()).unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('a') { 'b' } else { 'a' });

        assert!(manager.verify_token(&tampered).is_err());
    }
}
