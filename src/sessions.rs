// ============================================================================
// Session Store - Redis-only Ephemeral State
// ============================================================================
//
// Everything here is ephemeral and carries a TTL:
// 1. Refresh-token registry  -> "refresh:{jti}" = user_id
//    A refresh token is usable only while its registry entry exists;
//    logout deletes the entry, which permanently blacklists the token.
// 2. Access-token denylist   -> "revoked:{jti}"
//    Set on logout so the short-lived access token dies with the session.
// 3. OTP codes               -> "otp:{mobile}", 5 minutes, single use.
// 4. Rate counters           -> "rate:login:{username}", "rate:otp:{mobile}"
//
// ============================================================================

use anyhow::Result;
use redis::{cmd, AsyncCommands, Client};

use crate::config::Config;

pub struct SessionStore {
    client: redis::aio::ConnectionManager,
}

impl SessionStore {
    pub async fn new(config: &Config) -> Result<Self> {
        tracing::debug!("Opening Redis client...");

        let client = Client::open(config.redis_url.clone())
            .map_err(|e| anyhow::anyhow!("Failed to parse Redis URL: {}", e))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;

        Ok(Self { client: conn })
    }

    pub async fn ping(&mut self) -> Result<()> {
        let _: () = cmd("PING").query_async(&mut self.client).await?;
        Ok(())
    }

    // ========================================================================
    // Refresh-token registry
    // ========================================================================

    pub async fn store_refresh_token(
        &mut self,
        jti: &str,
        user_id: &str,
        ttl_seconds: i64,
    ) -> Result<()> {
        let key = format!("refresh:{}", jti);
        let _: () = self
            .client
            .set_ex(&key, user_id, ttl_seconds as u64)
            .await?;

        let user_tokens_key = format!("user_refresh:{}", user_id);
        let _: () = self.client.sadd(&user_tokens_key, jti).await?;
        let _: () = self.client.expire(&user_tokens_key, ttl_seconds).await?;

        tracing::debug!(jti = %jti, "Stored refresh token");
        Ok(())
    }

    /// Returns the owning user id while the token is still valid.
    pub async fn check_refresh_token(&mut self, jti: &str) -> Result<Option<String>> {
        let key = format!("refresh:{}", jti);
        let user_id: Option<String> = self.client.get(&key).await?;
        Ok(user_id)
    }

    /// Deleting the registry entry permanently blacklists the token;
    /// revoking an already-revoked token is a no-op.
    pub async fn revoke_refresh_token(&mut self, jti: &str) -> Result<()> {
        let key = format!("refresh:{}", jti);
        let _: () = self.client.del(&key).await?;
        tracing::debug!(jti = %jti, "Revoked refresh token");
        Ok(())
    }

    pub async fn revoke_all_user_tokens(&mut self, user_id: &str) -> Result<()> {
        let user_tokens_key = format!("user_refresh:{}", user_id);
        let jtis: Vec<String> = self.client.smembers(&user_tokens_key).await?;
        for jti in &jtis {
            let key = format!("refresh:{}", jti);
            let _: () = self.client.del(&key).await?;
        }
        if !jtis.is_empty() {
            let _: () = self.client.del(&user_tokens_key).await?;
        }
        tracing::info!(count = jtis.len(), "Revoked all refresh tokens for user");
        Ok(())
    }

    // ========================================================================
    // Access-token denylist
    // ========================================================================

    pub async fn revoke_access_token(&mut self, jti: &str, ttl_seconds: i64) -> Result<()> {
        let key = format!("revoked:{}", jti);
        let _: () = self.client.set_ex(&key, "1", ttl_seconds as u64).await?;
        Ok(())
    }

    pub async fn is_access_token_revoked(&mut self, jti: &str) -> Result<bool> {
        let key = format!("revoked:{}", jti);
        let exists: bool = self.client.exists(&key).await?;
        Ok(exists)
    }

    // ========================================================================
    // OTP codes
    // ========================================================================

    pub async fn store_otp(&mut self, mobile: &str, code: &str, ttl_seconds: u64) -> Result<()> {
        let key = format!("otp:{}", mobile);
        let _: () = self.client.set_ex(&key, code, ttl_seconds).await?;
        Ok(())
    }

    /// Checks the code and consumes it on match (single use).
    pub async fn take_otp(&mut self, mobile: &str, code: &str) -> Result<bool> {
        let key = format!("otp:{}", mobile);
        let stored: Option<String> = self.client.get(&key).await?;

        match stored {
            Some(stored_code) if stored_code == code => {
                let _: () = self.client.del(&key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ========================================================================
    // Rate limiting
    // ========================================================================

    /// Increments the failed-login counter for a username.
    /// Returns the count within the 15-minute window.
    pub async fn increment_failed_login_count(&mut self, username: &str) -> Result<u32> {
        let key = format!("rate:login:{}", username);
        let count: u32 = self.client.incr(&key, 1).await?;
        if count == 1 {
            let _: () = self.client.expire(&key, 900).await?;
        }
        Ok(count)
    }

    pub async fn reset_failed_login_count(&mut self, username: &str) -> Result<()> {
        let key = format!("rate:login:{}", username);
        let _: () = self.client.del(&key).await?;
        Ok(())
    }

    /// Increments the OTP-send counter for a mobile number.
    /// Returns the count within the last hour.
    pub async fn increment_otp_send_count(&mut self, mobile: &str) -> Result<u32> {
        let key = format!("rate:otp:{}", mobile);
        let count: u32 = self.client.incr(&key, 1).await?;
        if count == 1 {
            let _: () = self.client.expire(&key, 3600).await?;
        }
        Ok(count)
    }
}
