use anyhow::Result;

// ============================================================================
// Configuration Constants
// ============================================================================

const DEFAULT_PORT: u16 = 8080;

// Default token lifetimes
const DEFAULT_ACCESS_TOKEN_TTL_HOURS: i64 = 1;
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

// Default upstream AI settings
const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_AI_REQUEST_TIMEOUT_SECS: u64 = 30;

// Default security policies
const DEFAULT_MAX_FAILED_LOGIN_ATTEMPTS: u32 = 5;
const DEFAULT_MAX_OTP_SENDS_PER_HOUR: u32 = 5;
const DEFAULT_RECOMMENDATION_CACHE_DAYS: i64 = 7;

// Time conversion constants
pub const SECONDS_PER_HOUR: i64 = 3600;
pub const SECONDS_PER_DAY: i64 = 86400;

/// OTP codes are short-lived
pub const OTP_TTL_SECONDS: u64 = 300;

// ============================================================================
// Configuration Structures
// ============================================================================

/// JWT issuance and verification settings
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Symmetric signing secret (HS256), at least 32 chars of real entropy
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// Access token TTL in hours (short-lived, for the REST API)
    pub access_token_ttl_hours: i64,
    /// Refresh token TTL in days
    pub refresh_token_ttl_days: i64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Salt for hashed identifiers in log lines
    pub hash_salt: String,
}

/// Rate limiting and cache policies
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    pub max_failed_login_attempts: u32,
    pub max_otp_sends_per_hour: u32,
    /// How long a stored meal recommendation stays valid
    pub recommendation_cache_days: i64,
}

/// Upstream chat-completion endpoint configuration
#[derive(Clone, Debug)]
pub struct AiConfig {
    /// API key; recommendations are unavailable when unset
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// Completion model name
    pub model: String,
    pub request_timeout_secs: u64,
}

/// Twilio SMS gateway configuration
#[derive(Clone, Debug)]
pub struct SmsConfig {
    /// True when all three Twilio credentials are present
    pub enabled: bool,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    /// Debug mode echoes OTP codes in responses instead of sending SMS
    pub debug: bool,
    pub allowed_hosts: Vec<String>,
    pub rust_log: String,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub ai: AiConfig,
    pub sms: SmsConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL")?,
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            debug: std::env::var("DEBUG")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            allowed_hosts: std::env::var("ALLOWED_HOSTS")
                .unwrap_or_default()
                .split(',')
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            auth: AuthConfig {
                jwt_secret: {
                    let secret = std::env::var("JWT_SECRET")?;
                    if secret.len() < 32 {
                        anyhow::bail!("JWT_SECRET must be at least 32 characters long");
                    }
                    if let Err(e) = crate::utils::validate_secret_strength(&secret, 32) {
                        anyhow::bail!(
                            "JWT_SECRET is too weak: {}. Please use a random secret generated with: openssl rand -base64 32",
                            e
                        );
                    }
                    secret
                },
                jwt_issuer: std::env::var("JWT_ISSUER")
                    .unwrap_or_else(|_| "nutrack-server".to_string()),
                access_token_ttl_hours: std::env::var("ACCESS_TOKEN_TTL_HOURS")
                    .ok()
                    .and_then(|h| h.parse().ok())
                    .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_HOURS),
                refresh_token_ttl_days: std::env::var("REFRESH_TOKEN_TTL_DAYS")
                    .ok()
                    .and_then(|d| d.parse().ok())
                    .unwrap_or(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            },
            logging: LoggingConfig {
                hash_salt: {
                    let salt = std::env::var("LOG_HASH_SALT")
                        .unwrap_or_else(|_| "default-salt-please-change".to_string());
                    if salt.is_empty() || salt == "default-salt-please-change" {
                        anyhow::bail!("LOG_HASH_SALT must be set to a unique, secret value");
                    }
                    salt
                },
            },
            security: SecurityConfig {
                max_failed_login_attempts: std::env::var("MAX_FAILED_LOGIN_ATTEMPTS")
                    .ok()
                    .and_then(|f| f.parse().ok())
                    .unwrap_or(DEFAULT_MAX_FAILED_LOGIN_ATTEMPTS),
                max_otp_sends_per_hour: std::env::var("MAX_OTP_SENDS_PER_HOUR")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_OTP_SENDS_PER_HOUR),
                recommendation_cache_days: std::env::var("RECOMMENDATION_CACHE_DAYS")
                    .ok()
                    .and_then(|d| d.parse().ok())
                    .unwrap_or(DEFAULT_RECOMMENDATION_CACHE_DAYS),
            },
            ai: AiConfig {
                api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
                base_url: std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_AI_BASE_URL.to_string()),
                model: std::env::var("OPENAI_MODEL_NAME")
                    .unwrap_or_else(|_| DEFAULT_AI_MODEL.to_string()),
                request_timeout_secs: std::env::var("AI_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_AI_REQUEST_TIMEOUT_SECS),
            },
            sms: {
                let account_sid = std::env::var("TWILIO_ACCOUNT_SID").unwrap_or_default();
                let auth_token = std::env::var("TWILIO_AUTH_TOKEN").unwrap_or_default();
                let from_number = std::env::var("TWILIO_FROM_NUMBER").unwrap_or_default();
                SmsConfig {
                    enabled: !account_sid.is_empty()
                        && !auth_token.is_empty()
                        && !from_number.is_empty(),
                    account_sid,
                    auth_token,
                    from_number,
                }
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const TEST_SECRET: &str = "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6";

    fn set_required_env() {
        std::env::set_var("DATABASE_URL", "postgres://nutrack:pw@localhost/nutrack");
        std::env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        std::env::set_var("JWT_SECRET", TEST_SECRET);
        std::env::set_var("LOG_HASH_SALT", "test-salt-for-config-tests");
    }

    #[test]
    #[serial]
    fn test_defaults_applied() {
        set_required_env();
        std::env::remove_var("PORT");
        std::env::remove_var("ACCESS_TOKEN_TTL_HOURS");
        std::env::remove_var("OPENAI_BASE_URL");

        let config = Config::from_env().expect("config should load");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.auth.access_token_ttl_hours, 1);
        assert_eq!(config.auth.refresh_token_ttl_days, 30);
        assert_eq!(config.ai.base_url, DEFAULT_AI_BASE_URL);
        assert_eq!(config.security.recommendation_cache_days, 7);
    }

    #[test]
    #[serial]
    fn test_weak_jwt_secret_rejected() {
        set_required_env();
        std::env::set_var("JWT_SECRET", "short");
        assert!(Config::from_env().is_err());

        std::env::set_var("JWT_SECRET", &"ab".repeat(16));
        assert!(Config::from_env().is_err());

        std::env::set_var("JWT_SECRET", TEST_SECRET);
    }

    #[test]
    #[serial]
    fn test_sms_enabled_requires_all_credentials() {
        set_required_env();
        std::env::set_var("TWILIO_ACCOUNT_SID", "AC123");
        std::env::set_var("TWILIO_AUTH_TOKEN", "token");
        std::env::remove_var("TWILIO_FROM_NUMBER");

        let config = Config::from_env().expect("config should load");
        assert!(!config.sms.enabled);

        std::env::set_var("TWILIO_FROM_NUMBER", "+15550001111");
        let config = Config::from_env().expect("config should load");
        assert!(config.sms.enabled);

        std::env::remove_var("TWILIO_ACCOUNT_SID");
        std::env::remove_var("TWILIO_AUTH_TOKEN");
        std::env::remove_var("TWILIO_FROM_NUMBER");
    }

    #[test]
    #[serial]
    fn test_allowed_hosts_parsed() {
        set_required_env();
        std::env::set_var("ALLOWED_HOSTS", "api.nutrack.app, localhost");
        let config = Config::from_env().expect("config should load");
        assert_eq!(config.allowed_hosts, vec!["api.nutrack.app", "localhost"]);
        std::env::remove_var("ALLOWED_HOSTS");
    }
}
