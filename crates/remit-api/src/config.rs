//! Server configuration.

use serde::{Deserialize, Serialize};

use remit_core::{Error, Result};

/// Payment provider credentials and secrets.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// Provider API base URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Public key identifier handed to checkout clients.
    #[serde(default)]
    pub key_id: Option<String>,
    /// Secret used for order creation auth and payment-signature checks.
    #[serde(default)]
    pub key_secret: Option<String>,
    /// Separate secret for webhook body signatures.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &self.url)
            .field("key_id", &self.key_id)
            .field("key_secret", &self.key_secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl ProviderConfig {
    /// Returns true when order creation can go through the provider.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.key_id.is_some() && self.key_secret.is_some()
    }
}

/// Transactional mail service settings.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct MailConfig {
    /// Mail service API base URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Mail service API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// From address for outbound mail.
    #[serde(default = "default_email_from")]
    pub from: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("from", &self.from)
            .finish()
    }
}

fn default_email_from() -> String {
    "onboarding@remit.dev".to_string()
}

impl MailConfig {
    /// Returns true when outbound mail can actually be delivered.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some()
    }
}

/// CORS configuration for browser-based access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. Use `["*"]` to allow all origins (development only).
    /// Empty list disables CORS entirely.
    pub allowed_origins: Vec<String>,
    /// Max age for preflight cache (seconds).
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
        }
    }
}

/// Configuration for the Remit API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Enable debug mode.
    ///
    /// When enabled, request identity comes from `X-User-Id` /
    /// `X-User-Email` headers (dev/tests). When disabled, a verified
    /// JWT bearer token is required.
    pub debug: bool,

    /// HS256 secret used to verify bearer tokens (required when `debug`
    /// is false).
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Payment provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Mail service settings.
    #[serde(default)]
    pub mail: MailConfig,

    /// Admin email addresses; the first entry receives notifications and
    /// the daily digest, and all entries pass the admin check.
    #[serde(default)]
    pub admin_emails: Vec<String>,

    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,

    /// UTC hour the daily digest fires.
    #[serde(default = "default_digest_hour")]
    pub digest_hour_utc: u32,

    /// UTC minute the daily digest fires.
    #[serde(default)]
    pub digest_minute_utc: u32,

    /// Bound on queued background dispatch jobs.
    #[serde(default = "default_dispatch_queue_depth")]
    pub dispatch_queue_depth: usize,
}

fn default_digest_hour() -> u32 {
    3
}

fn default_dispatch_queue_depth() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: false,
            jwt_secret: None,
            provider: ProviderConfig::default(),
            mail: MailConfig::default(),
            admin_emails: Vec::new(),
            cors: CorsConfig::default(),
            digest_hour_utc: default_digest_hour(),
            digest_minute_utc: 0,
            dispatch_queue_depth: default_dispatch_queue_depth(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `REMIT_HTTP_PORT`
    /// - `REMIT_DEBUG`
    /// - `REMIT_JWT_SECRET`
    /// - `REMIT_PROVIDER_URL`
    /// - `REMIT_PROVIDER_KEY_ID`
    /// - `REMIT_PROVIDER_KEY_SECRET`
    /// - `REMIT_PROVIDER_WEBHOOK_SECRET`
    /// - `REMIT_MAIL_URL`
    /// - `REMIT_MAIL_API_KEY`
    /// - `REMIT_EMAIL_FROM`
    /// - `REMIT_ADMIN_EMAILS` (comma-separated; first is primary)
    /// - `REMIT_CORS_ALLOWED_ORIGINS` (comma-separated, or `*`)
    /// - `REMIT_CORS_MAX_AGE_SECONDS`
    /// - `REMIT_DIGEST_HOUR_UTC` / `REMIT_DIGEST_MINUTE_UTC`
    /// - `REMIT_DISPATCH_QUEUE_DEPTH`
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("REMIT_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env_bool("REMIT_DEBUG")? {
            config.debug = debug;
        }
        config.jwt_secret = env_string("REMIT_JWT_SECRET");

        config.provider.url = env_string("REMIT_PROVIDER_URL");
        config.provider.key_id = env_string("REMIT_PROVIDER_KEY_ID");
        config.provider.key_secret = env_string("REMIT_PROVIDER_KEY_SECRET");
        config.provider.webhook_secret = env_string("REMIT_PROVIDER_WEBHOOK_SECRET");

        config.mail.url = env_string("REMIT_MAIL_URL");
        config.mail.api_key = env_string("REMIT_MAIL_API_KEY");
        if let Some(from) = env_string("REMIT_EMAIL_FROM") {
            config.mail.from = from;
        }

        if let Some(admins) = env_string("REMIT_ADMIN_EMAILS") {
            config.admin_emails = parse_list(&admins);
        }
        if let Some(origins) = env_string("REMIT_CORS_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = parse_list(&origins);
        }
        if let Some(max_age) = env_u64("REMIT_CORS_MAX_AGE_SECONDS")? {
            config.cors.max_age_seconds = max_age;
        }

        if let Some(hour) = env_u32("REMIT_DIGEST_HOUR_UTC")? {
            if hour > 23 {
                return Err(Error::InvalidInput(
                    "REMIT_DIGEST_HOUR_UTC must be 0-23".to_string(),
                ));
            }
            config.digest_hour_utc = hour;
        }
        if let Some(minute) = env_u32("REMIT_DIGEST_MINUTE_UTC")? {
            if minute > 59 {
                return Err(Error::InvalidInput(
                    "REMIT_DIGEST_MINUTE_UTC must be 0-59".to_string(),
                ));
            }
            config.digest_minute_utc = minute;
        }
        if let Some(depth) = env_u64("REMIT_DISPATCH_QUEUE_DEPTH")? {
            if depth == 0 {
                return Err(Error::InvalidInput(
                    "REMIT_DISPATCH_QUEUE_DEPTH must be greater than 0".to_string(),
                ));
            }
            config.dispatch_queue_depth = usize::try_from(depth).unwrap_or(usize::MAX);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid combinations.
    pub fn validate(&self) -> Result<()> {
        if !self.debug && self.jwt_secret.is_none() {
            return Err(Error::InvalidInput(
                "REMIT_JWT_SECRET is required when REMIT_DEBUG=false".to_string(),
            ));
        }
        if !self.debug
            && self
                .cors
                .allowed_origins
                .iter()
                .any(|origin| origin == "*")
        {
            return Err(Error::InvalidInput(
                "cors.allowed_origins cannot include '*' when debug=false".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the primary admin email (digest and notification recipient).
    #[must_use]
    pub fn primary_admin_email(&self) -> Option<&str> {
        self.admin_emails.first().map(String::as_str)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
}

fn env_u32(name: &str) -> Result<Option<u32>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u32>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u32: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(Some(true)),
        "false" | "0" | "no" | "n" => Ok(Some(false)),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug_config() -> Config {
        Config {
            debug: true,
            ..Config::default()
        }
    }

    #[test]
    fn production_requires_jwt_secret() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let config = Config {
            jwt_secret: Some("secret".into()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_rejects_wildcard_cors() {
        let config = Config {
            jwt_secret: Some("secret".into()),
            cors: CorsConfig {
                allowed_origins: vec!["*".into()],
                max_age_seconds: 60,
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_mode_needs_no_secret() {
        assert!(debug_config().validate().is_ok());
    }

    #[test]
    fn provider_configured_requires_all_fields() {
        let mut provider = ProviderConfig::default();
        assert!(!provider.is_configured());
        provider.url = Some("https://provider.test".into());
        provider.key_id = Some("key".into());
        assert!(!provider.is_configured());
        provider.key_secret = Some("secret".into());
        assert!(provider.is_configured());
    }

    #[test]
    fn primary_admin_is_first_entry() {
        let config = Config {
            admin_emails: vec!["a@example.com".into(), "b@example.com".into()],
            ..debug_config()
        };
        assert_eq!(config.primary_admin_email(), Some("a@example.com"));
    }

    #[test]
    fn parse_list_trims_and_drops_empties() {
        assert_eq!(
            parse_list(" a@x.com , ,b@x.com,"),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let config = Config {
            provider: ProviderConfig {
                key_secret: Some("super-secret".into()),
                webhook_secret: Some("hook-secret".into()),
                ..ProviderConfig::default()
            },
            mail: MailConfig {
                api_key: Some("mail-secret".into()),
                ..MailConfig::default()
            },
            ..debug_config()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hook-secret"));
        assert!(!rendered.contains("mail-secret"));
    }
}
