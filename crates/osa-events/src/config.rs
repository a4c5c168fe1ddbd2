//! Configuration for the event-reliability core.

use std::env;

use crate::error::EventError;
use crate::idempotency::{DEFAULT_KEY_PREFIX, DEFAULT_TTL_SECS};
use crate::signature::DEFAULT_MAX_AGE_MS;

/// Minimum accepted webhook secret length, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Settings for the signing codec and idempotency ledger.
#[derive(Debug, Clone)]
pub struct EventsConfig {
    /// Shared HMAC secret for webhook signing.
    pub webhook_secret: String,
    /// Connection URL for the TTL-backed key-value store.
    pub redis_url: String,
    /// Key prefix for idempotency records.
    pub idempotency_prefix: String,
    /// Default idempotency record TTL in seconds.
    pub idempotency_ttl_secs: u64,
    /// Signature replay window in milliseconds.
    pub signature_max_age_ms: i64,
}

impl EventsConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `OSA_WEBHOOK_SECRET`: HMAC secret, at least 32 bytes
    /// - `OSA_REDIS_URL`: key-value store connection URL
    ///
    /// Optional:
    /// - `OSA_IDEMPOTENCY_PREFIX` (default: "osa:events:processed")
    /// - `OSA_IDEMPOTENCY_TTL_SECS` (default: 86400)
    /// - `OSA_SIGNATURE_MAX_AGE_MS` (default: 600000)
    pub fn from_env() -> Result<Self, EventError> {
        let webhook_secret =
            env::var("OSA_WEBHOOK_SECRET").map_err(|_| EventError::ConfigMissing {
                var: "OSA_WEBHOOK_SECRET".to_string(),
            })?;

        let redis_url = env::var("OSA_REDIS_URL").map_err(|_| EventError::ConfigMissing {
            var: "OSA_REDIS_URL".to_string(),
        })?;

        let idempotency_prefix = env::var("OSA_IDEMPOTENCY_PREFIX")
            .unwrap_or_else(|_| DEFAULT_KEY_PREFIX.to_string());

        let idempotency_ttl_secs = match env::var("OSA_IDEMPOTENCY_TTL_SECS") {
            Ok(raw) => raw.parse().map_err(|_| EventError::ConfigInvalid {
                var: "OSA_IDEMPOTENCY_TTL_SECS".to_string(),
                reason: format!("not a valid integer: {raw}"),
            })?,
            Err(_) => DEFAULT_TTL_SECS,
        };

        let signature_max_age_ms = match env::var("OSA_SIGNATURE_MAX_AGE_MS") {
            Ok(raw) => raw.parse().map_err(|_| EventError::ConfigInvalid {
                var: "OSA_SIGNATURE_MAX_AGE_MS".to_string(),
                reason: format!("not a valid integer: {raw}"),
            })?,
            Err(_) => DEFAULT_MAX_AGE_MS,
        };

        Self::builder()
            .webhook_secret(webhook_secret)
            .redis_url(redis_url)
            .idempotency_prefix(idempotency_prefix)
            .idempotency_ttl_secs(idempotency_ttl_secs)
            .signature_max_age_ms(signature_max_age_ms)
            .build()
    }

    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EventsConfigBuilder {
        EventsConfigBuilder::default()
    }
}

/// Builder for [`EventsConfig`].
#[derive(Debug, Default)]
pub struct EventsConfigBuilder {
    webhook_secret: Option<String>,
    redis_url: Option<String>,
    idempotency_prefix: Option<String>,
    idempotency_ttl_secs: Option<u64>,
    signature_max_age_ms: Option<i64>,
}

impl EventsConfigBuilder {
    pub fn webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    pub fn idempotency_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.idempotency_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn idempotency_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.idempotency_ttl_secs = Some(ttl_secs);
        self
    }

    #[must_use]
    pub fn signature_max_age_ms(mut self, max_age_ms: i64) -> Self {
        self.signature_max_age_ms = Some(max_age_ms);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<EventsConfig, EventError> {
        let webhook_secret = self.webhook_secret.ok_or(EventError::ConfigMissing {
            var: "webhook_secret".to_string(),
        })?;
        if webhook_secret.len() < MIN_SECRET_LEN {
            return Err(EventError::ConfigInvalid {
                var: "webhook_secret".to_string(),
                reason: format!(
                    "must be at least {MIN_SECRET_LEN} bytes, got {}",
                    webhook_secret.len()
                ),
            });
        }

        let redis_url = self.redis_url.ok_or(EventError::ConfigMissing {
            var: "redis_url".to_string(),
        })?;

        let signature_max_age_ms = self.signature_max_age_ms.unwrap_or(DEFAULT_MAX_AGE_MS);
        if signature_max_age_ms <= 0 {
            return Err(EventError::ConfigInvalid {
                var: "signature_max_age_ms".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(EventsConfig {
            webhook_secret,
            redis_url,
            idempotency_prefix: self
                .idempotency_prefix
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            idempotency_ttl_secs: self.idempotency_ttl_secs.unwrap_or(DEFAULT_TTL_SECS),
            signature_max_age_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "a-32-plus-character-test-secret-value";

    #[test]
    fn test_builder_defaults() {
        let config = EventsConfig::builder()
            .webhook_secret(SECRET)
            .redis_url("redis://127.0.0.1/")
            .build()
            .unwrap();

        assert_eq!(config.idempotency_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(config.idempotency_ttl_secs, DEFAULT_TTL_SECS);
        assert_eq!(config.signature_max_age_ms, DEFAULT_MAX_AGE_MS);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EventsConfig::builder()
            .webhook_secret(SECRET)
            .redis_url("redis://127.0.0.1/")
            .idempotency_prefix("custom:prefix")
            .idempotency_ttl_secs(3_600)
            .signature_max_age_ms(120_000)
            .build()
            .unwrap();

        assert_eq!(config.idempotency_prefix, "custom:prefix");
        assert_eq!(config.idempotency_ttl_secs, 3_600);
        assert_eq!(config.signature_max_age_ms, 120_000);
    }

    #[test]
    fn test_builder_missing_secret() {
        let result = EventsConfig::builder().redis_url("redis://x/").build();
        assert!(matches!(
            result,
            Err(EventError::ConfigMissing { var }) if var == "webhook_secret"
        ));
    }

    #[test]
    fn test_builder_short_secret_rejected() {
        let result = EventsConfig::builder()
            .webhook_secret("too-short")
            .redis_url("redis://x/")
            .build();
        assert!(matches!(
            result,
            Err(EventError::ConfigInvalid { var, .. }) if var == "webhook_secret"
        ));
    }

    #[test]
    fn test_builder_missing_redis_url() {
        let result = EventsConfig::builder().webhook_secret(SECRET).build();
        assert!(matches!(
            result,
            Err(EventError::ConfigMissing { var }) if var == "redis_url"
        ));
    }

    #[test]
    fn test_builder_rejects_nonpositive_max_age() {
        let result = EventsConfig::builder()
            .webhook_secret(SECRET)
            .redis_url("redis://x/")
            .signature_max_age_ms(0)
            .build();
        assert!(matches!(result, Err(EventError::ConfigInvalid { .. })));
    }
}
