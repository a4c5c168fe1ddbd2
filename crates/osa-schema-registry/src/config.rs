//! Schema registry connection configuration.

use std::env;

use crate::error::RegistryError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Basic-auth credentials for the registry service.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Connection settings for the registry service.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL of the registry, without trailing slash.
    pub base_url: String,
    /// Per-request read timeout in seconds.
    pub timeout_secs: u64,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Optional basic auth.
    pub auth: Option<BasicAuth>,
}

impl RegistryConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `OSA_SCHEMA_REGISTRY_URL`
    ///
    /// Optional:
    /// - `OSA_SCHEMA_REGISTRY_TIMEOUT_SECS` (default: 30)
    /// - `OSA_SCHEMA_REGISTRY_USERNAME` / `OSA_SCHEMA_REGISTRY_PASSWORD`
    pub fn from_env() -> Result<Self, RegistryError> {
        let base_url =
            env::var("OSA_SCHEMA_REGISTRY_URL").map_err(|_| RegistryError::ConfigMissing {
                var: "OSA_SCHEMA_REGISTRY_URL".to_string(),
            })?;

        let timeout_secs = match env::var("OSA_SCHEMA_REGISTRY_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| RegistryError::ConfigInvalid {
                var: "OSA_SCHEMA_REGISTRY_TIMEOUT_SECS".to_string(),
                reason: format!("not a valid integer: {raw}"),
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let auth = match (
            env::var("OSA_SCHEMA_REGISTRY_USERNAME"),
            env::var("OSA_SCHEMA_REGISTRY_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(BasicAuth { username, password }),
            (Ok(_), Err(_)) => {
                return Err(RegistryError::ConfigMissing {
                    var: "OSA_SCHEMA_REGISTRY_PASSWORD".to_string(),
                })
            }
            _ => None,
        };

        Self::builder()
            .base_url(base_url)
            .timeout_secs(timeout_secs)
            .maybe_auth(auth)
            .build()
    }

    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::default()
    }
}

/// Builder for [`RegistryConfig`].
#[derive(Debug, Default)]
pub struct RegistryConfigBuilder {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    auth: Option<BasicAuth>,
}

impl RegistryConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    #[must_use]
    fn maybe_auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.auth = auth;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<RegistryConfig, RegistryError> {
        let base_url = self.base_url.ok_or(RegistryError::ConfigMissing {
            var: "base_url".to_string(),
        })?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RegistryError::ConfigInvalid {
                var: "base_url".to_string(),
                reason: format!("not an http(s) URL: {base_url}"),
            });
        }

        Ok(RegistryConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            connect_timeout_secs: self
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            auth: self.auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = RegistryConfig::builder()
            .base_url("http://localhost:8081")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:8081");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_builder_strips_trailing_slash() {
        let config = RegistryConfig::builder()
            .base_url("http://registry:8081/")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://registry:8081");
    }

    #[test]
    fn test_builder_missing_url() {
        let result = RegistryConfig::builder().build();
        assert!(matches!(
            result,
            Err(RegistryError::ConfigMissing { var }) if var == "base_url"
        ));
    }

    #[test]
    fn test_builder_rejects_non_http_url() {
        let result = RegistryConfig::builder().base_url("registry:8081").build();
        assert!(matches!(result, Err(RegistryError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_builder_with_auth() {
        let config = RegistryConfig::builder()
            .base_url("https://registry.example.com")
            .basic_auth("svc-osa", "hunter2")
            .build()
            .unwrap();
        let auth = config.auth.unwrap();
        assert_eq!(auth.username, "svc-osa");
        assert_eq!(auth.password, "hunter2");
    }
}
