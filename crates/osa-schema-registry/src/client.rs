//! HTTP client for the schema registry service.
//!
//! Id and version assignment is always delegated to the registry, which
//! guarantees global monotonicity even under concurrent registration from
//! multiple processes; this client never invents version numbers locally.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::types::{CompatibilityReport, RegisteredSchema, SchemaRecord, SchemaType};

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: u32,
    version: u32,
}

/// Client for registering, evolving, and resolving versioned wire schemas.
///
/// Schemas are immutable once assigned an id, so resolved records are
/// cached in-process and decode never re-fetches per message.
pub struct SchemaRegistryClient {
    config: RegistryConfig,
    client: Client,
    by_id: Arc<RwLock<HashMap<u32, SchemaRecord>>>,
    latest_id_by_subject: Arc<RwLock<HashMap<String, u32>>>,
}

impl SchemaRegistryClient {
    /// Create a client for the configured registry.
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(RegistryError::Http)?;

        Ok(Self {
            config,
            client,
            by_id: Arc::new(RwLock::new(HashMap::new())),
            latest_id_by_subject: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            Some(auth) => builder.basic_auth(&auth.username, Some(&auth.password)),
            None => builder,
        }
    }

    /// Map a non-success response to a typed error, reading the body for
    /// the service's own message.
    async fn service_error(response: Response) -> RegistryError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        RegistryError::Service { status, message }
    }

    /// Register a schema version under a subject.
    ///
    /// Distinct content always yields a new version; re-registering
    /// byte-identical content is idempotent at the registry and returns the
    /// existing id.
    #[instrument(skip(self, schema))]
    pub async fn register(
        &self,
        subject: &str,
        schema: &str,
        schema_type: SchemaType,
    ) -> Result<RegisteredSchema, RegistryError> {
        let body = serde_json::json!({
            "schema": schema,
            "schemaType": schema_type.as_str(),
        });

        let response = self
            .apply_auth(
                self.client
                    .post(self.url(&format!("/subjects/{subject}/versions")))
                    .json(&body),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::service_error(response).await);
        }
        let registered: RegisterResponse = response.json().await?;

        let record = SchemaRecord {
            subject: subject.to_string(),
            version: registered.version,
            id: registered.id,
            schema_type,
            schema: schema.to_string(),
        };
        {
            let mut by_id = self.by_id.write().await;
            by_id.insert(registered.id, record);
        }
        {
            let mut latest = self.latest_id_by_subject.write().await;
            latest.insert(subject.to_string(), registered.id);
        }

        info!(
            target: "schema_registry",
            subject,
            id = registered.id,
            version = registered.version,
            "Schema registered"
        );
        Ok(RegisteredSchema {
            id: registered.id,
            subject: subject.to_string(),
            version: registered.version,
        })
    }

    /// Check a candidate schema against the subject's latest version.
    ///
    /// Callers are expected to gate registration on the report; the gate
    /// itself is deployment policy, not enforced here.
    #[instrument(skip(self, schema))]
    pub async fn check_compatibility(
        &self,
        subject: &str,
        schema: &str,
        schema_type: SchemaType,
    ) -> Result<CompatibilityReport, RegistryError> {
        let body = serde_json::json!({
            "schema": schema,
            "schemaType": schema_type.as_str(),
        });

        let response = self
            .apply_auth(
                self.client
                    .post(self.url(&format!(
                        "/compatibility/subjects/{subject}/versions/latest"
                    )))
                    .json(&body),
            )
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RegistryError::SubjectNotFound {
                subject: subject.to_string(),
            }),
            status if status.is_success() => {
                let report: CompatibilityReport = response.json().await?;
                debug!(
                    target: "schema_registry",
                    subject,
                    is_compatible = report.is_compatible,
                    "Compatibility check"
                );
                Ok(report)
            }
            _ => Err(Self::service_error(response).await),
        }
    }

    /// Resolve a schema by its global id, cache first.
    pub async fn get_schema_by_id(&self, id: u32) -> Result<SchemaRecord, RegistryError> {
        {
            let by_id = self.by_id.read().await;
            if let Some(record) = by_id.get(&id) {
                return Ok(record.clone());
            }
        }

        let response = self
            .apply_auth(self.client.get(self.url(&format!("/schemas/ids/{id}"))))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RegistryError::SchemaNotFound { id }),
            status if status.is_success() => {
                let record: SchemaRecord = response.json().await?;
                let mut by_id = self.by_id.write().await;
                by_id.insert(id, record.clone());
                Ok(record)
            }
            _ => Err(Self::service_error(response).await),
        }
    }

    /// Latest registered schema for a subject.
    pub async fn get_latest_schema(&self, subject: &str) -> Result<SchemaRecord, RegistryError> {
        {
            let latest = self.latest_id_by_subject.read().await;
            if let Some(id) = latest.get(subject) {
                let by_id = self.by_id.read().await;
                if let Some(record) = by_id.get(id) {
                    return Ok(record.clone());
                }
            }
        }

        let response = self
            .apply_auth(
                self.client
                    .get(self.url(&format!("/subjects/{subject}/versions/latest"))),
            )
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RegistryError::SubjectNotFound {
                subject: subject.to_string(),
            }),
            status if status.is_success() => {
                let record: SchemaRecord = response.json().await?;
                {
                    let mut by_id = self.by_id.write().await;
                    by_id.insert(record.id, record.clone());
                }
                {
                    let mut latest = self.latest_id_by_subject.write().await;
                    latest.insert(subject.to_string(), record.id);
                }
                Ok(record)
            }
            _ => Err(Self::service_error(response).await),
        }
    }

    /// All registered subjects.
    pub async fn list_subjects(&self) -> Result<Vec<String>, RegistryError> {
        let response = self
            .apply_auth(self.client.get(self.url("/subjects")))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::service_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Version history for a subject, contiguous from 1.
    pub async fn get_subject_versions(&self, subject: &str) -> Result<Vec<u32>, RegistryError> {
        let response = self
            .apply_auth(
                self.client
                    .get(self.url(&format!("/subjects/{subject}/versions"))),
            )
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RegistryError::SubjectNotFound {
                subject: subject.to_string(),
            }),
            status if status.is_success() => Ok(response.json().await?),
            _ => Err(Self::service_error(response).await),
        }
    }
}

impl std::fmt::Debug for SchemaRegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistryClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}
