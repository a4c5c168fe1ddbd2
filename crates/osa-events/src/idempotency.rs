//! Idempotency ledger turning at-least-once delivery into effectively-once
//! processing.
//!
//! "Processed" is defined purely by key existence in the TTL-backed store;
//! the store's own expiry is the sole cleanup path in the hot path. Reads
//! fail open (a store outage must not block all event processing), writes
//! fail closed (losing the "done" record reintroduces duplicates).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::EventError;
use crate::health::{HealthState, LedgerHealth};
use crate::store::KeyValueStore;

/// Default key prefix in the store.
pub const DEFAULT_KEY_PREFIX: &str = "osa:events:processed";

/// Default record TTL: 24 hours.
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Proof that an event id was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Caller-supplied id correlating to one logical event.
    pub event_id: String,

    /// When the event was first successfully processed.
    pub processed_at: DateTime<Utc>,

    /// Provenance metadata for audit and debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Optional provenance attached when marking an event processed.
#[derive(Debug, Clone, Default)]
pub struct EventMetadata {
    pub correlation_id: Option<String>,
    pub source: Option<String>,
}

/// Summary of an advisory expiry scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Live keys under the ledger prefix.
    pub scanned: usize,
    /// Keys unexpectedly lacking a TTL; a correctly configured store
    /// expires everything on its own.
    pub missing_ttl: Vec<String>,
}

/// Records which event ids have already been handled.
#[derive(Clone)]
pub struct IdempotencyLedger {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    default_ttl_secs: u64,
}

impl IdempotencyLedger {
    /// Create a ledger over the given store with default prefix and TTL.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    /// Override the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Override the default record TTL.
    #[must_use]
    pub fn with_default_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    fn key(&self, event_id: &str) -> String {
        format!("{}:{}", self.prefix, event_id)
    }

    /// Whether this event id has already been processed.
    ///
    /// Fails open: a store-level failure reads as "not yet processed" so a
    /// dedup-store outage degrades to at-least-once delivery instead of
    /// blocking all processing.
    #[instrument(skip(self))]
    pub async fn is_processed(&self, event_id: &str) -> bool {
        match self.store.exists(&self.key(event_id)).await {
            Ok(found) => {
                debug!(
                    target: "idempotency",
                    event_id,
                    already_processed = found,
                    "Idempotency check"
                );
                found
            }
            Err(e) => {
                warn!(
                    target: "idempotency",
                    event_id,
                    error = %e,
                    "Store check failed, treating event as unprocessed"
                );
                false
            }
        }
    }

    /// Record an event as processed with the default TTL.
    ///
    /// Store failures propagate: unlike a failed read, a lost write must be
    /// visible to the caller.
    pub async fn mark_processed(
        &self,
        event_id: &str,
        metadata: EventMetadata,
    ) -> Result<(), EventError> {
        self.mark_processed_with_ttl(event_id, self.default_ttl_secs, metadata)
            .await
    }

    /// Record an event as processed with an explicit TTL.
    #[instrument(skip(self, metadata))]
    pub async fn mark_processed_with_ttl(
        &self,
        event_id: &str,
        ttl_secs: u64,
        metadata: EventMetadata,
    ) -> Result<(), EventError> {
        let record = IdempotencyRecord {
            event_id: event_id.to_string(),
            processed_at: Utc::now(),
            correlation_id: metadata.correlation_id,
            source: metadata.source,
        };
        let value = serialize_record(&record)?;

        self.store
            .set_with_expiry(&self.key(event_id), value, ttl_secs)
            .await
            .map_err(|e| EventError::MarkFailed {
                event_id: event_id.to_string(),
                cause: e.to_string(),
            })?;

        debug!(target: "idempotency", event_id, ttl_secs, "Marked event processed");
        Ok(())
    }

    /// Batched idempotency check, one pipelined round trip.
    ///
    /// On batch failure everything conservatively reads unprocessed, same
    /// availability-over-strictness rationale as [`is_processed`].
    pub async fn are_processed(&self, event_ids: &[String]) -> HashMap<String, bool> {
        let keys: Vec<String> = event_ids.iter().map(|id| self.key(id)).collect();
        match self.store.exists_many(&keys).await {
            Ok(found) => event_ids
                .iter()
                .cloned()
                .zip(found.into_iter())
                .collect(),
            Err(e) => {
                warn!(
                    target: "idempotency",
                    batch_size = event_ids.len(),
                    error = %e,
                    "Batch check failed, treating all events as unprocessed"
                );
                event_ids.iter().map(|id| (id.clone(), false)).collect()
            }
        }
    }

    /// Batched mark, one pipelined round trip with the default TTL.
    /// Errors propagate.
    pub async fn mark_processed_batch(
        &self,
        events: &[(String, EventMetadata)],
    ) -> Result<(), EventError> {
        let processed_at = Utc::now();
        let mut entries = Vec::with_capacity(events.len());
        for (event_id, metadata) in events {
            let record = IdempotencyRecord {
                event_id: event_id.clone(),
                processed_at,
                correlation_id: metadata.correlation_id.clone(),
                source: metadata.source.clone(),
            };
            entries.push((
                self.key(event_id),
                serialize_record(&record)?,
                self.default_ttl_secs,
            ));
        }

        self.store.set_many_with_expiry(&entries).await?;
        debug!(target: "idempotency", batch_size = events.len(), "Marked batch processed");
        Ok(())
    }

    /// Fetch the full record for an event id, if a live one exists.
    pub async fn get_record(
        &self,
        event_id: &str,
    ) -> Result<Option<IdempotencyRecord>, EventError> {
        match self.store.get(&self.key(event_id)).await? {
            Some(raw) => {
                let record = serde_json::from_str(&raw).map_err(|e| {
                    EventError::SerializationFailed {
                        event_id: event_id.to_string(),
                        cause: e.to_string(),
                    }
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Delete the record for an event id, enabling manual replay.
    pub async fn delete_record(&self, event_id: &str) -> Result<bool, EventError> {
        let removed = self.store.delete(&self.key(event_id)).await?;
        if removed {
            info!(target: "idempotency", event_id, "Record deleted for manual replay");
        }
        Ok(removed)
    }

    /// Probe the store with a real write+read+delete round trip.
    ///
    /// Validates the store is actually serving requests, not merely
    /// connected.
    pub async fn health_check(&self) -> LedgerHealth {
        let probe_key = format!("{}:healthcheck:{}", self.prefix, Uuid::new_v4());
        let probe_value = "ok".to_string();
        let started = Instant::now();

        let outcome = async {
            self.store
                .set_with_expiry(&probe_key, probe_value.clone(), 60)
                .await?;
            let read = self.store.get(&probe_key).await?;
            self.store.delete(&probe_key).await?;
            Ok::<Option<String>, EventError>(read)
        }
        .await;

        let latency_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(Some(read)) if read == probe_value => LedgerHealth {
                state: HealthState::Healthy,
                details: "write+read+delete round trip succeeded".to_string(),
                latency_ms,
            },
            Ok(read) => LedgerHealth {
                state: HealthState::Degraded,
                details: format!("round trip read back {read:?} instead of probe value"),
                latency_ms,
            },
            Err(e) => LedgerHealth {
                state: HealthState::Unhealthy,
                details: e.to_string(),
                latency_ms,
            },
        }
    }

    /// Advisory scan for keys under the prefix that lack a TTL.
    ///
    /// The store's expiry is the sole cleanup path; this only surfaces
    /// misconfiguration and must never run in the hot path.
    pub async fn cleanup_expired_keys(&self) -> Result<CleanupReport, EventError> {
        let keys = self.store.keys(&format!("{}:*", self.prefix)).await?;
        let mut missing_ttl = Vec::new();
        for key in &keys {
            if self.store.ttl(key).await? == -1 {
                missing_ttl.push(key.clone());
            }
        }
        if !missing_ttl.is_empty() {
            warn!(
                target: "idempotency",
                count = missing_ttl.len(),
                "Found ledger keys without TTL"
            );
        }
        Ok(CleanupReport {
            scanned: keys.len(),
            missing_ttl,
        })
    }
}

fn serialize_record(record: &IdempotencyRecord) -> Result<String, EventError> {
    serde_json::to_string(record).map_err(|e| EventError::SerializationFailed {
        event_id: record.event_id.clone(),
        cause: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger() -> IdempotencyLedger {
        IdempotencyLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_mark_then_check() {
        let ledger = ledger();
        assert!(!ledger.is_processed("evt-1").await);

        ledger
            .mark_processed("evt-1", EventMetadata::default())
            .await
            .unwrap();

        assert!(ledger.is_processed("evt-1").await);
        // A second check before any second mark still reads true.
        assert!(ledger.is_processed("evt-1").await);
    }

    #[tokio::test]
    async fn test_record_carries_metadata() {
        let ledger = ledger();
        ledger
            .mark_processed(
                "evt-2",
                EventMetadata {
                    correlation_id: Some("corr-7".to_string()),
                    source: Some("opal".to_string()),
                },
            )
            .await
            .unwrap();

        let record = ledger.get_record("evt-2").await.unwrap().unwrap();
        assert_eq!(record.event_id, "evt-2");
        assert_eq!(record.correlation_id.as_deref(), Some("corr-7"));
        assert_eq!(record.source.as_deref(), Some("opal"));
    }

    #[tokio::test]
    async fn test_get_record_missing() {
        assert_eq!(ledger().get_record("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_enables_replay() {
        let ledger = ledger();
        ledger
            .mark_processed("evt-3", EventMetadata::default())
            .await
            .unwrap();
        assert!(ledger.is_processed("evt-3").await);

        assert!(ledger.delete_record("evt-3").await.unwrap());
        assert!(!ledger.is_processed("evt-3").await);
        assert!(!ledger.delete_record("evt-3").await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_round_trip() {
        let ledger = ledger();
        let events = vec![
            ("a".to_string(), EventMetadata::default()),
            ("b".to_string(), EventMetadata::default()),
        ];
        ledger.mark_processed_batch(&events).await.unwrap();

        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let checked = ledger.are_processed(&ids).await;
        assert_eq!(checked["a"], true);
        assert_eq!(checked["b"], true);
        assert_eq!(checked["c"], false);
    }

    #[tokio::test]
    async fn test_ttl_expiry_reads_unprocessed() {
        let ledger = ledger();
        ledger
            .mark_processed_with_ttl("short", 0, EventMetadata::default())
            .await
            .unwrap();
        assert!(!ledger.is_processed("short").await);
    }

    #[tokio::test]
    async fn test_custom_prefix_isolates_keys() {
        let store = Arc::new(MemoryStore::new());
        let a = IdempotencyLedger::new(store.clone()).with_prefix("ledger:a");
        let b = IdempotencyLedger::new(store).with_prefix("ledger:b");

        a.mark_processed("evt", EventMetadata::default())
            .await
            .unwrap();
        assert!(a.is_processed("evt").await);
        assert!(!b.is_processed("evt").await);
    }

    #[tokio::test]
    async fn test_health_check_healthy() {
        let health = ledger().health_check().await;
        assert!(health.is_healthy(), "{health:?}");
    }

    #[tokio::test]
    async fn test_cleanup_scan_counts_keys() {
        let ledger = ledger();
        ledger
            .mark_processed("evt-1", EventMetadata::default())
            .await
            .unwrap();
        ledger
            .mark_processed("evt-2", EventMetadata::default())
            .await
            .unwrap();

        let report = ledger.cleanup_expired_keys().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert!(report.missing_ttl.is_empty());
    }
}
