//! # osa-events
//!
//! Event-reliability core for the OSA marketing-operations dashboard.
//!
//! Sits between the dashboard backend and the OPAL workflow engine and
//! makes event exchange safe to retry:
//!
//! - **Signing**: HMAC-SHA256 signatures over event payloads with a
//!   timestamp-bound replay window
//! - **Idempotency**: a TTL-backed ledger turning at-least-once delivery
//!   into effectively-once processing
//! - **Circuit breaking**: fail-fast protection for calls to unhealthy
//!   dependencies, one breaker per dependency name
//!
//! Components are constructed once at process startup and passed by handle
//! into request paths; none of them spawns background tasks.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use osa_events::{
//!     EventsConfig, IdempotencyLedger, RedisStore, SignatureCodec, EventMetadata,
//! };
//!
//! let config = EventsConfig::from_env()?;
//! let codec = SignatureCodec::new(config.webhook_secret.clone());
//! let store = Arc::new(RedisStore::new(&config.redis_url)?);
//! let ledger = IdempotencyLedger::new(store);
//!
//! // Inbound webhook: verify, dedup, handle, mark.
//! let result = codec.verify(body, &header.signature, Some(header.timestamp));
//! if result.is_valid && !ledger.is_processed(&event_id).await {
//!     handle_event(body).await?;
//!     ledger.mark_processed(&event_id, EventMetadata::default()).await?;
//! }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod envelope;
pub mod error;
pub mod health;
pub mod idempotency;
pub mod signature;
pub mod store;

pub use circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager,
    CircuitBreakerStats, CircuitState,
};
pub use config::{EventsConfig, EventsConfigBuilder};
pub use envelope::SignedEnvelope;
pub use error::EventError;
pub use health::{HealthState, LedgerHealth};
pub use idempotency::{CleanupReport, EventMetadata, IdempotencyLedger, IdempotencyRecord};
pub use signature::{
    format_header, parse_header, SignatureCodec, SignatureHeader, SignedPayload, Verification,
    VerifyFailure, SIGNATURE_HEADER,
};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
