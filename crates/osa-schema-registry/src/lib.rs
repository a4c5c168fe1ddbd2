//! Versioned wire-schema registry client for OSA event payloads.
//!
//! Producers and consumers of framed event payloads share schemas through
//! a central registry service. This crate provides:
//!
//! - [`SchemaRegistryClient`]: register, evolve, and resolve schemas over
//!   the registry's REST API, with in-process caching of immutable records
//! - Wire framing ([`frame`], [`parse_frame`]) plus client-level
//!   [`encode`](SchemaRegistryClient::encode) /
//!   [`decode`](SchemaRegistryClient::decode) for self-describing messages
//! - [`register_all_from_dir`]: bulk registration of checked-in schema
//!   definitions at deploy time
//!
//! # Example
//!
//! ```ignore
//! use osa_schema_registry::{RegistryConfig, SchemaRegistryClient, SchemaType};
//!
//! let config = RegistryConfig::from_env()?;
//! let client = SchemaRegistryClient::new(config)?;
//!
//! let registered = client
//!     .register("workflow.started-value", schema_json, SchemaType::Avro)
//!     .await?;
//!
//! let framed = client
//!     .encode("workflow.started-value", &payload)
//!     .await?;
//! let decoded = client.decode(&framed).await?;
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod loader;
pub mod types;

pub use client::SchemaRegistryClient;
pub use codec::{frame, parse_frame, DecodedMessage, WIRE_FORMAT_MAGIC, WIRE_HEADER_LEN};
pub use config::{BasicAuth, RegistryConfig, RegistryConfigBuilder};
pub use error::RegistryError;
pub use loader::{register_all_from_dir, BulkRegistration};
pub use types::{
    value_subject, CompatibilityReport, RegisteredSchema, SchemaRecord, SchemaType,
};
