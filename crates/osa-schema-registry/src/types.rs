//! Schema registry data types.

use serde::{Deserialize, Serialize};

/// Format family of a registered schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SchemaType {
    /// Structured-row format (Avro).
    #[default]
    #[serde(rename = "AVRO")]
    Avro,
    /// Protocol-buffer format.
    #[serde(rename = "PROTOBUF")]
    Protobuf,
}

impl SchemaType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avro => "AVRO",
            Self::Protobuf => "PROTOBUF",
        }
    }

    /// Schema definition file extension for bulk loading.
    #[must_use]
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Avro => "avsc",
            Self::Protobuf => "proto",
        }
    }
}

/// One registered version of a message schema.
///
/// Registry history is append-only: `(subject, version)` is unique with
/// versions contiguous from 1, and `id` is globally unique and never
/// reused. Records are never mutated or deleted in normal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    /// Logical stream name plus format family, e.g.
    /// "workflow.started-value".
    pub subject: String,

    /// Monotonically increasing per subject.
    pub version: u32,

    /// Global schema id, unique across all subjects.
    pub id: u32,

    /// Registries omit the type for the structured-row default.
    #[serde(rename = "schemaType", default)]
    pub schema_type: SchemaType,

    /// The schema definition itself.
    pub schema: String,
}

/// Outcome of registering a schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredSchema {
    pub id: u32,
    pub subject: String,
    pub version: u32,
}

/// Structured outcome of a compatibility check.
///
/// Incompatibility is an expected, actionable result of the call, not a
/// fault, so it is reported here rather than as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    #[serde(rename = "is_compatible")]
    pub is_compatible: bool,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Canonical subject name for a domain event's value schema:
/// `<domain>.<event>-value`.
#[must_use]
pub fn value_subject(domain: &str, event: &str) -> String {
    format!("{domain}.{event}-value")
}
