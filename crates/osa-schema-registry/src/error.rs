//! Error types for the osa-schema-registry crate.

use thiserror::Error;

/// Errors that can occur talking to the schema registry or handling framed
/// payloads.
///
/// Registry failures always propagate: decoding with a wrong or missing
/// schema definition is a correctness bug, not a degraded-mode situation,
/// so there is no silent fallback anywhere in this crate.
#[derive(Debug, Error)]
pub enum RegistryError {
    // Configuration errors
    /// Required configuration variable is missing.
    #[error("Configuration missing: {var}")]
    ConfigMissing { var: String },

    /// Configuration value is invalid.
    #[error("Configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },

    // Transport errors
    /// The HTTP request itself failed.
    #[error("Registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered with a non-success status.
    #[error("Registry returned {status}: {message}")]
    Service { status: u16, message: String },

    // Lookup errors
    /// No schema registered under this global id.
    #[error("Schema id {id} not found")]
    SchemaNotFound { id: u32 },

    /// No versions registered under this subject.
    #[error("Subject '{subject}' not found")]
    SubjectNotFound { subject: String },

    // Wire-format errors
    /// A framed buffer could not be decoded.
    #[error("Invalid wire format: {reason}")]
    InvalidWireFormat { reason: String },

    /// Payload (de)serialization failed.
    #[error("Failed to serialize payload for subject '{subject}': {cause}")]
    SerializationFailed { subject: String, cause: String },
}

impl RegistryError {
    /// Returns true if this error is transient and can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Http(_) => true,
            RegistryError::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_transient_only_for_5xx() {
        let server_side = RegistryError::Service {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(server_side.is_transient());

        let client_side = RegistryError::Service {
            status: 422,
            message: "invalid schema".to_string(),
        };
        assert!(!client_side.is_transient());
    }

    #[test]
    fn test_lookup_errors_not_transient() {
        assert!(!RegistryError::SchemaNotFound { id: 7 }.is_transient());
        assert!(!RegistryError::SubjectNotFound {
            subject: "workflow.started-value".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = RegistryError::InvalidWireFormat {
            reason: "buffer too short".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid wire format: buffer too short");
    }
}
