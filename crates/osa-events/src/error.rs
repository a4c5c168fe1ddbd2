//! Error types for the osa-events crate.

use thiserror::Error;

/// Errors that can occur during event-reliability operations.
#[derive(Debug, Error)]
pub enum EventError {
    // Configuration errors (permanent, no retry)
    /// Required configuration variable is missing.
    #[error("Configuration missing: {var}")]
    ConfigMissing { var: String },

    /// Configuration value is invalid.
    #[error("Configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },

    // Store errors (transient, retry with backoff)
    /// The key-value store could not serve the request.
    #[error("Key-value store unavailable: {cause}")]
    StoreUnavailable { cause: String },

    /// Failed to record an event as processed.
    ///
    /// Unlike a failed read, a failed write must surface to the caller:
    /// silently losing the "done" record reintroduces duplicate
    /// processing on redelivery.
    #[error("Failed to mark event {event_id} as processed: {cause}")]
    MarkFailed { event_id: String, cause: String },

    // Envelope errors
    /// A signed envelope or its header could not be parsed.
    #[error("Invalid signed envelope: {reason}")]
    InvalidEnvelope { reason: String },

    /// Failed to serialize or deserialize an idempotency record.
    #[error("Failed to serialize record for event {event_id}: {cause}")]
    SerializationFailed { event_id: String, cause: String },
}

impl EventError {
    /// Returns true if this error is transient and can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EventError::StoreUnavailable { .. } | EventError::MarkFailed { .. }
        )
    }

    /// Returns true if this is a configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EventError::ConfigMissing { .. } | EventError::ConfigInvalid { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_transient() {
        let transient = EventError::StoreUnavailable {
            cause: "connection refused".to_string(),
        };
        assert!(transient.is_transient());

        let permanent = EventError::ConfigMissing {
            var: "OSA_REDIS_URL".to_string(),
        };
        assert!(!permanent.is_transient());
    }

    #[test]
    fn test_error_is_config_error() {
        let config_err = EventError::ConfigInvalid {
            var: "OSA_WEBHOOK_SECRET".to_string(),
            reason: "too short".to_string(),
        };
        assert!(config_err.is_config_error());

        let other_err = EventError::InvalidEnvelope {
            reason: "missing header".to_string(),
        };
        assert!(!other_err.is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = EventError::MarkFailed {
            event_id: "evt-1".to_string(),
            cause: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to mark event evt-1 as processed: timeout"
        );
    }
}
