//! Signed envelope for payloads crossing the workflow-engine boundary.

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::signature::{format_header, parse_header, SignatureCodec, Verification};

/// Wire representation of a signed message.
///
/// Created per outbound call by the sender, consumed and discarded by the
/// receiver after verification; never persisted. The payload is carried
/// untouched: this layer never mutates application bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEnvelope {
    /// Application payload, opaque to this layer.
    pub payload: Vec<u8>,

    /// Milliseconds since epoch, bound into the signature.
    pub timestamp: i64,

    /// Hex-encoded HMAC-SHA256 over `timestamp || payload`.
    pub signature: String,
}

impl SignedEnvelope {
    /// Sign a payload and wrap it for transport.
    pub fn seal(codec: &SignatureCodec, payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        let signed = codec.sign(&payload);
        Self {
            payload,
            timestamp: signed.timestamp,
            signature: signed.signature,
        }
    }

    /// Reconstruct an envelope from a request body and its signature header.
    pub fn from_parts(payload: impl Into<Vec<u8>>, header: &str) -> Result<Self, EventError> {
        let parsed = parse_header(header).ok_or_else(|| EventError::InvalidEnvelope {
            reason: format!("malformed signature header: {header:?}"),
        })?;
        Ok(Self {
            payload: payload.into(),
            timestamp: parsed.timestamp,
            signature: parsed.signature,
        })
    }

    /// Render the `t=,v1=` header value for this envelope.
    pub fn header_value(&self) -> String {
        format_header(self.timestamp, &self.signature)
    }

    /// Verify the envelope against the shared secret and replay window.
    pub fn verify(&self, codec: &SignatureCodec) -> Verification {
        codec.verify(&self.payload, &self.signature, Some(self.timestamp))
    }
}
