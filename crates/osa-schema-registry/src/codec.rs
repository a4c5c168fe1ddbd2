//! Wire framing for schema-tagged payloads.
//!
//! Every framed message is self-describing: a magic byte, the big-endian
//! global schema id, then the serialized payload. Consumers resolve the
//! schema from the embedded id alone, so producers and consumers never
//! need to agree on versions out of band.

use serde_json::Value;
use tracing::debug;

use crate::client::SchemaRegistryClient;
use crate::error::RegistryError;
use crate::types::{SchemaRecord, SchemaType};

/// First byte of every framed message.
pub const WIRE_FORMAT_MAGIC: u8 = 0x00;

/// Bytes of framing before the payload: magic plus u32 schema id.
pub const WIRE_HEADER_LEN: usize = 5;

/// A decoded framed message with its resolved schema.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// Global id embedded in the frame.
    pub schema_id: u32,
    /// The schema the payload was written with.
    pub record: SchemaRecord,
    /// The payload itself.
    pub payload: Value,
}

/// Frame a serialized payload under a schema id.
#[must_use]
pub fn frame(schema_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(WIRE_HEADER_LEN + payload.len());
    buf.push(WIRE_FORMAT_MAGIC);
    buf.extend_from_slice(&schema_id.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Split a framed buffer into its schema id and payload bytes.
pub fn parse_frame(buf: &[u8]) -> Result<(u32, &[u8]), RegistryError> {
    if buf.len() < WIRE_HEADER_LEN {
        return Err(RegistryError::InvalidWireFormat {
            reason: format!(
                "buffer too short: {} bytes, need at least {WIRE_HEADER_LEN}",
                buf.len()
            ),
        });
    }
    if buf[0] != WIRE_FORMAT_MAGIC {
        return Err(RegistryError::InvalidWireFormat {
            reason: format!("unknown magic byte 0x{:02x}", buf[0]),
        });
    }
    let id = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    Ok((id, &buf[WIRE_HEADER_LEN..]))
}

impl SchemaRegistryClient {
    /// Encode a payload under the subject's latest registered schema.
    ///
    /// Fails with [`RegistryError::SubjectNotFound`] when nothing has been
    /// registered yet; use [`Self::encode_registering`] for producers that
    /// own their subject's schema.
    pub async fn encode(&self, subject: &str, payload: &Value) -> Result<Vec<u8>, RegistryError> {
        let record = self.get_latest_schema(subject).await?;
        let bytes =
            serde_json::to_vec(payload).map_err(|e| RegistryError::SerializationFailed {
                subject: subject.to_string(),
                cause: e.to_string(),
            })?;
        debug!(
            target: "schema_registry",
            subject,
            schema_id = record.id,
            payload_len = bytes.len(),
            "Encoded framed payload"
        );
        Ok(frame(record.id, &bytes))
    }

    /// Encode a payload, registering the given schema first.
    ///
    /// Registration is idempotent at the registry for byte-identical
    /// content, so producers can call this on every message without
    /// version churn.
    pub async fn encode_registering(
        &self,
        subject: &str,
        schema: &str,
        schema_type: SchemaType,
        payload: &Value,
    ) -> Result<Vec<u8>, RegistryError> {
        let registered = self.register(subject, schema, schema_type).await?;
        let bytes =
            serde_json::to_vec(payload).map_err(|e| RegistryError::SerializationFailed {
                subject: subject.to_string(),
                cause: e.to_string(),
            })?;
        Ok(frame(registered.id, &bytes))
    }

    /// Decode a framed buffer, resolving its schema from the embedded id.
    pub async fn decode(&self, buf: &[u8]) -> Result<DecodedMessage, RegistryError> {
        let (schema_id, payload_bytes) = parse_frame(buf)?;
        let record = self.get_schema_by_id(schema_id).await?;
        let payload: Value =
            serde_json::from_slice(payload_bytes).map_err(|e| RegistryError::SerializationFailed {
                subject: record.subject.clone(),
                cause: e.to_string(),
            })?;
        Ok(DecodedMessage {
            schema_id,
            record,
            payload,
        })
    }
}
