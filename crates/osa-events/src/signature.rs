//! HMAC-SHA256 signing and verification for workflow event payloads.
//!
//! Proves payload integrity and sender authenticity for events crossing the
//! boundary between the dashboard and the OPAL workflow engine. The event
//! timestamp is bound into the MAC input, so a replayed signature cannot be
//! paired with a forged "this is recent" timestamp.
//!
//! All verification paths return a typed [`Verification`] value and never
//! fail with an error: this module is called directly on untrusted network
//! input.

use std::fmt;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature on signed webhook requests.
pub const SIGNATURE_HEADER: &str = "X-OSA-Signature";

/// Default replay window: signatures older than this are rejected.
pub const DEFAULT_MAX_AGE_MS: i64 = 600_000;

/// Tolerated clock skew for timestamps ahead of the local clock.
pub const MAX_FUTURE_SKEW_MS: i64 = 60_000;

/// Result of signing a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// Lowercase hex HMAC-SHA256 digest (always 64 chars).
    pub signature: String,
    /// Timestamp bound into the signature, in milliseconds since epoch.
    /// Zero when the signature was computed without timestamp binding.
    pub timestamp: i64,
}

/// Why a signature failed verification.
///
/// Each cause is distinguished so callers can log "replay suspected"
/// differently from "wrong secret".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    /// Payload was empty.
    EmptyPayload,
    /// Signature was empty.
    EmptySignature,
    /// The shared secret was empty.
    EmptySecret,
    /// Signature was not a valid hex string.
    MalformedSignature,
    /// Decoded signature length does not match the digest length.
    LengthMismatch { expected: usize, actual: usize },
    /// Signature content does not match the expected MAC.
    SignatureMismatch,
    /// Timestamp is older than the replay window.
    StaleTimestamp { age_ms: i64, max_age_ms: i64 },
    /// Timestamp is further in the future than the tolerated skew.
    FutureTimestamp { skew_ms: i64 },
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "payload is empty"),
            Self::EmptySignature => write!(f, "signature is empty"),
            Self::EmptySecret => write!(f, "signing secret is empty"),
            Self::MalformedSignature => write!(f, "signature is not valid hex"),
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "signature length mismatch: expected {expected} bytes, got {actual}"
            ),
            Self::SignatureMismatch => write!(f, "signature does not match payload"),
            Self::StaleTimestamp { age_ms, max_age_ms } => write!(
                f,
                "timestamp is stale: {age_ms}ms old exceeds replay window of {max_age_ms}ms"
            ),
            Self::FutureTimestamp { skew_ms } => write!(
                f,
                "timestamp is {skew_ms}ms in the future, beyond tolerated clock skew"
            ),
        }
    }
}

impl VerifyFailure {
    /// Returns true if this failure suggests a replayed or delayed message
    /// rather than a forged one.
    pub fn is_replay_suspected(&self) -> bool {
        matches!(
            self,
            Self::StaleTimestamp { .. } | Self::FutureTimestamp { .. }
        )
    }
}

/// Outcome of verifying a signed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub is_valid: bool,
    pub failure: Option<VerifyFailure>,
}

impl Verification {
    fn valid() -> Self {
        Self {
            is_valid: true,
            failure: None,
        }
    }

    fn invalid(failure: VerifyFailure) -> Self {
        Self {
            is_valid: false,
            failure: Some(failure),
        }
    }

    /// Human-readable failure description, if any.
    pub fn error(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}

/// Parsed `t=<ms>,v1=<hex>` signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signature: String,
}

/// Signs and verifies event payloads with a shared HMAC secret.
///
/// Constructed once at process startup and passed by handle into every
/// request path; holds no mutable state.
pub struct SignatureCodec {
    secret: Vec<u8>,
    max_age_ms: i64,
}

impl SignatureCodec {
    /// Create a codec for the given shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            max_age_ms: DEFAULT_MAX_AGE_MS,
        }
    }

    /// Override the replay window.
    #[must_use]
    pub fn with_max_age_ms(mut self, max_age_ms: i64) -> Self {
        self.max_age_ms = max_age_ms;
        self
    }

    /// Sign a payload, binding the current time into the MAC.
    pub fn sign(&self, payload: &[u8]) -> SignedPayload {
        self.sign_at(payload, Utc::now().timestamp_millis())
    }

    /// Sign a payload, binding an explicit timestamp into the MAC.
    pub fn sign_at(&self, payload: &[u8], timestamp_ms: i64) -> SignedPayload {
        SignedPayload {
            signature: hex::encode(self.mac_bytes(payload, Some(timestamp_ms))),
            timestamp: timestamp_ms,
        }
    }

    /// Sign a payload without timestamp binding.
    ///
    /// The resulting signature has no replay protection; reserved for
    /// payloads that carry their own freshness guarantee.
    pub fn sign_unbound(&self, payload: &[u8]) -> SignedPayload {
        SignedPayload {
            signature: hex::encode(self.mac_bytes(payload, None)),
            timestamp: 0,
        }
    }

    /// Verify a signature against the local clock.
    ///
    /// Pass back the timestamp exactly as received so the MAC recomputation
    /// is symmetric with signing; `None` verifies a timestamp-free
    /// signature.
    pub fn verify(
        &self,
        payload: &[u8],
        signature_hex: &str,
        timestamp: Option<i64>,
    ) -> Verification {
        self.verify_at(Utc::now().timestamp_millis(), payload, signature_hex, timestamp)
    }

    /// Verify a signature against an explicit clock reading.
    pub fn verify_at(
        &self,
        now_ms: i64,
        payload: &[u8],
        signature_hex: &str,
        timestamp: Option<i64>,
    ) -> Verification {
        // Reject trivially malformed input before any MAC computation.
        if payload.is_empty() {
            return Verification::invalid(VerifyFailure::EmptyPayload);
        }
        if signature_hex.is_empty() {
            return Verification::invalid(VerifyFailure::EmptySignature);
        }
        if self.secret.is_empty() {
            return Verification::invalid(VerifyFailure::EmptySecret);
        }
        if !signature_hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Verification::invalid(VerifyFailure::MalformedSignature);
        }
        let provided = match hex::decode(signature_hex) {
            Ok(bytes) => bytes,
            // Odd-length hex string.
            Err(_) => return Verification::invalid(VerifyFailure::MalformedSignature),
        };

        let expected = self.mac_bytes(payload, timestamp);

        // The constant-time primitive requires equal-length inputs, so the
        // length check is a distinct prior branch. An attacker can tell
        // "wrong length" from "wrong content" by timing; accepted as a
        // low-value side channel since digest length is public anyway.
        if provided.len() != expected.len() {
            return Verification::invalid(VerifyFailure::LengthMismatch {
                expected: expected.len(),
                actual: provided.len(),
            });
        }

        if !bool::from(expected.as_slice().ct_eq(&provided)) {
            return Verification::invalid(VerifyFailure::SignatureMismatch);
        }

        if let Some(t) = timestamp {
            let age_ms = now_ms - t;
            if age_ms > self.max_age_ms {
                return Verification::invalid(VerifyFailure::StaleTimestamp {
                    age_ms,
                    max_age_ms: self.max_age_ms,
                });
            }
            if age_ms < -MAX_FUTURE_SKEW_MS {
                return Verification::invalid(VerifyFailure::FutureTimestamp { skew_ms: -age_ms });
            }
        }

        Verification::valid()
    }

    /// MAC input is `<decimal timestamp><payload>` when a timestamp is
    /// bound, the payload alone otherwise.
    fn mac_bytes(&self, payload: &[u8], timestamp: Option<i64>) -> Vec<u8> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        if let Some(t) = timestamp {
            mac.update(t.to_string().as_bytes());
        }
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl fmt::Debug for SignatureCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureCodec")
            .field("secret", &"<redacted>")
            .field("max_age_ms", &self.max_age_ms)
            .finish()
    }
}

/// Parse a `t=<ms>,v1=<hex>` signature header.
///
/// Returns `None` on any malformed or missing part; never panics on
/// attacker-controlled input. Whitespace around the comma-separated parts
/// is tolerated.
pub fn parse_header(header: &str) -> Option<SignatureHeader> {
    let mut parts = header.split(',');
    let t_part = parts.next()?.trim();
    let v_part = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }

    let timestamp: i64 = t_part.strip_prefix("t=")?.parse().ok()?;
    let signature = v_part.strip_prefix("v1=")?;
    if signature.is_empty() || !signature.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some(SignatureHeader {
        timestamp,
        signature: signature.to_string(),
    })
}

/// Render a signature header; exact inverse of [`parse_header`].
pub fn format_header(timestamp: i64, signature: &str) -> String {
    format!("t={timestamp},v1={signature}")
}
