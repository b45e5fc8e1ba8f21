//! The QR payload codec.
//!
//! Everything that crosses between two devices crosses here, as one JSON
//! document: the signed record plus the hex public key that vouches for it.
//! The payload is self-contained on purpose — the scanning device may have
//! never seen the sender before and may never see a network again, yet it
//! can still decide whether the record is genuine.
//!
//! Rendering the string as an actual QR image is the caller's problem; this
//! module owns the bytes, not the pixels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PAYLOAD_FORMAT;
use crate::crypto::{DevicePublicKey, KeyError};
use crate::record::{verify_record, Amount, TransferRecord};

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The wire form of a record exchange.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    /// Format discriminator, e.g. `"tessera/1"`. Lets a future payload
    /// revision fail loudly instead of half-parsing.
    pub format: String,
    /// The signed record being presented. The key is `transaction`, not
    /// `record`: that is the shape already printed on every QR in the
    /// field, and a rename would orphan all of them.
    pub transaction: TransferRecord,
    /// Hex encoding of the signer's Ed25519 public key.
    pub public_key: String,
}

impl QrPayload {
    /// `true` if the embedded key parses and the record's signature
    /// verifies against it. Never panics, whatever the payload holds.
    pub fn verify(&self) -> bool {
        match DevicePublicKey::from_hex(&self.public_key) {
            Ok(key) => verify_record(&self.transaction, &key),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is not valid JSON, or not the JSON we expect.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The payload parsed but declares a format we do not speak.
    #[error("unsupported payload format {found:?} (expected {expected:?})")]
    UnsupportedFormat { found: String, expected: String },

    /// The embedded public key is not a valid Ed25519 point.
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// The signature does not verify against the embedded key. Either the
    /// record was altered after signing or the key is not the signer's.
    #[error("signature does not verify against the embedded public key")]
    TamperedSignature,
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

/// Serialize-only mirror of [`TransferRecord`] for the QR JSON. Unset
/// optionals are omitted here rather than written as `null` — and only
/// here: the store's binary encoding is positional and needs every field
/// of the real struct present.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord<'a> {
    id: &'a str,
    amount: Amount,
    recipient: &'a str,
    sender: &'a str,
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
    sender_verified: bool,
    recipient_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification_timestamp: Option<u64>,
}

impl<'a> From<&'a TransferRecord> for WireRecord<'a> {
    fn from(record: &'a TransferRecord) -> Self {
        Self {
            id: &record.id,
            amount: record.amount,
            recipient: &record.recipient,
            sender: &record.sender,
            timestamp: record.timestamp,
            description: record.description.as_deref(),
            signature: record.signature.as_deref(),
            sender_verified: record.sender_verified,
            recipient_verified: record.recipient_verified,
            verification_timestamp: record.verification_timestamp,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePayload<'a> {
    format: &'a str,
    transaction: WireRecord<'a>,
    public_key: String,
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Serialize a record and its signer key into the QR payload string.
pub fn encode(record: &TransferRecord, public_key: &DevicePublicKey) -> String {
    let payload = WirePayload {
        format: PAYLOAD_FORMAT,
        transaction: record.into(),
        public_key: public_key.to_hex(),
    };
    // The payload contains no map keys that can fail to serialize.
    serde_json::to_string(&payload).unwrap_or_default()
}

/// Parse a scanned payload string, validating shape and key encoding but
/// NOT the signature. Use [`decode_verified`] when you want both.
pub fn decode(input: &str) -> Result<(TransferRecord, DevicePublicKey), CodecError> {
    let payload: QrPayload =
        serde_json::from_str(input).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if payload.format != PAYLOAD_FORMAT {
        return Err(CodecError::UnsupportedFormat {
            found: payload.format,
            expected: PAYLOAD_FORMAT.to_string(),
        });
    }
    let key = DevicePublicKey::from_hex(&payload.public_key)?;
    Ok((payload.transaction, key))
}

/// Parse a scanned payload and verify the record's signature against the
/// embedded key. This is the call a receiving device makes at the scan
/// boundary: anything that comes back `Ok` is cryptographically genuine.
pub fn decode_verified(input: &str) -> Result<(TransferRecord, DevicePublicKey), CodecError> {
    let (record, key) = decode(input)?;
    if !verify_record(&record, &key) {
        return Err(CodecError::TamperedSignature);
    }
    Ok((record, key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
