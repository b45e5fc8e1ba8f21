//! Transfer record construction.
//!
//! The [`RecordFactory`] is the only way a record comes into existence:
//! validate the user-supplied fields, stamp identity and time, sign, done.
//! A record that exists is a record that was signed — there is no unsigned
//! intermediate handed to callers, because an unsigned record is a record
//! nobody can trust and somebody will persist anyway.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::signing::sign_record;
use super::types::{Amount, AmountError, RecordStatus};
use crate::config::{MAX_DESCRIPTION_LENGTH, MAX_PRINCIPAL_LENGTH};
use crate::crypto::DeviceKeypair;

// ---------------------------------------------------------------------------
// RecordError
// ---------------------------------------------------------------------------

/// Errors from record construction.
///
/// These all fail fast, before anything is signed or persisted. A record
/// that trips one of these never existed as far as the rest of the protocol
/// is concerned.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The amount failed validation (non-positive, non-finite, too precise).
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// The recipient principal is empty.
    #[error("recipient must not be empty")]
    EmptyRecipient,

    /// The creating party's own principal is empty.
    #[error("sender must not be empty")]
    EmptySender,

    /// A principal identifier exceeds [`MAX_PRINCIPAL_LENGTH`].
    #[error("{field} identifier exceeds {max} bytes")]
    PrincipalTooLong { field: &'static str, max: usize },

    /// The description exceeds [`MAX_DESCRIPTION_LENGTH`].
    #[error("description is {len} bytes, maximum is {max}")]
    DescriptionTooLong { len: usize, max: usize },
}

// ---------------------------------------------------------------------------
// TransferRecord
// ---------------------------------------------------------------------------

/// A signed transfer description — the unit of value the protocol moves.
///
/// The economically meaningful fields (`id`, `amount`, `recipient`,
/// `sender`, `timestamp`, `description`) are immutable after signing: any
/// mutation makes [`canonical_bytes`](Self::canonical_bytes) diverge from
/// what was signed, and verification fails deterministically. The two
/// verification flags and `verification_timestamp` live outside the signed
/// envelope so that confirmations never invalidate the signature.
///
/// Field names serialize in camelCase to match the QR wire format. Every
/// field is always emitted, `None` included: the store's binary encoding is
/// positional, so a field that vanishes from the output would shift
/// everything after it. Omitting unset optionals from the QR JSON is the
/// codec's job, not this struct's.
///
/// # Canonical Byte Format
///
/// Signing and verification use [`canonical_bytes`](Self::canonical_bytes):
/// a deterministic concatenation with null-byte separators and fixed-width
/// little-endian integers. JSON is intentionally avoided here — field
/// ordering and number formatting are not guaranteed across serializers,
/// and a signature over unstable bytes is a signature over nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    /// Opaque unique identifier (UUIDv4), assigned at creation, immutable.
    pub id: String,

    /// Transfer amount. Positive by construction.
    pub amount: Amount,

    /// Recipient principal identifier. Never empty.
    pub recipient: String,

    /// Sender principal identifier. Never empty.
    pub sender: String,

    /// Creation time, epoch milliseconds. Set once.
    pub timestamp: u64,

    /// Optional free-text memo. Not security-relevant, but signed anyway —
    /// "coffee" quietly becoming "rent" would still surprise someone.
    #[serde(default)]
    pub description: Option<String>,

    /// Hex-encoded Ed25519 signature over the canonical bytes. Set exactly
    /// once, at creation, by the creating device.
    #[serde(default)]
    pub signature: Option<String>,

    /// The sender's attestation. Monotonic: false → true, never back.
    #[serde(default)]
    pub sender_verified: bool,

    /// The recipient's attestation. Monotonic: false → true, never back.
    #[serde(default)]
    pub recipient_verified: bool,

    /// Epoch milliseconds of the first confirmation. Set once, earliest wins.
    #[serde(default)]
    pub verification_timestamp: Option<u64>,
}

impl TransferRecord {
    /// Returns the canonical byte representation used for signing and
    /// verification.
    ///
    /// Excluded fields: `signature`, `sender_verified`, `recipient_verified`,
    /// `verification_timestamp`. Everything else is covered.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);

        buf.extend_from_slice(self.id.as_bytes());
        buf.push(0x00);

        // Amount as little-endian minor units. Integer, not a formatted
        // decimal — the one representation every device agrees on.
        buf.extend_from_slice(&self.amount.minor_units().to_le_bytes());

        buf.extend_from_slice(self.sender.as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(self.recipient.as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(&self.timestamp.to_le_bytes());

        // Description: length-prefixed if present, flag byte either way, so
        // "no description" and "empty description" encode differently.
        match &self.description {
            Some(text) => {
                buf.push(0x01);
                buf.extend_from_slice(&(text.len() as u32).to_le_bytes());
                buf.extend_from_slice(text.as_bytes());
            }
            None => buf.push(0x00),
        }

        buf
    }

    /// Recomputes the derived status from the two verification flags.
    pub fn status(&self) -> RecordStatus {
        RecordStatus::from_flags(self.sender_verified, self.recipient_verified)
    }

    /// Returns `true` if the record carries a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Returns `true` if the signed fields (and signature) of `other` are
    /// byte-identical to ours. The store uses this to refuse a merge between
    /// two records that share an id but not a history.
    pub fn signed_fields_match(&self, other: &Self) -> bool {
        self.id == other.id
            && self.amount == other.amount
            && self.recipient == other.recipient
            && self.sender == other.sender
            && self.timestamp == other.timestamp
            && self.description == other.description
            && self.signature == other.signature
    }
}

// ---------------------------------------------------------------------------
// RecordFactory
// ---------------------------------------------------------------------------

/// Builds fully-formed, signed [`TransferRecord`]s for one creating party.
///
/// The factory holds the creator's principal identifier (supplied by the
/// identity collaborator, or a locally generated anonymous tag) and is
/// handed the signing keypair per call. It has no side effects beyond
/// construction — persistence is the caller's explicit next step through
/// the store.
///
/// # Example
///
/// ```
/// use tessera_protocol::crypto::DeviceKeypair;
/// use tessera_protocol::record::{Amount, RecordFactory, RecordStatus};
///
/// let keypair = DeviceKeypair::generate();
/// let factory = RecordFactory::new("alice");
/// let record = factory
///     .create("25.00".parse().unwrap(), "bob", Some("lunch".into()), &keypair)
///     .unwrap();
///
/// assert_eq!(record.status(), RecordStatus::Pending);
/// assert!(record.is_signed());
/// ```
#[derive(Debug, Clone)]
pub struct RecordFactory {
    creator: String,
}

impl RecordFactory {
    /// Creates a factory for the given creator principal.
    pub fn new(creator: impl Into<String>) -> Self {
        Self {
            creator: creator.into(),
        }
    }

    /// Builds and signs a new record with the current time.
    pub fn create(
        &self,
        amount: Amount,
        recipient: &str,
        description: Option<String>,
        keypair: &DeviceKeypair,
    ) -> Result<TransferRecord, RecordError> {
        self.create_at(
            amount,
            recipient,
            description,
            keypair,
            Utc::now().timestamp_millis() as u64,
        )
    }

    /// Builds and signs a new record from a raw decimal amount, validating
    /// it on the way in. This is the entry point for UI-shaped input.
    pub fn create_from_decimal(
        &self,
        amount: f64,
        recipient: &str,
        description: Option<String>,
        keypair: &DeviceKeypair,
    ) -> Result<TransferRecord, RecordError> {
        let amount = Amount::try_from_decimal(amount)?;
        self.create(amount, recipient, description, keypair)
    }

    /// Builds and signs a record with an explicit timestamp. Mainly for
    /// tests that need reproducible canonical bytes.
    pub fn create_at(
        &self,
        amount: Amount,
        recipient: &str,
        description: Option<String>,
        keypair: &DeviceKeypair,
        timestamp: u64,
    ) -> Result<TransferRecord, RecordError> {
        if recipient.trim().is_empty() {
            return Err(RecordError::EmptyRecipient);
        }
        if self.creator.trim().is_empty() {
            return Err(RecordError::EmptySender);
        }
        if recipient.len() > MAX_PRINCIPAL_LENGTH {
            return Err(RecordError::PrincipalTooLong {
                field: "recipient",
                max: MAX_PRINCIPAL_LENGTH,
            });
        }
        if self.creator.len() > MAX_PRINCIPAL_LENGTH {
            return Err(RecordError::PrincipalTooLong {
                field: "sender",
                max: MAX_PRINCIPAL_LENGTH,
            });
        }
        if let Some(ref text) = description {
            if text.len() > MAX_DESCRIPTION_LENGTH {
                return Err(RecordError::DescriptionTooLong {
                    len: text.len(),
                    max: MAX_DESCRIPTION_LENGTH,
                });
            }
        }

        let mut record = TransferRecord {
            id: Uuid::new_v4().to_string(),
            amount,
            recipient: recipient.to_string(),
            sender: self.creator.clone(),
            timestamp,
            description,
            signature: None,
            sender_verified: false,
            recipient_verified: false,
            verification_timestamp: None,
        };

        sign_record(&mut record, keypair);
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> TransferRecord {
        let kp = DeviceKeypair::generate();
        RecordFactory::new("alice")
            .create_at(
                Amount::from_minor(2500).unwrap(),
                "bob",
                Some("lunch".into()),
                &kp,
                1_700_000_000_000,
            )
            .unwrap()
    }

    #[test]
    fn factory_produces_signed_pending_record() {
        let record = sample_record();
        assert!(record.is_signed());
        assert_eq!(record.status(), RecordStatus::Pending);
        assert!(!record.sender_verified);
        assert!(!record.recipient_verified);
        assert!(record.verification_timestamp.is_none());
    }

    #[test]
    fn factory_assigns_unique_ids() {
        let kp = DeviceKeypair::generate();
        let factory = RecordFactory::new("alice");
        let a = factory
            .create(Amount::from_major(1).unwrap(), "bob", None, &kp)
            .unwrap();
        let b = factory
            .create(Amount::from_major(1).unwrap(), "bob", None, &kp)
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn factory_uses_current_time() {
        let kp = DeviceKeypair::generate();
        let before = Utc::now().timestamp_millis() as u64;
        let record = RecordFactory::new("alice")
            .create(Amount::from_major(1).unwrap(), "bob", None, &kp)
            .unwrap();
        let after = Utc::now().timestamp_millis() as u64;
        assert!(record.timestamp >= before && record.timestamp <= after);
    }

    #[test]
    fn rejects_empty_recipient() {
        let kp = DeviceKeypair::generate();
        let result = RecordFactory::new("alice").create(
            Amount::from_major(1).unwrap(),
            "   ",
            None,
            &kp,
        );
        assert!(matches!(result, Err(RecordError::EmptyRecipient)));
    }

    #[test]
    fn rejects_empty_sender() {
        let kp = DeviceKeypair::generate();
        let result =
            RecordFactory::new("").create(Amount::from_major(1).unwrap(), "bob", None, &kp);
        assert!(matches!(result, Err(RecordError::EmptySender)));
    }

    #[test]
    fn rejects_bad_decimal_amount() {
        let kp = DeviceKeypair::generate();
        let factory = RecordFactory::new("alice");
        assert!(matches!(
            factory.create_from_decimal(0.0, "bob", None, &kp),
            Err(RecordError::InvalidAmount(_))
        ));
        assert!(matches!(
            factory.create_from_decimal(f64::NAN, "bob", None, &kp),
            Err(RecordError::InvalidAmount(_))
        ));
    }

    #[test]
    fn rejects_oversized_description() {
        let kp = DeviceKeypair::generate();
        let text = "x".repeat(MAX_DESCRIPTION_LENGTH + 1);
        let result = RecordFactory::new("alice").create(
            Amount::from_major(1).unwrap(),
            "bob",
            Some(text),
            &kp,
        );
        assert!(matches!(result, Err(RecordError::DescriptionTooLong { .. })));
    }

    #[test]
    fn canonical_bytes_exclude_signature_and_flags() {
        let mut record = sample_record();
        let bytes_before = record.canonical_bytes();

        record.signature = Some("deadbeef".to_string());
        record.sender_verified = true;
        record.recipient_verified = true;
        record.verification_timestamp = Some(1);

        assert_eq!(
            bytes_before,
            record.canonical_bytes(),
            "verification state must not affect canonical bytes"
        );
    }

    #[test]
    fn canonical_bytes_cover_every_signed_field() {
        let base = sample_record();
        let baseline = base.canonical_bytes();

        let mut m = base.clone();
        m.id = "other-id".into();
        assert_ne!(m.canonical_bytes(), baseline);

        let mut m = base.clone();
        m.amount = Amount::from_minor(2501).unwrap();
        assert_ne!(m.canonical_bytes(), baseline);

        let mut m = base.clone();
        m.sender = "mallory".into();
        assert_ne!(m.canonical_bytes(), baseline);

        let mut m = base.clone();
        m.recipient = "mallory".into();
        assert_ne!(m.canonical_bytes(), baseline);

        let mut m = base.clone();
        m.timestamp += 1;
        assert_ne!(m.canonical_bytes(), baseline);

        let mut m = base.clone();
        m.description = Some("dinner".into());
        assert_ne!(m.canonical_bytes(), baseline);

        let mut m = base;
        m.description = None;
        assert_ne!(m.canonical_bytes(), baseline);
    }

    #[test]
    fn none_and_empty_description_encode_differently() {
        let mut a = sample_record();
        a.description = None;
        let mut b = a.clone();
        b.description = Some(String::new());
        assert_ne!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn wire_json_is_camel_case() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"senderVerified\""));
        assert!(json.contains("\"recipientVerified\""));
        assert!(json.contains("\"amount\":25.0"));
        assert!(!json.contains("verification_timestamp"));
        // Derived status is never serialized as stored truth.
        assert!(!json.contains("\"status\""));
    }

    #[test]
    fn record_json_roundtrip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: TransferRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn signed_fields_match_detects_divergence() {
        let a = sample_record();
        let mut b = a.clone();
        assert!(a.signed_fields_match(&b));

        b.sender_verified = true;
        assert!(
            a.signed_fields_match(&b),
            "flags are outside the signed envelope"
        );

        b.amount = Amount::from_minor(1).unwrap();
        assert!(!a.signed_fields_match(&b));
    }
}
