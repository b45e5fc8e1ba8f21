//! Record signature verification.
//!
//! Every record arriving through the codec boundary passes through
//! [`verify_record`] before any other component is allowed to touch it.
//! The contract is deliberately blunt: a boolean, never a panic, never an
//! exception used for control flow. Malformed hex, a truncated signature,
//! a structurally incomplete record, and an honest-to-goodness forgery all
//! collapse into `false` — callers distinguish "invalid" from "crashed" by
//! the fact that we never crash.

use super::factory::TransferRecord;
use crate::crypto::{DevicePublicKey, DeviceSignature};

/// Verifies a record's signature against the supplied public key.
///
/// Recomputes [`TransferRecord::canonical_bytes`] and checks the record's
/// embedded signature over them. Pure and side-effect-free.
///
/// Returns `false` when:
/// - the record carries no signature at all,
/// - the signature is not valid hex or not 64 bytes,
/// - a required principal field is empty (a structurally incomplete record
///   is not worth a curve operation),
/// - the Ed25519 check fails.
///
/// Checks are ordered cheapest-first: string tests before curve math, so a
/// garbage payload wastes as little CPU as possible.
pub fn verify_record(record: &TransferRecord, public_key: &DevicePublicKey) -> bool {
    if record.sender.is_empty() || record.recipient.is_empty() || record.id.is_empty() {
        return false;
    }

    let Some(sig_hex) = record.signature.as_deref() else {
        return false;
    };
    let Ok(signature) = DeviceSignature::from_hex(sig_hex) else {
        return false;
    };

    public_key.verify(&record.canonical_bytes(), &signature)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
