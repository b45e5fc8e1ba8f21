//! Record signing with Ed25519 keypairs.
//!
//! Signing is a separate function from construction so the factory stays
//! testable, but unlike a blockchain mempool there is no "unsigned but
//! broadcast" state here — [`super::RecordFactory`] signs before it ever
//! returns a record. The signing data is [`TransferRecord::canonical_bytes`],
//! which deterministically excludes the signature and both verification
//! flags, so later confirmations never invalidate the original signature.

use super::factory::TransferRecord;
use crate::crypto::DeviceKeypair;

/// Signs a record in place using the provided keypair.
///
/// The procedure:
/// 1. Compute `canonical_bytes()` — the deterministic serialization of the
///    economically meaningful fields.
/// 2. Produce an Ed25519 signature over those bytes.
/// 3. Store the hex-encoded signature in `record.signature`.
///
/// Returns a reference to the (now signed) record, for chaining convenience.
pub fn sign_record<'a>(
    record: &'a mut TransferRecord,
    keypair: &DeviceKeypair,
) -> &'a TransferRecord {
    let canonical = record.canonical_bytes();
    let signature = keypair.sign(&canonical);
    record.signature = Some(signature.to_hex());
    record
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
