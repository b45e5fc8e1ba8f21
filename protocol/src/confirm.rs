//! The confirmation service: where a scan becomes a verified transfer.
//!
//! Two call sites meet here. `ingest` is the scan boundary — a payload
//! string comes in, and only a cryptographically genuine record makes it
//! into the store. `confirm` is the human boundary — a party presses the
//! button, the [`ConfirmationGate`] decides whether they may, and the state
//! machine advances the record exactly one legal step.
//!
//! The gate is a capability, not a password: what counts as authorization
//! (a PIN, a biometric check, an always-yes demo gate) is the embedder's
//! decision, and the protocol only insists that SOMETHING said yes before a
//! verification flag flips.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::crypto::DevicePublicKey;
use crate::record::{
    verify_record, ConfirmationEvent, MachineError, Party, TransferRecord,
    VerificationStateMachine,
};
use crate::store::{RecordStore, StoreError};

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Decides whether a party is allowed to confirm a record right now.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn authorize(&self, record: &TransferRecord, party: Party) -> bool;
}

/// A gate that always says yes. For demos, tests, and embedders that do
/// their authorization upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenGate;

#[async_trait]
impl ConfirmationGate for OpenGate {
    async fn authorize(&self, _record: &TransferRecord, _party: Party) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfirmError {
    /// The id names a record this device has never stored.
    #[error("record {id} not found")]
    NotFound { id: String },

    /// The gate said no. Nothing changed.
    #[error("authorization denied for {party} confirmation of record {id}")]
    Unauthorized { id: String, party: Party },

    /// The stored record no longer verifies against its recorded signer
    /// key. This should be impossible unless the store was edited behind
    /// the protocol's back, which is exactly why we check.
    #[error("record {id} failed signature verification")]
    TamperedSignature { id: String },

    /// The record is stored but no signer key was recorded for it, so its
    /// signature cannot be re-checked before confirming.
    #[error("record {id} has no recorded signer key")]
    UnknownSigner { id: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Applies confirmations to records, with signature and authorization
/// checks in front of every state change.
pub struct ConfirmationService {
    store: RecordStore,
    gate: Arc<dyn ConfirmationGate>,
    machine: VerificationStateMachine,
}

impl ConfirmationService {
    pub fn new(store: RecordStore, gate: Arc<dyn ConfirmationGate>) -> Self {
        Self {
            store,
            gate,
            machine: VerificationStateMachine,
        }
    }

    /// Read-only access to the underlying store.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// The scan boundary: parse a payload string, verify its signature
    /// against the embedded key, and persist both.
    ///
    /// Ingesting the same payload twice is harmless — the store's merge
    /// makes the second pass a no-op.
    pub fn ingest(&self, payload: &str) -> Result<TransferRecord, ConfirmError> {
        let (record, key) = codec::decode_verified(payload)?;
        self.store.put_signer_key(&record.id, &key)?;
        let stored = self.store.upsert(&record)?;
        tracing::info!(id = %stored.id, status = %stored.status(), "payload ingested");
        Ok(stored)
    }

    /// Register a locally created record together with its signer key.
    /// The device that built the record calls this before showing the QR.
    pub fn register(
        &self,
        record: &TransferRecord,
        key: &DevicePublicKey,
    ) -> Result<TransferRecord, ConfirmError> {
        self.store.put_signer_key(&record.id, key)?;
        Ok(self.store.upsert(record)?)
    }

    /// The human boundary: one party confirms one record.
    ///
    /// Order of checks matters. The signature check runs before the gate so
    /// that nobody is asked to authorize a record that is not genuine; the
    /// gate runs before the state machine so a denied attempt leaves no
    /// trace in the record's state.
    pub async fn confirm(
        &self,
        id: &str,
        party: Party,
    ) -> Result<TransferRecord, ConfirmError> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| ConfirmError::NotFound { id: id.to_string() })?;

        let key = self
            .store
            .signer_key(id)?
            .ok_or_else(|| ConfirmError::UnknownSigner { id: id.to_string() })?;
        if !verify_record(&record, &key) {
            return Err(ConfirmError::TamperedSignature { id: id.to_string() });
        }

        if !self.gate.authorize(&record, party).await {
            tracing::warn!(%id, %party, "confirmation denied by gate");
            return Err(ConfirmError::Unauthorized {
                id: id.to_string(),
                party,
            });
        }

        let advanced = self.machine.apply(&record, ConfirmationEvent::now(party))?;
        let stored = self.store.upsert(&advanced)?;
        tracing::info!(%id, %party, status = %stored.status(), "confirmation applied");
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
