//! The dual-flag verification state machine.
//!
//! A record moves `pending` → `partially_verified` → `completed` as each
//! party attests to it. This module is the single definition of which
//! transitions are legal. It is a pure function over values: no storage,
//! no clock, no polling — callers feed it a record and an event, and get
//! back either a new record or a refusal.
//!
//! ## Transition rules
//!
//! - A flag may go false → true. It may never go back.
//! - A `completed` record is terminal. Every further event is rejected with
//!   [`MachineError::AlreadyCompleted`] — completion means both parties have
//!   spoken, and there is nothing left to say.
//! - Re-confirming a flag that is already true is rejected with
//!   [`MachineError::AlreadyVerified`] — an idempotency signal, not a
//!   failure that should send a user back to the start of the flow.
//! - `verification_timestamp` is set by the first confirmation only; the
//!   earliest value wins and subsequent events never move it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::factory::TransferRecord;
use super::types::Party;

// ---------------------------------------------------------------------------
// ConfirmationEvent
// ---------------------------------------------------------------------------

/// One party's attestation to a record.
///
/// The event names the party whose flag it sets and the moment the
/// attestation happened on that party's device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationEvent {
    /// Whose flag this event sets.
    pub party: Party,
    /// When the attestation happened, epoch milliseconds.
    pub timestamp: u64,
}

impl ConfirmationEvent {
    /// Creates an event stamped with the current time.
    pub fn now(party: Party) -> Self {
        Self {
            party,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
        }
    }
}

// ---------------------------------------------------------------------------
// MachineError
// ---------------------------------------------------------------------------

/// Refusals from the state machine.
///
/// Both variants are idempotency guards, not corruption: the record the
/// caller holds is unchanged and still valid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MachineError {
    /// The record is already `completed`; completion is terminal.
    #[error("record is already completed; no further verification events are meaningful")]
    AlreadyCompleted,

    /// This party's flag is already set.
    #[error("{party} has already verified this record")]
    AlreadyVerified {
        /// The party whose duplicate attestation was rejected.
        party: Party,
    },
}

// ---------------------------------------------------------------------------
// VerificationStateMachine
// ---------------------------------------------------------------------------

/// Pure transition function for record verification state.
///
/// Stateless by design — the struct exists so the transition logic has a
/// nameable home and so future policy (say, a confirmation deadline) has an
/// obvious place to hang configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationStateMachine;

impl VerificationStateMachine {
    /// Creates a state machine.
    pub fn new() -> Self {
        Self
    }

    /// Applies a confirmation event to a record.
    ///
    /// On success returns a new record with the party's flag set and
    /// `verification_timestamp` populated if this was the first
    /// confirmation. The input record is never mutated — flag updates flow
    /// through here or they don't happen, which is what makes the
    /// monotonicity invariant enforceable in one place.
    pub fn apply(
        &self,
        record: &TransferRecord,
        event: ConfirmationEvent,
    ) -> Result<TransferRecord, MachineError> {
        if record.sender_verified && record.recipient_verified {
            return Err(MachineError::AlreadyCompleted);
        }

        let already = match event.party {
            Party::Sender => record.sender_verified,
            Party::Recipient => record.recipient_verified,
        };
        if already {
            return Err(MachineError::AlreadyVerified { party: event.party });
        }

        let mut next = record.clone();
        match event.party {
            Party::Sender => next.sender_verified = true,
            Party::Recipient => next.recipient_verified = true,
        }
        // First confirmation stamps the time; later ones never move it.
        next.verification_timestamp = match record.verification_timestamp {
            Some(existing) => Some(existing.min(event.timestamp)),
            None => Some(event.timestamp),
        };

        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DeviceKeypair;
    use crate::record::types::{Amount, RecordStatus};
    use crate::record::RecordFactory;

    fn pending_record() -> TransferRecord {
        let kp = DeviceKeypair::generate();
        RecordFactory::new("alice")
            .create_at(
                Amount::from_minor(2500).unwrap(),
                "bob",
                None,
                &kp,
                1_700_000_000_000,
            )
            .unwrap()
    }

    fn at(party: Party, timestamp: u64) -> ConfirmationEvent {
        ConfirmationEvent { party, timestamp }
    }

    #[test]
    fn full_lifecycle() {
        let sm = VerificationStateMachine::new();
        let record = pending_record();
        assert_eq!(record.status(), RecordStatus::Pending);

        let after_sender = sm.apply(&record, at(Party::Sender, 100)).unwrap();
        assert_eq!(after_sender.status(), RecordStatus::PartiallyVerified);
        assert!(after_sender.sender_verified);
        assert!(!after_sender.recipient_verified);
        assert_eq!(after_sender.verification_timestamp, Some(100));

        let completed = sm.apply(&after_sender, at(Party::Recipient, 200)).unwrap();
        assert_eq!(completed.status(), RecordStatus::Completed);
        assert_eq!(
            completed.verification_timestamp,
            Some(100),
            "first confirmation's timestamp must stick"
        );
    }

    #[test]
    fn recipient_may_confirm_first() {
        let sm = VerificationStateMachine::new();
        let record = pending_record();
        let after = sm.apply(&record, at(Party::Recipient, 50)).unwrap();
        assert!(after.recipient_verified);
        assert!(!after.sender_verified);
        assert_eq!(after.status(), RecordStatus::PartiallyVerified);
    }

    #[test]
    fn duplicate_confirmation_rejected() {
        let sm = VerificationStateMachine::new();
        let record = pending_record();
        let once = sm.apply(&record, at(Party::Sender, 100)).unwrap();
        let twice = sm.apply(&once, at(Party::Sender, 200));
        assert_eq!(
            twice,
            Err(MachineError::AlreadyVerified {
                party: Party::Sender
            })
        );
    }

    #[test]
    fn completed_is_terminal() {
        let sm = VerificationStateMachine::new();
        let record = pending_record();
        let partial = sm.apply(&record, at(Party::Sender, 100)).unwrap();
        let completed = sm.apply(&partial, at(Party::Recipient, 200)).unwrap();

        for party in [Party::Sender, Party::Recipient] {
            assert_eq!(
                sm.apply(&completed, at(party, 300)),
                Err(MachineError::AlreadyCompleted)
            );
        }
    }

    #[test]
    fn rejection_leaves_input_untouched() {
        let sm = VerificationStateMachine::new();
        let record = pending_record();
        let partial = sm.apply(&record, at(Party::Sender, 100)).unwrap();
        let snapshot = partial.clone();

        let _ = sm.apply(&partial, at(Party::Sender, 999));
        assert_eq!(partial, snapshot, "a refused event must not mutate");
    }

    #[test]
    fn earliest_verification_timestamp_wins() {
        // Cross-device clocks disagree; if a merge later replays events out
        // of order, the earliest attestation time is the one recorded.
        let sm = VerificationStateMachine::new();
        let record = pending_record();
        let first = sm.apply(&record, at(Party::Recipient, 500)).unwrap();
        let second = sm.apply(&first, at(Party::Sender, 200)).unwrap();
        assert_eq!(second.verification_timestamp, Some(200));
    }

    #[test]
    fn apply_does_not_touch_signed_fields() {
        let sm = VerificationStateMachine::new();
        let record = pending_record();
        let after = sm.apply(&record, at(Party::Sender, 100)).unwrap();
        assert!(record.signed_fields_match(&after));
        assert_eq!(record.canonical_bytes(), after.canonical_bytes());
    }
}
