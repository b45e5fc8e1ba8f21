//! End-to-end integration tests for the Tessera protocol.
//!
//! These tests exercise the full dual-confirmation lifecycle between two
//! devices: record construction and signing on the sender, the QR payload
//! crossing the air gap, signature verification and ingestion on the
//! recipient, gated confirmation on both sides, monotonic merge back, and
//! the eventual ledger push once connectivity exists.
//!
//! Each test stands alone with its own temporary stores. No shared state,
//! no test ordering dependencies, no flaky failures.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use tessera_protocol::codec::{self, CodecError};
use tessera_protocol::confirm::{ConfirmationService, OpenGate};
use tessera_protocol::crypto::{DeviceKeypair, DevicePublicKey};
use tessera_protocol::notify::{notify_best_effort, NotificationSink, NotifyError};
use tessera_protocol::record::{Amount, Party, RecordFactory, RecordStatus, TransferRecord};
use tessera_protocol::store::RecordStore;
use tessera_protocol::sync::{
    LedgerClient, LedgerError, StaticProbe, SyncAgent, SyncConfig, SyncError,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// A device: its identity, its store, and its confirmation service.
struct Device {
    keypair: DeviceKeypair,
    service: ConfirmationService,
}

impl Device {
    fn new() -> Self {
        let store = RecordStore::open_temporary().expect("temp store");
        Self {
            keypair: DeviceKeypair::generate(),
            service: ConfirmationService::new(store, Arc::new(OpenGate)),
        }
    }

    fn store(&self) -> &RecordStore {
        self.service.store()
    }
}

/// An in-memory ledger that accepts everything and remembers what it saw.
#[derive(Default)]
struct RecordingLedger {
    pushed: Mutex<Vec<String>>,
}

impl RecordingLedger {
    fn pushed_ids(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for RecordingLedger {
    async fn push(
        &self,
        record: &TransferRecord,
        _public_key: &DevicePublicKey,
    ) -> Result<(), LedgerError> {
        self.pushed.lock().unwrap().push(record.id.clone());
        Ok(())
    }
}

fn fast_sync_config() -> SyncConfig {
    SyncConfig {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        push_timeout: Duration::from_secs(1),
    }
}

/// Builds a signed record on the sender device and registers it locally.
fn create_on(device: &Device, amount_major: u64, recipient: &str) -> TransferRecord {
    let record = RecordFactory::new("sender-device")
        .create(
            Amount::from_major(amount_major).expect("valid amount"),
            recipient,
            Some("integration test transfer".into()),
            &device.keypair,
        )
        .expect("record should build");
    device
        .service
        .register(&record, &device.keypair.public_key())
        .expect("register should succeed");
    record
}

// ---------------------------------------------------------------------------
// 1. Full Dual-Confirmation Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_dual_confirmation_lifecycle() {
    let sender = Device::new();
    let recipient = Device::new();

    // Sender builds and signs a record, then confirms their side.
    let record = create_on(&sender, 25, "bob");
    assert_eq!(record.status(), RecordStatus::Pending);
    assert!(record.is_signed());

    let after_sender = sender
        .service
        .confirm(&record.id, Party::Sender)
        .await
        .unwrap();
    assert_eq!(after_sender.status(), RecordStatus::PartiallyVerified);
    assert!(after_sender.verification_timestamp.is_some());

    // The QR crosses the air gap carrying the sender's confirmation.
    let wire = codec::encode(&after_sender, &sender.keypair.public_key());
    let ingested = recipient.service.ingest(&wire).unwrap();
    assert!(ingested.sender_verified);
    assert!(!ingested.recipient_verified);

    // Recipient confirms; the record completes on their device.
    let completed = recipient
        .service
        .confirm(&record.id, Party::Recipient)
        .await
        .unwrap();
    assert_eq!(completed.status(), RecordStatus::Completed);

    // The completed copy travels back and merges into the sender's store.
    let wire_back = codec::encode(&completed, &sender.keypair.public_key());
    let merged = sender.service.ingest(&wire_back).unwrap();
    assert_eq!(merged.status(), RecordStatus::Completed);
    assert_eq!(
        merged.verification_timestamp,
        after_sender.verification_timestamp,
        "earliest confirmation timestamp must win the merge"
    );
}

// ---------------------------------------------------------------------------
// 2. Offline Confirmation, Later Sync
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn offline_confirmation_syncs_when_connectivity_returns() {
    let device = Device::new();
    let record = create_on(&device, 10, "carol");
    device
        .service
        .confirm(&record.id, Party::Sender)
        .await
        .unwrap();

    let probe = Arc::new(StaticProbe::new(false));
    let ledger = Arc::new(RecordingLedger::default());
    let agent = SyncAgent::new(probe.clone(), ledger.clone(), device.store().clone())
        .with_config(fast_sync_config());

    // Offline: the push exhausts its attempts and the record stays queued.
    let err = agent
        .sync_record(&record, &device.keypair.public_key())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Unreachable { .. }));
    assert!(device.store().is_sync_pending(&record.id).unwrap());
    assert!(ledger.pushed_ids().is_empty());

    // Connectivity returns: a drain pass delivers everything queued.
    probe.set(true);
    let (_tx, rx) = watch::channel(false);
    let report = agent.drain_pending(rx).await.unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(ledger.pushed_ids(), vec![record.id.clone()]);
    assert!(!device.store().is_sync_pending(&record.id).unwrap());
}

// ---------------------------------------------------------------------------
// 3. Persistence Survives Restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn confirmed_state_and_sync_queue_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keypair = DeviceKeypair::generate();
    let record;

    // First session: create, confirm, queue for sync.
    {
        let store = RecordStore::open(dir.path()).expect("open store");
        let service = ConfirmationService::new(store.clone(), Arc::new(OpenGate));
        record = RecordFactory::new("sender-device")
            .create(Amount::from_major(7).unwrap(), "dave", None, &keypair)
            .unwrap();
        service.register(&record, &keypair.public_key()).unwrap();
        service.confirm(&record.id, Party::Sender).await.unwrap();
        store.enqueue_sync(&record.id).unwrap();
        store.flush().unwrap();
    }

    // Second session: everything is still there.
    let store = RecordStore::open(dir.path()).expect("reopen store");
    let stored = store.get(&record.id).unwrap().expect("record survives");
    assert!(stored.sender_verified);
    assert_eq!(stored.status(), RecordStatus::PartiallyVerified);
    assert!(store.is_sync_pending(&record.id).unwrap());
    assert_eq!(
        store.signer_key(&record.id).unwrap(),
        Some(keypair.public_key())
    );

    // And the drain can finish the job the first session never could.
    let ledger = Arc::new(RecordingLedger::default());
    let agent = SyncAgent::new(Arc::new(StaticProbe::new(true)), ledger.clone(), store)
        .with_config(fast_sync_config());
    let (_tx, rx) = watch::channel(false);
    let report = agent.drain_pending(rx).await.unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(ledger.pushed_ids(), vec![record.id]);
}

// ---------------------------------------------------------------------------
// 4. Tampering Caught at the Scan Boundary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tampered_payload_never_enters_the_store() {
    let sender = Device::new();
    let recipient = Device::new();
    let record = create_on(&sender, 25, "bob");
    let wire = codec::encode(&record, &sender.keypair.public_key());

    // An attacker bumps the amount in transit.
    let mut value: serde_json::Value = serde_json::from_str(&wire).unwrap();
    value["transaction"]["amount"] = serde_json::json!(2500.0);
    let tampered = value.to_string();

    let err = recipient.service.ingest(&tampered).unwrap_err();
    assert!(matches!(
        err,
        tessera_protocol::confirm::ConfirmError::Codec(CodecError::TamperedSignature)
    ));
    assert_eq!(recipient.store().record_count(), 0);

    // The genuine payload still goes through fine.
    recipient.service.ingest(&wire).unwrap();
    assert_eq!(recipient.store().record_count(), 1);
}

// ---------------------------------------------------------------------------
// 5. Concurrent Confirmations Converge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn independent_confirmations_converge_on_both_devices() {
    let sender = Device::new();
    let recipient = Device::new();

    // Both devices hold the pending record before anyone confirms.
    let record = create_on(&sender, 50, "bob");
    let wire = codec::encode(&record, &sender.keypair.public_key());
    recipient.service.ingest(&wire).unwrap();

    // Each party confirms on their own device, independently.
    let sender_copy = sender
        .service
        .confirm(&record.id, Party::Sender)
        .await
        .unwrap();
    let recipient_copy = recipient
        .service
        .confirm(&record.id, Party::Recipient)
        .await
        .unwrap();
    assert_eq!(sender_copy.status(), RecordStatus::PartiallyVerified);
    assert_eq!(recipient_copy.status(), RecordStatus::PartiallyVerified);

    // Exchange payloads in both directions; both stores converge.
    let to_sender = codec::encode(&recipient_copy, &sender.keypair.public_key());
    let to_recipient = codec::encode(&sender_copy, &sender.keypair.public_key());
    let sender_final = sender.service.ingest(&to_sender).unwrap();
    let recipient_final = recipient.service.ingest(&to_recipient).unwrap();

    assert_eq!(sender_final.status(), RecordStatus::Completed);
    assert_eq!(recipient_final.status(), RecordStatus::Completed);
    assert_eq!(
        sender_final.verification_timestamp,
        recipient_final.verification_timestamp,
        "both devices must agree on the earliest confirmation time"
    );
}

// ---------------------------------------------------------------------------
// 6. Push-on-Write Subscription
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscribers_hear_about_every_state_change() {
    let sender = Device::new();
    let mut events = sender.store().subscribe();

    let record = create_on(&sender, 5, "bob");
    let first = events.try_recv().expect("register publishes");
    assert_eq!(first.id, record.id);
    assert_eq!(first.status(), RecordStatus::Pending);

    sender
        .service
        .confirm(&record.id, Party::Sender)
        .await
        .unwrap();
    let second = events.try_recv().expect("confirmation publishes");
    assert!(second.sender_verified);

    // Re-ingesting the same state is a no-op and stays silent.
    let wire = codec::encode(&second, &sender.keypair.public_key());
    sender.service.ingest(&wire).unwrap();
    assert!(events.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// 7. Ledger Push Idempotency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn re_syncing_a_delivered_record_is_harmless() {
    let device = Device::new();
    let record = create_on(&device, 12, "erin");

    let ledger = Arc::new(RecordingLedger::default());
    let agent = SyncAgent::new(
        Arc::new(StaticProbe::new(true)),
        ledger.clone(),
        device.store().clone(),
    )
    .with_config(fast_sync_config());

    let key = device.keypair.public_key();
    agent.sync_record(&record, &key).await.unwrap();
    // A crash could eat the acknowledgement; the retry just pushes again.
    agent.sync_record(&record, &key).await.unwrap();

    assert_eq!(ledger.pushed_ids(), vec![record.id.clone(), record.id]);
}

// ---------------------------------------------------------------------------
// 8. Completion Notification Is Best-Effort
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completion_notification_failure_changes_nothing() {
    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn notify_completed(
            &self,
            _record: &TransferRecord,
        ) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp relay is on fire".into()))
        }
    }

    let sender = Device::new();
    let record = create_on(&sender, 30, "bob");
    sender
        .service
        .confirm(&record.id, Party::Sender)
        .await
        .unwrap();
    let completed = sender
        .service
        .confirm(&record.id, Party::Recipient)
        .await
        .unwrap();
    assert_eq!(completed.status(), RecordStatus::Completed);

    // The sink fails; the record does not care.
    notify_best_effort(&FailingSink, &completed).await;
    let stored = sender.store().get(&record.id).unwrap().unwrap();
    assert_eq!(stored.status(), RecordStatus::Completed);
}
