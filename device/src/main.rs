// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tessera Device
//!
//! Entry point for the `tessera` binary — one offline confirmation device.
//! Parses CLI arguments, initializes logging, and dispatches to one
//! subcommand per step of a transfer's life:
//!
//! - `init`    — initialize the data directory and generate a signing keypair
//! - `send`    — build, sign, and sender-confirm a transfer; print its QR payload
//! - `scan`    — ingest a QR payload scanned from the counterparty
//! - `confirm` — confirm a stored record as sender or recipient
//! - `status`  — inspect one record or the whole store
//! - `sync`    — push pending records to the shared ledger
//! - `version` — print build version information
//!
//! Log output goes to stderr; stdout carries only payload and record data,
//! so every subcommand can be piped.

mod cli;
mod ledger;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;

use tessera_protocol::codec;
use tessera_protocol::confirm::{ConfirmationGate, ConfirmationService};
use tessera_protocol::crypto::DeviceKeypair;
use tessera_protocol::notify::{notify_best_effort, LogSink};
use tessera_protocol::record::{Amount, Party, RecordFactory, RecordStatus, TransferRecord};
use tessera_protocol::store::RecordStore;
use tessera_protocol::sync::{SyncAgent, TcpProbe};

use cli::{Commands, TesseraCli};
use ledger::HttpLedgerClient;
use logging::LogFormat;

const KEY_FILE: &str = "device.key";
const NAME_FILE: &str = "device.name";
const PIN_FILE: &str = "device.pin";
const STORE_DIR: &str = "store";

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging("tessera=info,tessera_protocol=info", LogFormat::Pretty);

    let cli = TesseraCli::parse();
    let data_dir = cli.data_dir;

    match cli.command {
        Commands::Init(args) => init_device(&data_dir, args),
        Commands::Send(args) => send(&data_dir, args).await,
        Commands::Scan(args) => scan(&data_dir, args),
        Commands::Confirm(args) => confirm(&data_dir, args).await,
        Commands::Status(args) => status(&data_dir, args),
        Commands::Sync(args) => sync(&data_dir, args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// PIN gate
// ---------------------------------------------------------------------------

/// Gates confirmations on the PIN chosen at `init`, if one was chosen.
///
/// The PIN is a local convenience lock against a stray button press, not a
/// cryptographic secret — record authenticity rests on the signature alone.
struct PinGate {
    expected: Option<String>,
    provided: Option<String>,
}

#[async_trait]
impl ConfirmationGate for PinGate {
    async fn authorize(&self, _record: &TransferRecord, _party: Party) -> bool {
        match &self.expected {
            None => true,
            Some(expected) => self.provided.as_deref() == Some(expected.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

/// Initializes the device: data directory, signing keypair, optional PIN.
fn init_device(data_dir: &Path, args: cli::InitArgs) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let key_path = data_dir.join(KEY_FILE);
    if key_path.exists() {
        bail!(
            "device already initialized: {} exists (remove the data directory to start over)",
            key_path.display()
        );
    }

    let keypair = DeviceKeypair::generate();
    std::fs::write(&key_path, hex::encode(keypair.to_bytes()))
        .with_context(|| format!("failed to write device key to {}", key_path.display()))?;
    restrict_permissions(&key_path)?;

    std::fs::write(data_dir.join(NAME_FILE), &args.name)
        .context("failed to write device name")?;

    if let Some(pin) = &args.pin {
        let pin_path = data_dir.join(PIN_FILE);
        std::fs::write(&pin_path, pin).context("failed to write PIN file")?;
        restrict_permissions(&pin_path)?;
    }

    tracing::info!(
        public_key = %keypair.public_key_hex(),
        data_dir = %data_dir.display(),
        "device initialized"
    );

    println!("Device initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Device name    : {}", args.name);
    println!("  Public key     : {}", keypair.public_key_hex());
    println!(
        "  Confirmation   : {}",
        if args.pin.is_some() { "PIN required" } else { "no PIN" }
    );

    Ok(())
}

/// Builds and signs a transfer, confirms the sender side, and prints the
/// QR payload to stdout.
async fn send(data_dir: &Path, args: cli::SendArgs) -> Result<()> {
    let keypair = load_keypair(data_dir)?;
    let name = load_name(data_dir)?;
    let service = open_service(data_dir, args.pin)?;

    let amount: Amount = args
        .amount
        .parse()
        .with_context(|| format!("invalid amount {:?}", args.amount))?;

    let record = RecordFactory::new(&name)
        .create(amount, &args.to, args.description, &keypair)
        .context("failed to build transfer record")?;
    service.register(&record, &keypair.public_key())?;
    let confirmed = service.confirm(&record.id, Party::Sender).await?;
    service.store().enqueue_sync(&record.id)?;

    tracing::info!(
        id = %confirmed.id,
        amount = %confirmed.amount,
        recipient = %confirmed.recipient,
        "transfer created and sender-confirmed"
    );

    // The payload is the thing to render as a QR code.
    println!("{}", codec::encode(&confirmed, &keypair.public_key()));
    Ok(())
}

/// Ingests a scanned payload into the local store.
fn scan(data_dir: &Path, args: cli::ScanArgs) -> Result<()> {
    let payload = match args.payload {
        Some(p) => p,
        None => {
            use std::io::Read;
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read payload from stdin")?;
            buf
        }
    };

    let service = open_service(data_dir, None)?;
    let stored = service.ingest(payload.trim())?;

    tracing::info!(id = %stored.id, status = %stored.status(), "payload ingested");
    print_record(&stored)
}

/// Confirms a stored record as one of its parties.
async fn confirm(data_dir: &Path, args: cli::ConfirmArgs) -> Result<()> {
    let service = open_service(data_dir, args.pin)?;
    let updated = service.confirm(&args.id, args.party.into()).await?;

    // Each confirmation is ledger-worthy on its own; a half-verified record
    // must not wait for the other party before it can be pushed.
    service.store().enqueue_sync(&updated.id)?;

    if updated.status() == RecordStatus::Completed {
        notify_best_effort(&LogSink, &updated).await;
    }

    print_record(&updated)
}

/// Shows one record as JSON, or a summary of the whole store.
fn status(data_dir: &Path, args: cli::StatusArgs) -> Result<()> {
    let store = open_store(data_dir)?;

    match args.id {
        Some(id) => {
            let record = store
                .get(&id)?
                .with_context(|| format!("no record with id {}", id))?;
            print_record(&record)
        }
        None => {
            println!("Records stored     : {}", store.record_count());
            for s in [
                RecordStatus::Pending,
                RecordStatus::PartiallyVerified,
                RecordStatus::Completed,
            ] {
                println!("  {:<18}: {}", s.to_string(), store.count_by_status(s)?);
            }
            println!("Pending ledger push: {}", store.pending_sync()?.len());
            Ok(())
        }
    }
}

/// Drains the pending-sync queue against the configured ledger endpoint.
async fn sync(data_dir: &Path, args: cli::SyncArgs) -> Result<()> {
    let store = open_store(data_dir)?;
    let pending = store.pending_sync()?.len();
    if pending == 0 {
        println!("Nothing to sync.");
        return Ok(());
    }
    tracing::info!(pending, ledger = %args.ledger, "starting sync");

    let agent = SyncAgent::new(
        Arc::new(TcpProbe::new(args.ledger.clone())),
        Arc::new(HttpLedgerClient::new(args.ledger)),
        store,
    );

    // Ctrl+C flips the cancellation flag; the agent stops at the next
    // attempt boundary with everything undelivered still queued.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let report = agent.drain_pending(cancel_rx).await?;
    println!("Sync finished.");
    println!("  Pushed  : {}", report.pushed);
    println!("  Skipped : {}", report.skipped);
    println!("  Failed  : {}", report.failed);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("tessera  {}", env!("CARGO_PKG_VERSION"));
    println!("payload  {}", tessera_protocol::config::PAYLOAD_FORMAT);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_keypair(data_dir: &Path) -> Result<DeviceKeypair> {
    let key_path = data_dir.join(KEY_FILE);
    let hex_str = std::fs::read_to_string(&key_path).with_context(|| {
        format!(
            "failed to read device key {} (run `tessera init` first)",
            key_path.display()
        )
    })?;
    DeviceKeypair::from_hex(hex_str.trim()).context("device key file is corrupt")
}

fn load_name(data_dir: &Path) -> Result<String> {
    let name = std::fs::read_to_string(data_dir.join(NAME_FILE))
        .context("failed to read device name (run `tessera init` first)")?;
    Ok(name.trim().to_string())
}

fn open_store(data_dir: &Path) -> Result<RecordStore> {
    let path = data_dir.join(STORE_DIR);
    RecordStore::open(&path)
        .with_context(|| format!("failed to open record store at {}", path.display()))
}

fn open_service(data_dir: &Path, pin: Option<String>) -> Result<ConfirmationService> {
    let expected = match std::fs::read_to_string(data_dir.join(PIN_FILE)) {
        Ok(p) => Some(p.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e).context("failed to read PIN file"),
    };
    let gate = PinGate {
        expected,
        provided: pin,
    };
    Ok(ConfirmationService::new(open_store(data_dir)?, Arc::new(gate)))
}

fn print_record(record: &TransferRecord) -> Result<()> {
    let mut value = serde_json::to_value(record).context("record serialization failed")?;
    // The derived status is worth showing even though it is never stored.
    value["status"] = serde_json::json!(record.status().to_string());
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions on {}", path.display()))?;
    }
    Ok(())
}
