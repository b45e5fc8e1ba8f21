//! # CLI Interface
//!
//! Defines the command-line argument structure for the `tessera` binary
//! using `clap` derive. One subcommand per step of a transfer's life:
//! `init`, `send`, `scan`, `confirm`, `status`, `sync`, and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tessera_protocol::record::Party;

/// Tessera offline payment confirmation device.
///
/// Builds, signs, and confirms transfer records entirely offline, exchanges
/// them with the counterparty as QR payloads, and pushes completed records
/// to the shared ledger whenever connectivity allows.
#[derive(Parser, Debug)]
#[command(
    name = "tessera",
    about = "Tessera offline payment confirmation device",
    version,
    propagate_version = true
)]
pub struct TesseraCli {
    /// Path to the device data directory where the store and keys live.
    ///
    /// Created by `init`; every other subcommand expects it to exist.
    #[arg(long, short = 'd', env = "TESSERA_DATA_DIR", default_value = "~/.tessera", global = true)]
    pub data_dir: PathBuf,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the device binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the device — creates the data directory, generates a
    /// fresh signing keypair, and optionally sets a confirmation PIN.
    Init(InitArgs),
    /// Build and sign a new transfer, confirm it as sender, and print the
    /// QR payload to stdout.
    Send(SendArgs),
    /// Ingest a scanned QR payload (from an argument or stdin).
    Scan(ScanArgs),
    /// Confirm a stored record as one of its parties.
    Confirm(ConfirmArgs),
    /// Show one record, or a summary of everything stored.
    Status(StatusArgs),
    /// Push pending records to the shared ledger.
    Sync(SyncArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Name this device signs records as — the `sender` field of every
    /// transfer it creates.
    #[arg(long, short = 'n', default_value = "device")]
    pub name: String,

    /// Confirmation PIN to require before any party confirmation on this
    /// device. Omit it and confirmations need no PIN.
    #[arg(long, env = "TESSERA_PIN")]
    pub pin: Option<String>,
}

/// Arguments for the `send` subcommand.
#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Transfer amount as a decimal, e.g. `25.00`. At most two decimal
    /// places.
    #[arg(long, short = 'a')]
    pub amount: String,

    /// Name of the party receiving the transfer.
    #[arg(long, short = 't')]
    pub to: String,

    /// Free-form description shown to the counterparty.
    #[arg(long)]
    pub description: Option<String>,

    /// Confirmation PIN, if the device was initialized with one.
    #[arg(long, env = "TESSERA_PIN")]
    pub pin: Option<String>,
}

/// Arguments for the `scan` subcommand.
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// The QR payload string. When omitted, the payload is read from stdin
    /// (so a hardware scanner can be piped straight in).
    pub payload: Option<String>,
}

/// Which side of the transfer is confirming.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum PartyArg {
    Sender,
    Recipient,
}

impl From<PartyArg> for Party {
    fn from(value: PartyArg) -> Self {
        match value {
            PartyArg::Sender => Party::Sender,
            PartyArg::Recipient => Party::Recipient,
        }
    }
}

/// Arguments for the `confirm` subcommand.
#[derive(Parser, Debug)]
pub struct ConfirmArgs {
    /// Id of the record to confirm.
    #[arg(long, short = 'i')]
    pub id: String,

    /// Which party is confirming.
    #[arg(long = "as", value_enum)]
    pub party: PartyArg,

    /// Confirmation PIN, if the device was initialized with one.
    #[arg(long, env = "TESSERA_PIN")]
    pub pin: Option<String>,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Show a single record as JSON instead of the summary.
    #[arg(long, short = 'i')]
    pub id: Option<String>,
}

/// Arguments for the `sync` subcommand.
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Ledger endpoint as `host:port`.
    #[arg(long, env = "TESSERA_LEDGER", default_value = "127.0.0.1:9650")]
    pub ledger: String,
}
