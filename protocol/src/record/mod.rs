//! # Record Module
//!
//! Construction, signing, verification, and confirmation lifecycle for
//! TESSERA transfer records. A record is the unit of value the protocol
//! moves between two devices.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — Amount, RecordStatus, Party value types
//! factory.rs      — TransferRecord, canonical bytes, and the RecordFactory
//! signing.rs      — Record signing with Ed25519 keypairs
//! verification.rs — Signature verification over canonical bytes
//! machine.rs      — The dual-flag verification state machine
//! ```
//!
//! ## Record Lifecycle
//!
//! 1. **Create** — [`RecordFactory`] validates the inputs, stamps identity
//!    and time, and signs the record in one step.
//! 2. **Export** — the record travels inside a [`crate::codec::QrPayload`].
//! 3. **Verify** — the scanning device checks the signature with
//!    [`verify_record`] before trusting a single field.
//! 4. **Confirm** — each party flips its own flag through the
//!    [`VerificationStateMachine`]; `Completed` is terminal.
//!
//! ## Design Decisions
//!
//! - Record IDs are opaque UUIDv4 strings. They carry no structure and no
//!   hash commitment — tamper evidence comes from the signature, which
//!   covers the id along with every other economic field.
//! - Amounts are integer minor units internally. No floating point anywhere
//!   near monetary comparisons; the wire format's decimal number is parsed
//!   exactly or rejected.
//! - The canonical byte encoding excludes the signature and both
//!   verification flags, so a confirmation never invalidates the original
//!   signature.

pub mod factory;
pub mod machine;
pub mod signing;
pub mod types;
pub mod verification;

pub use factory::{RecordError, RecordFactory, TransferRecord};
pub use machine::{ConfirmationEvent, MachineError, VerificationStateMachine};
pub use signing::sign_record;
pub use types::{Amount, AmountError, Party, RecordStatus};
pub use verification::verify_record;
