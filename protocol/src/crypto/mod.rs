//! # Cryptographic Primitives for TESSERA
//!
//! Everything security-related flows through here: the keypair a device
//! signs records with, the public key it embeds in QR payloads, and the
//! signatures the receiving device checks before trusting a single field.
//!
//! We deliberately chose boring, well-audited cryptography: **Ed25519** via
//! `ed25519-dalek`. Deterministic signatures, constant-time implementations,
//! nobody has broken it. If you're tempted to swap in something more exotic,
//! go read about timing attacks and come back when you've lost the urge.

pub mod keys;

pub use keys::{DeviceKeypair, DevicePublicKey, DeviceSignature, KeyError};
