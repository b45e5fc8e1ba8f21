//! # Key Management
//!
//! Ed25519 keypair generation and serialization for TESSERA devices.
//!
//! Every device that creates records holds exactly one signing keypair.
//! The public half travels inside every QR payload the device emits, so the
//! scanning side can verify the record without any prior key exchange —
//! there is no network to exchange keys over, that's the whole point.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (thanks, ed25519-dalek).
//! - Key generation uses the OS CSPRNG (`OsRng`). If your OS RNG is broken,
//!   you have bigger problems than TESSERA.
//! - Secret key bytes are never logged and never appear in `Debug` output.
//!   If you add logging to this module, you will be asked to leave.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during key operations.
///
/// Intentionally vague about *why* something failed — leaking details about
/// key material through error messages is a classic footgun.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or malformed encoding")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignature,
}

/// A device's Ed25519 signing keypair.
///
/// This is the atomic unit of identity in the protocol: a record is trusted
/// exactly as far as the signature this key produced over it.
///
/// ## Serialization
///
/// `DeviceKeypair` intentionally does NOT implement `Serialize` /
/// `Deserialize`. Serializing a private key should be a deliberate,
/// conscious act, not something that happens because someone shoved a
/// keypair into a JSON response. Use [`to_bytes`](Self::to_bytes) /
/// [`from_bytes`](Self::from_bytes) explicitly.
///
/// # Examples
///
/// ```
/// use tessera_protocol::crypto::DeviceKeypair;
///
/// let kp = DeviceKeypair::generate();
/// let sig = kp.sign(b"25.00 to bob");
/// assert!(kp.public_key().verify(b"25.00 to bob", &sig));
/// ```
pub struct DeviceKeypair {
    signing_key: SigningKey,
}

/// The public half of a device identity, safe to share with the world.
///
/// This is what rides along in the QR payload so the other device can check
/// the record's signature. Losing it is inconvenient but not catastrophic —
/// it can always be re-derived from the signing key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePublicKey {
    bytes: [u8; 32],
}

/// An Ed25519 signature over a record's canonical bytes.
///
/// 64 bytes, deterministic for a given (key, message) pair. Stored as
/// `Vec<u8>` for serde compatibility, but always exactly 64 bytes when
/// produced by us. Hand-crafted shorter ones don't panic anything — they
/// just fail verification with a boolean `false`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSignature {
    bytes: Vec<u8>,
}

impl DeviceKeypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Construct a keypair deterministically from a 32-byte seed.
    ///
    /// In Ed25519 the 32-byte secret key *is* the seed. Useful for deriving
    /// device identities from a KDF or a recovery phrase.
    ///
    /// **Warning**: a weak seed makes a weak key. Use a proper CSPRNG or KDF.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from raw 32-byte secret key material.
    pub fn from_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self::from_seed(secret)
    }

    /// Reconstruct a keypair from a hex-encoded secret key.
    ///
    /// Convenience for loading the key file a device writes at init time.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_bytes(&arr))
    }

    /// Returns the public key associated with this keypair.
    pub fn public_key(&self) -> DevicePublicKey {
        DevicePublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message and return a [`DeviceSignature`].
    ///
    /// Ed25519 signatures are deterministic — same key, same message, same
    /// signature. No nonce management, no RNG at signing time, no sleepless
    /// nights wondering whether your entropy pool was warm.
    pub fn sign(&self, message: &[u8]) -> DeviceSignature {
        let sig = self.signing_key.sign(message);
        DeviceSignature {
            bytes: sig.to_bytes().to_vec(),
        }
    }

    /// Exports the raw 32-byte secret key material.
    ///
    /// **Handle with extreme care.** This is the only secret standing
    /// between an attacker and the device's signing authority. Don't log it,
    /// don't ship it over the network, don't paste it into a bug report.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Hex-encoded public key, the form embedded in QR payloads.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }
}

impl Clone for DeviceKeypair {
    /// Cloning a keypair is allowed but should make you uncomfortable.
    /// Every copy of a private key is another thing to protect.
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for DeviceKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material in debug output. Not even
        // "partially" — a partial leak is still a leak.
        write!(f, "DeviceKeypair(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for DeviceKeypair {
    /// Two keypairs are equal if their public keys match. Comparing secret
    /// material in a non-constant-time way is a habit we refuse to form.
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for DeviceKeypair {}

// ---------------------------------------------------------------------------
// DevicePublicKey
// ---------------------------------------------------------------------------

impl DevicePublicKey {
    /// Create a public key from raw bytes, validating that they represent a
    /// real Ed25519 point. We don't accept arbitrary 32 bytes — low-order
    /// points and other degenerate cases are rejected here, not discovered
    /// later during verification.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Parse a hex-encoded public key, as carried in a QR payload.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verify a signature against this public key.
    ///
    /// Returns `true` if the signature is valid, `false` otherwise. A
    /// boolean rather than a `Result` because callers want a yes/no answer —
    /// and per the verification contract, "malformed" and "forged" must be
    /// indistinguishable to whoever handed us the payload.
    pub fn verify(&self, message: &[u8], signature: &DeviceSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig_bytes: [u8; 64] = match signature.bytes.as_slice().try_into() {
            Ok(b) => b,
            Err(_) => return false,
        };
        let dalek_sig = DalekSignature::from_bytes(&sig_bytes);
        verifying_key.verify(message, &dalek_sig).is_ok()
    }

    /// Hex-encoded representation. 64 characters for 32 bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Display for DevicePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for DevicePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevicePublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// DeviceSignature
// ---------------------------------------------------------------------------

impl DeviceSignature {
    /// Create a signature from raw 64-byte representation.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Parse a hex-encoded signature, as carried on a record.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != 64 {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self { bytes })
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex-encoded signature. 128 characters for a valid one.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for DeviceSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for DeviceSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "DeviceSignature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "DeviceSignature({})", hex_str)
        }
    }
}
