//! Core value types for TESSERA records.
//!
//! These types form the vocabulary of every transfer the protocol moves.
//! They are intentionally small and `Copy`-friendly where possible.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::MAX_AMOUNT_MINOR;

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Errors from constructing or parsing an [`Amount`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    /// The value is NaN or infinite. JSON technically can't express these,
    /// but parsers are creative and we are not.
    #[error("amount is not a finite number")]
    NotFinite,

    /// Zero or negative. A transfer of nothing is not a transfer.
    #[error("amount must be > 0")]
    NotPositive,

    /// More than two fractional digits. We reject rather than round — a
    /// silently rounded amount would sign differently on each device.
    #[error("amount has more than {0} decimal places", crate::config::AMOUNT_DECIMALS)]
    TooPrecise,

    /// Exceeds [`MAX_AMOUNT_MINOR`].
    #[error("amount exceeds the protocol maximum")]
    TooLarge,

    /// The string form couldn't be parsed as a decimal number at all.
    #[error("malformed amount: {0}")]
    Malformed(String),
}

/// A positive monetary amount in integer minor units (two decimals).
///
/// `minor = 2500` means 25.00. The integer representation is what gets
/// signed; the decimal rendering only exists at the wire and display edges.
/// This keeps canonical bytes deterministic — no locale, no float formatting,
/// no "25.000000000000004".
///
/// # Examples
///
/// ```
/// use tessera_protocol::record::Amount;
///
/// let a = Amount::from_minor(2500).unwrap();
/// assert_eq!(a.to_string(), "25.00");
/// assert_eq!("25.00".parse::<Amount>().unwrap(), a);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    minor: u64,
}

impl Amount {
    /// Creates an amount from integer minor units.
    pub fn from_minor(minor: u64) -> Result<Self, AmountError> {
        if minor == 0 {
            return Err(AmountError::NotPositive);
        }
        if minor > MAX_AMOUNT_MINOR {
            return Err(AmountError::TooLarge);
        }
        Ok(Self { minor })
    }

    /// Creates an amount from whole major units (e.g. `25` → 25.00).
    pub fn from_major(major: u64) -> Result<Self, AmountError> {
        major
            .checked_mul(100)
            .ok_or(AmountError::TooLarge)
            .and_then(Self::from_minor)
    }

    /// Converts a decimal number (the QR wire representation) exactly.
    ///
    /// Rejects non-finite values, non-positive values, and anything with
    /// sub-cent precision. There is no epsilon to tune: the candidate minor
    /// count is projected back through the same `minor / 100.0` mapping that
    /// produced the wire value, and the two must be bit-identical. Within
    /// [`MAX_AMOUNT_MINOR`] that mapping is injective, so the check accepts
    /// exactly the f64s a genuine amount can serialize to.
    pub fn try_from_decimal(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() {
            return Err(AmountError::NotFinite);
        }
        if value <= 0.0 {
            return Err(AmountError::NotPositive);
        }
        let rounded = (value * 100.0).round();
        if rounded > MAX_AMOUNT_MINOR as f64 {
            return Err(AmountError::TooLarge);
        }
        let minor = rounded as u64;
        if minor as f64 / 100.0 != value {
            return Err(AmountError::TooPrecise);
        }
        Self::from_minor(minor)
    }

    /// The amount in minor units. This is what canonical bytes encode.
    pub fn minor_units(&self) -> u64 {
        self.minor
    }

    /// The decimal number used on the wire.
    pub fn to_decimal(&self) -> f64 {
        self.minor as f64 / 100.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.minor / 100, self.minor % 100)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parses `"25"`, `"25.5"`, or `"25.00"` without going through floats.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AmountError::Malformed(s.to_string());
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac.len() > 2 {
            return Err(AmountError::TooPrecise);
        }
        if whole.is_empty() {
            return Err(malformed());
        }
        let whole: u64 = whole.parse().map_err(|_| malformed())?;
        let frac: u64 = if frac.is_empty() {
            0
        } else {
            // "5" means 50 cents, "05" means 5.
            let parsed: u64 = frac.parse().map_err(|_| malformed())?;
            if frac.len() == 1 {
                parsed * 10
            } else {
                parsed
            }
        };
        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac))
            .ok_or(AmountError::TooLarge)
            .and_then(Self::from_minor)
    }
}

// The wire format carries a bare JSON number (`"amount": 25.0`), so Amount
// serializes as a decimal and re-validates on the way back in.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Amount::try_from_decimal(value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// RecordStatus
// ---------------------------------------------------------------------------

/// Derived lifecycle state of a record.
///
/// Never stored — always recomputed from the two verification flags, so it
/// cannot drift from the truth it summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Neither party has confirmed yet.
    Pending,
    /// Exactly one party has confirmed.
    PartiallyVerified,
    /// Both parties have confirmed. Terminal.
    Completed,
}

impl RecordStatus {
    /// Recomputes the status from the two verification flags.
    pub fn from_flags(sender_verified: bool, recipient_verified: bool) -> Self {
        match (sender_verified, recipient_verified) {
            (true, true) => Self::Completed,
            (false, false) => Self::Pending,
            _ => Self::PartiallyVerified,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::PartiallyVerified => write!(f, "partially_verified"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Party
// ---------------------------------------------------------------------------

/// Which side of the transfer a confirmation event speaks for.
///
/// Each party may only flip its own flag; the state machine and the
/// authorization gate are both keyed on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// The party whose funds leave.
    Sender,
    /// The party whose funds arrive.
    Recipient,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Recipient => write!(f, "recipient"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
