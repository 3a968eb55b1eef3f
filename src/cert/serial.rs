use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// A certificate serial number. Allocated sequentially, rendered as
/// 16-digit zero-padded hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber(u64);

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerialParseError {
    #[error("Empty string provided")]
    EmptyString,

    #[error("Invalid digit: {0}")]
    InvalidDigit(char),

    #[error("Serial number out of range")]
    OutOfRange,
}

pub type Result<T> = std::result::Result<T, SerialParseError>;

impl SerialNumber {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Parse a serial identifier. Accepts the 16-digit hex form this tool
    /// prints, `0x`-prefixed hex, or a plain decimal number.
    pub fn parse(identifier: &str) -> Result<Self> {
        if identifier.is_empty() {
            return Err(SerialParseError::EmptyString);
        }

        let (digits, radix) = match identifier
            .strip_prefix("0x")
            .or_else(|| identifier.strip_prefix("0X"))
        {
            Some(rest) => (rest, 16),
            None if identifier.len() == 16
                && identifier.chars().all(|c| c.is_ascii_hexdigit()) =>
            {
                (identifier, 16)
            }
            None => (identifier, 10),
        };

        match u64::from_str_radix(digits, radix) {
            Ok(value) => Ok(Self(value)),
            Err(e) => match e.kind() {
                IntErrorKind::Empty => Err(SerialParseError::EmptyString),
                IntErrorKind::PosOverflow => Err(SerialParseError::OutOfRange),
                _ => {
                    let bad = digits
                        .chars()
                        .find(|c| !c.is_digit(radix))
                        .unwrap_or('?');
                    Err(SerialParseError::InvalidDigit(bad))
                }
            },
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Hex form without zero padding, for compact log output.
    pub fn as_short_hex(&self) -> String {
        format!("{:x}", self.0)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for SerialNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for SerialNumber {
    type Err = SerialParseError;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for SerialNumber {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SerialNumber {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SerialNumber::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Hands out strictly increasing serial numbers. The single point of
/// mutual exclusion in the issuance path.
#[derive(Debug)]
pub struct SerialAllocator {
    next: AtomicU64,
}

impl SerialAllocator {
    /// Allocator whose first serial is `highest + 1`. Pass the highest
    /// serial already present in the store (0 for an empty store) so
    /// serials are never reused across restarts.
    pub fn starting_after(highest: u64) -> Self {
        Self {
            next: AtomicU64::new(highest + 1),
        }
    }

    pub fn allocate(&self) -> SerialNumber {
        SerialNumber(self.next.fetch_add(1, Ordering::SeqCst))
    }
}
