use crate::cert::serial::SerialNumber;
use crate::utils::output::GetColumnValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

/// Position of a certificate in the trust chain. Each tier may only
/// issue certificates of the tier directly below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Root = 0,
    Intermediate = 1,
    Leaf = 2,
}

impl Tier {
    /// The tier this tier is allowed to issue, if any.
    pub fn child(&self) -> Option<Tier> {
        match self {
            Tier::Root => Some(Tier::Intermediate),
            Tier::Intermediate => Some(Tier::Leaf),
            Tier::Leaf => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Root => "root",
            Tier::Intermediate => "intermediate",
            Tier::Leaf => "leaf",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "root" => Ok(Tier::Root),
            "intermediate" => Ok(Tier::Intermediate),
            "leaf" => Ok(Tier::Leaf),
            _ => Err(format!("Invalid tier: {s}")),
        }
    }
}

/// Validity interval of a certificate. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl ValidityWindow {
    /// Window opening now and closing `days` days later.
    pub fn starting_now(days: u32) -> Self {
        let now = Utc::now();
        Self {
            not_before: now,
            not_after: now + chrono::Duration::days(days as i64),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

mod b64 {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

/// Version tag mixed into every signed byte string, so signatures from a
/// future encoding revision can never verify against this one.
const SIGNING_DOMAIN: &[u8] = b"certmint-tbs-v1";

/// An issued certificate. Immutable once stored; revocation is tracked
/// separately so the record survives for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub serial: SerialNumber,
    pub subject: String,
    pub issuer: SerialNumber,
    pub tier: Tier,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Subject public key, PKCS#1 DER.
    #[serde(with = "b64")]
    pub public_key: Vec<u8>,
    /// PKCS#1 v1.5 signature over `signing_payload()` by the issuer key.
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
    /// SHA-256 of `signing_payload()`, hex.
    pub fingerprint: String,
}

impl CertificateRecord {
    /// The byte string the issuer signs. Variable-length fields are
    /// length-prefixed so distinct records can never encode to the same
    /// bytes; timestamps are second-precision UTC.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(
            SIGNING_DOMAIN.len() + self.subject.len() + self.public_key.len() + 64,
        );
        payload.extend_from_slice(SIGNING_DOMAIN);
        payload.extend_from_slice(&self.serial.value().to_be_bytes());
        payload.extend_from_slice(&(self.subject.len() as u32).to_be_bytes());
        payload.extend_from_slice(self.subject.as_bytes());
        payload.extend_from_slice(&(self.public_key.len() as u32).to_be_bytes());
        payload.extend_from_slice(&self.public_key);
        payload.extend_from_slice(&self.not_before.timestamp().to_be_bytes());
        payload.extend_from_slice(&self.not_after.timestamp().to_be_bytes());
        payload.push(self.tier as u8);
        payload.extend_from_slice(&self.issuer.value().to_be_bytes());
        payload
    }

    pub fn compute_fingerprint(payload: &[u8]) -> String {
        hex::encode(Sha256::digest(payload))
    }

    pub fn is_self_issued(&self) -> bool {
        self.serial == self.issuer
    }

    pub fn in_validity_window(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.not_after
    }

    pub fn expires_soon(&self, days: u32) -> bool {
        let threshold = Utc::now() + chrono::Duration::days(days as i64);
        self.not_after <= threshold
    }
}

impl fmt::Display for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Serial: {}, Subject: {}, Tier: {}, Expires: {}",
            self.serial,
            self.subject,
            self.tier,
            self.not_after.format("%Y-%m-%d %H:%M")
        )
    }
}

#[derive(Debug, Clone)]
pub enum ListColumn {
    Serial,
    Subject,
    Issuer,
    Tier,
    NotBefore,
    NotAfter,
    Fingerprint,
    Revoked,
    Expired,
}

impl FromStr for ListColumn {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "subject" => Ok(Self::Subject),
            "issuer" => Ok(Self::Issuer),
            "tier" => Ok(Self::Tier),
            "not_before" => Ok(Self::NotBefore),
            "not_after" => Ok(Self::NotAfter),
            "fingerprint" => Ok(Self::Fingerprint),
            "revoked" | "r" => Ok(Self::Revoked),
            "expired" | "e" => Ok(Self::Expired),
            _ => Err(format!("Invalid column: {s}")),
        }
    }
}

impl ListColumn {
    /// Column names accepted by `--columns`, used by shell completion.
    pub const NAMES: &'static [&'static str] = &[
        "serial",
        "subject",
        "issuer",
        "tier",
        "not_before",
        "not_after",
        "fingerprint",
        "revoked",
        "expired",
    ];

    const DEFAULTS: &'static [&'static str] = &["serial", "subject", "tier", "not_after", "revoked"];

    pub fn header(&self) -> &'static str {
        match self {
            Self::Serial => "Serial",
            Self::Subject => "Subject",
            Self::Issuer => "Issuer",
            Self::Tier => "Tier",
            Self::NotBefore => "Not Before",
            Self::NotAfter => "Not After",
            Self::Fingerprint => "Fingerprint",
            Self::Revoked => "R",
            Self::Expired => "E",
        }
    }

    /// Parse a `--columns` value. `None` yields the defaults; a spec
    /// starting with `+` appends to them.
    pub fn parse_spec(spec: Option<&str>) -> std::result::Result<Vec<ListColumn>, String> {
        let names: Vec<&str> = match spec {
            None => Self::DEFAULTS.to_vec(),
            Some(spec) if spec.starts_with('+') => {
                let mut names = Self::DEFAULTS.to_vec();
                names.extend(
                    spec[1..]
                        .split(',')
                        .map(|s| s.trim())
                        .filter(|s| !s.is_empty()),
                );
                names
            }
            Some(spec) => spec
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        names.into_iter().map(|name| name.parse()).collect()
    }
}

/// A certificate paired with its revocation flag, for table output.
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub record: CertificateRecord,
    pub revoked: bool,
}

impl GetColumnValue for ListEntry {
    fn get_column_value(&self, column: &ListColumn) -> String {
        match column {
            ListColumn::Serial => self.record.serial.to_string(),
            ListColumn::Subject => self.record.subject.clone(),
            ListColumn::Issuer => self.record.issuer.to_string(),
            ListColumn::Tier => self.record.tier.to_string(),
            ListColumn::NotBefore => {
                self.record.not_before.format("%Y-%m-%d %H:%M").to_string()
            }
            ListColumn::NotAfter => self.record.not_after.format("%Y-%m-%d %H:%M").to_string(),
            ListColumn::Fingerprint => self.record.fingerprint.clone(),
            ListColumn::Revoked => {
                if self.revoked {
                    "✗".to_string()
                } else {
                    " ".to_string()
                }
            }
            ListColumn::Expired => {
                if self.record.is_expired() {
                    "✗".to_string()
                } else {
                    " ".to_string()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_record() -> CertificateRecord {
        CertificateRecord {
            serial: SerialNumber::new(2),
            subject: "branch-42".to_string(),
            issuer: SerialNumber::new(1),
            tier: Tier::Leaf,
            not_before: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap(),
            public_key: vec![0x30, 0x82, 0x01, 0x0a],
            signature: vec![0xde, 0xad, 0xbe, 0xef],
            fingerprint: "ab".repeat(32),
        }
    }

    #[test]
    fn test_tier_issuing_rules() {
        assert_eq!(Tier::Root.child(), Some(Tier::Intermediate));
        assert_eq!(Tier::Intermediate.child(), Some(Tier::Leaf));
        assert_eq!(Tier::Leaf.child(), None);
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("root".parse::<Tier>().unwrap(), Tier::Root);
        assert_eq!("Intermediate".parse::<Tier>().unwrap(), Tier::Intermediate);
        assert_eq!("LEAF".parse::<Tier>().unwrap(), Tier::Leaf);
        assert!("ca".parse::<Tier>().is_err());
    }

    #[test]
    fn test_validity_window_bounds_inclusive() {
        let record = test_record();
        assert!(record.in_validity_window(record.not_before));
        assert!(record.in_validity_window(record.not_after));
        assert!(!record.in_validity_window(record.not_before - chrono::Duration::seconds(1)));
        assert!(!record.in_validity_window(record.not_after + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_signing_payload_is_deterministic() {
        let record = test_record();
        assert_eq!(record.signing_payload(), record.signing_payload());
    }

    #[test]
    fn test_signing_payload_binds_every_field() {
        let base = test_record();
        let payload = base.signing_payload();

        let mut changed = base.clone();
        changed.serial = SerialNumber::new(3);
        assert_ne!(changed.signing_payload(), payload);

        let mut changed = base.clone();
        changed.subject = "branch-43".to_string();
        assert_ne!(changed.signing_payload(), payload);

        let mut changed = base.clone();
        changed.tier = Tier::Intermediate;
        assert_ne!(changed.signing_payload(), payload);

        let mut changed = base.clone();
        changed.issuer = SerialNumber::new(9);
        assert_ne!(changed.signing_payload(), payload);

        let mut changed = base.clone();
        changed.not_after = base.not_after + chrono::Duration::days(1);
        assert_ne!(changed.signing_payload(), payload);

        // Signature is over the payload, never part of it
        let mut changed = base.clone();
        changed.signature = vec![0xff];
        assert_eq!(changed.signing_payload(), payload);
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = test_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: CertificateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);

        // Binary fields travel as base64 strings
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["public_key"].is_string());
        assert!(value["signature"].is_string());
    }

    #[test]
    fn test_self_issued() {
        let mut record = test_record();
        assert!(!record.is_self_issued());
        record.issuer = record.serial;
        assert!(record.is_self_issued());
    }

    #[test]
    fn test_column_spec_defaults() {
        let columns = ListColumn::parse_spec(None).unwrap();
        assert_eq!(columns.len(), 5);
        assert!(matches!(columns[0], ListColumn::Serial));
        assert!(matches!(columns[4], ListColumn::Revoked));
    }

    #[test]
    fn test_column_spec_append() {
        let columns = ListColumn::parse_spec(Some("+issuer,fingerprint")).unwrap();
        assert_eq!(columns.len(), 7);
        assert!(matches!(columns[5], ListColumn::Issuer));
        assert!(matches!(columns[6], ListColumn::Fingerprint));
    }

    #[test]
    fn test_column_spec_explicit_and_invalid() {
        let columns = ListColumn::parse_spec(Some("serial,e")).unwrap();
        assert_eq!(columns.len(), 2);
        assert!(matches!(columns[1], ListColumn::Expired));

        assert!(ListColumn::parse_spec(Some("serial,bogus")).is_err());
    }

    #[test]
    fn test_revoked_column_marker() {
        let entry = ListEntry {
            record: test_record(),
            revoked: true,
        };
        assert_eq!(entry.get_column_value(&ListColumn::Revoked), "✗");

        let entry = ListEntry {
            record: test_record(),
            revoked: false,
        };
        assert_eq!(entry.get_column_value(&ListColumn::Revoked), " ");
    }
}
