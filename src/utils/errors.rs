use crate::cert::serial::{SerialNumber, SerialParseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertmintError {
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Issuer not trusted: {0}")]
    IssuerNotTrusted(String),

    #[error("Tier violation: {0}")]
    TierViolation(String),

    #[error("Duplicate certificate serial: {0}")]
    DuplicateSerial(SerialNumber),

    #[error("Unknown certificate serial: {0}")]
    UnknownSerial(SerialNumber),

    #[error("Certificate store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Key store error: {0}")]
    KeyStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Invalid serial number: {0}")]
    Serial(#[from] SerialParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CertmintError {
    /// Process exit code for this error. Issuance and store failures keep
    /// stable codes so scripts can tell them apart; everything else is 1.
    /// Code 2 is left to clap for usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidKeyMaterial(_) => 3,
            Self::IssuerNotTrusted(_) => 4,
            Self::TierViolation(_) => 5,
            Self::DuplicateSerial(_) => 6,
            Self::UnknownSerial(_) => 7,
            Self::StoreUnavailable(_) => 8,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CertmintError>;
