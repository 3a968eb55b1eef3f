use crate::cert::serial::SerialNumber;
use crate::utils::errors::{CertmintError, Result};
use chrono::{DateTime, Utc};
use ordermap::OrderMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// A revoked certificate. Entries are append-only and never removed,
/// so the registry doubles as the audit trail for CRL-style export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub serial: SerialNumber,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
}

/// Tracks revoked serials. Insert-if-absent under the write lock:
/// presence is monotonic, the first writer's reason is kept, and
/// racing revokers all observe success.
pub struct RevocationRegistry {
    entries: RwLock<OrderMap<SerialNumber, RevocationEntry>>,
    log_path: Option<PathBuf>,
}

impl RevocationRegistry {
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(OrderMap::new()),
            log_path: None,
        }
    }

    /// Open a registry backed by the given JSON Lines log, replaying
    /// any existing entries. Duplicate lines for one serial collapse
    /// to the first, matching the insert-if-absent rule.
    pub fn open(log_path: PathBuf) -> Result<Self> {
        let mut entries = OrderMap::new();

        if log_path.exists() {
            let content = fs::read_to_string(&log_path)
                .map_err(|e| CertmintError::StoreUnavailable(format!("Cannot read log: {e}")))?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: RevocationEntry = serde_json::from_str(line).map_err(|e| {
                    CertmintError::StoreUnavailable(format!(
                        "Corrupt revocation entry at line {}: {e}",
                        line_no + 1
                    ))
                })?;
                entries.entry(entry.serial).or_insert(entry);
            }
        }

        Ok(Self {
            entries: RwLock::new(entries),
            log_path: Some(log_path),
        })
    }

    /// Revoke a serial. Returns `true` if the entry was newly added,
    /// `false` if the serial was already revoked (a success, not an
    /// error).
    pub fn revoke(&self, serial: SerialNumber, reason: &str, at: DateTime<Utc>) -> Result<bool> {
        if reason.trim().is_empty() {
            return Err(CertmintError::InvalidInput(
                "Revocation reason must not be empty".to_string(),
            ));
        }

        let mut entries = self.entries.write();
        if entries.contains_key(&serial) {
            return Ok(false);
        }

        let entry = RevocationEntry {
            serial,
            reason: reason.to_string(),
            revoked_at: at,
        };

        if let Some(path) = &self.log_path {
            let line = serde_json::to_string(&entry)?;
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| CertmintError::StoreUnavailable(format!("Cannot open log: {e}")))?;
            writeln!(file, "{line}")
                .map_err(|e| CertmintError::StoreUnavailable(format!("Append failed: {e}")))?;
        }

        entries.insert(serial, entry);
        tracing::info!(serial = %serial, reason = %reason, "Certificate revoked");
        Ok(true)
    }

    pub fn is_revoked(&self, serial: SerialNumber) -> bool {
        self.entries.read().contains_key(&serial)
    }

    pub fn reason_for(&self, serial: SerialNumber) -> Option<RevocationEntry> {
        self.entries.read().get(&serial).cloned()
    }

    /// All entries in revocation order.
    pub fn entries(&self) -> Vec<RevocationEntry> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
