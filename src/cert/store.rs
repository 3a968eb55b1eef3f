use crate::cert::record::{CertificateRecord, Tier};
use crate::cert::serial::SerialNumber;
use crate::utils::errors::{CertmintError, Result};
use ordermap::OrderMap;
use parking_lot::RwLock;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Filter for store listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Tier(Tier),
    Issuer(SerialNumber),
}

impl ListFilter {
    fn matches(&self, record: &CertificateRecord) -> bool {
        match self {
            ListFilter::All => true,
            ListFilter::Tier(tier) => record.tier == *tier,
            // Roots are self-issued; don't list a root under itself
            ListFilter::Issuer(serial) => record.issuer == *serial && !record.is_self_issued(),
        }
    }
}

/// Durable serial → certificate mapping. The in-memory index preserves
/// issuance order; the backing log is append-only JSON Lines, replayed
/// on open. Records are immutable after insert.
pub struct CertificateStore {
    index: RwLock<OrderMap<SerialNumber, CertificateRecord>>,
    log_path: Option<PathBuf>,
}

impl CertificateStore {
    /// Ephemeral store with no backing file.
    pub fn in_memory() -> Self {
        Self {
            index: RwLock::new(OrderMap::new()),
            log_path: None,
        }
    }

    /// Open a store backed by the given log file, replaying any
    /// existing records.
    pub fn open(log_path: PathBuf) -> Result<Self> {
        let mut index = OrderMap::new();

        if log_path.exists() {
            let content = fs::read_to_string(&log_path)
                .map_err(|e| CertmintError::StoreUnavailable(format!("Cannot read log: {e}")))?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: CertificateRecord = serde_json::from_str(line).map_err(|e| {
                    CertmintError::StoreUnavailable(format!(
                        "Corrupt log entry at line {}: {e}",
                        line_no + 1
                    ))
                })?;
                if index.insert(record.serial, record).is_some() {
                    return Err(CertmintError::StoreUnavailable(format!(
                        "Duplicate serial in log at line {}",
                        line_no + 1
                    )));
                }
            }
            tracing::debug!(records = index.len(), path = %log_path.display(), "Store opened");
        }

        Ok(Self {
            index: RwLock::new(index),
            log_path: Some(log_path),
        })
    }

    /// Insert a freshly issued record. The log append is the commit
    /// point; on failure nothing is observable in the index.
    pub fn put(&self, record: CertificateRecord) -> Result<()> {
        let mut index = self.index.write();
        if index.contains_key(&record.serial) {
            return Err(CertmintError::DuplicateSerial(record.serial));
        }

        if let Some(path) = &self.log_path {
            let line = serde_json::to_string(&record)?;
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| CertmintError::StoreUnavailable(format!("Cannot open log: {e}")))?;
            writeln!(file, "{line}")
                .map_err(|e| CertmintError::StoreUnavailable(format!("Append failed: {e}")))?;
        }

        index.insert(record.serial, record);
        Ok(())
    }

    pub fn get(&self, serial: SerialNumber) -> Option<CertificateRecord> {
        self.index.read().get(&serial).cloned()
    }

    pub fn contains(&self, serial: SerialNumber) -> bool {
        self.index.read().contains_key(&serial)
    }

    /// Iterate matching records in issuance order. The iterator works
    /// over a snapshot, so it stays finite and restartable while
    /// issuance continues concurrently.
    pub fn list(&self, filter: ListFilter) -> impl Iterator<Item = CertificateRecord> {
        let snapshot: Vec<CertificateRecord> = self
            .index
            .read()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        snapshot.into_iter()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Highest serial present, for resuming the allocator on reopen.
    pub fn highest_serial(&self) -> u64 {
        self.index
            .read()
            .keys()
            .map(|s| s.value())
            .max()
            .unwrap_or(0)
    }
}
