use crate::cert::serial::SerialNumber;
use crate::utils::errors::{CertmintError, Result};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

/// The set of Root serials trusted a priori. Grows only through root
/// bootstrap and import; members are never removed at runtime.
pub struct TrustAnchors {
    serials: RwLock<BTreeSet<SerialNumber>>,
    path: Option<PathBuf>,
}

impl TrustAnchors {
    pub fn in_memory() -> Self {
        Self {
            serials: RwLock::new(BTreeSet::new()),
            path: None,
        }
    }

    pub fn open(path: PathBuf) -> Result<Self> {
        let serials = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| CertmintError::StoreUnavailable(format!("Cannot read anchors: {e}")))?;
            serde_json::from_str(&content)?
        } else {
            BTreeSet::new()
        };

        Ok(Self {
            serials: RwLock::new(serials),
            path: Some(path),
        })
    }

    pub fn add(&self, serial: SerialNumber) -> Result<()> {
        let mut serials = self.serials.write();
        serials.insert(serial);
        self.persist(&serials)
    }

    pub fn contains(&self, serial: SerialNumber) -> bool {
        self.serials.read().contains(&serial)
    }

    pub fn serials(&self) -> Vec<SerialNumber> {
        self.serials.read().iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.serials.read().is_empty()
    }

    fn persist(&self, serials: &BTreeSet<SerialNumber>) -> Result<()> {
        if let Some(path) = &self.path {
            let content = serde_json::to_string_pretty(serials)?;
            fs::write(path, content)
                .map_err(|e| CertmintError::StoreUnavailable(format!("Cannot write anchors: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_and_contains() {
        let anchors = TrustAnchors::in_memory();
        assert!(anchors.is_empty());

        anchors.add(SerialNumber::new(1)).unwrap();
        assert!(anchors.contains(SerialNumber::new(1)));
        assert!(!anchors.contains(SerialNumber::new(2)));
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anchors.json");

        {
            let anchors = TrustAnchors::open(path.clone()).unwrap();
            anchors.add(SerialNumber::new(1)).unwrap();
            anchors.add(SerialNumber::new(8)).unwrap();
        }

        let reopened = TrustAnchors::open(path).unwrap();
        assert!(reopened.contains(SerialNumber::new(1)));
        assert!(reopened.contains(SerialNumber::new(8)));
        assert_eq!(reopened.serials().len(), 2);
    }
}
