use crate::ca::anchors::TrustAnchors;
use crate::cert::record::CertificateRecord;
use crate::cert::serial::SerialNumber;
use crate::cert::store::{CertificateStore, ListFilter};
use crate::revocation::{RevocationEntry, RevocationRegistry};
use crate::utils::errors::{CertmintError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current export encoding revision. Bumped on any field change so an
/// import can refuse documents it does not understand.
pub const FORMAT_VERSION: u32 = 1;

/// Self-describing snapshot of a CA's certificates, revocations, and
/// trust anchors, for audit and CRL-style export. Lossless: importing
/// a bundle reproduces identical store, registry, and anchor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBundle {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub certificates: Vec<CertificateRecord>,
    pub revocations: Vec<RevocationEntry>,
    pub trust_anchors: Vec<SerialNumber>,
}

impl ExportBundle {
    /// Snapshot the given state in issuance order.
    pub fn gather(
        store: &CertificateStore,
        registry: &RevocationRegistry,
        anchors: &TrustAnchors,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            exported_at: Utc::now(),
            certificates: store.list(ListFilter::All).collect(),
            revocations: registry.entries(),
            trust_anchors: anchors.serials(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let bundle: ExportBundle = serde_json::from_str(content)
            .map_err(|e| CertmintError::Export(format!("Malformed bundle: {e}")))?;

        if bundle.format_version != FORMAT_VERSION {
            return Err(CertmintError::Export(format!(
                "Unsupported format version {} (this build understands {FORMAT_VERSION})",
                bundle.format_version
            )));
        }
        Ok(bundle)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Write to a file, or stdout when no path is given.
    pub fn write_to(&self, output: Option<&Path>) -> Result<()> {
        let json = self.to_json()?;
        match output {
            Some(path) => {
                fs::write(path, &json)?;
                eprintln!("✓ Bundle written to: {}", path.display());
            }
            None => println!("{json}"),
        }
        Ok(())
    }

    /// Merge this bundle into the given state, skipping certificates
    /// and revocations already present. Returns (certificates added,
    /// revocations added).
    pub fn apply(
        &self,
        store: &CertificateStore,
        registry: &RevocationRegistry,
        anchors: &TrustAnchors,
    ) -> Result<(usize, usize)> {
        let mut certs_added = 0;
        for record in &self.certificates {
            if !store.contains(record.serial) {
                store.put(record.clone())?;
                certs_added += 1;
            }
        }

        let mut revocations_added = 0;
        for entry in &self.revocations {
            if registry.revoke(entry.serial, &entry.reason, entry.revoked_at)? {
                revocations_added += 1;
            }
        }

        for serial in &self.trust_anchors {
            anchors.add(*serial)?;
        }

        tracing::info!(
            certificates = certs_added,
            revocations = revocations_added,
            "Bundle imported"
        );
        Ok((certs_added, revocations_added))
    }
}
