use crate::ca::anchors::TrustAnchors;
use crate::cert::record::{CertificateRecord, Tier, ValidityWindow};
use crate::cert::serial::{SerialAllocator, SerialNumber};
use crate::cert::store::CertificateStore;
use crate::cert::validator::{ChainValidator, ValidationOutcome};
use crate::keys::keystore::KeyStore;
use crate::keys::provider::{GeneratedKeyPair, KeyBits, KeyPairProvider};
use crate::revocation::RevocationRegistry;
use crate::utils::errors::{CertmintError, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Issues, revokes, and validates certificates over an explicit
/// store, registry, and anchor set. Multiple independent instances can
/// coexist; nothing here is global.
pub struct CertificateAuthority {
    store: Arc<CertificateStore>,
    registry: Arc<RevocationRegistry>,
    anchors: Arc<TrustAnchors>,
    provider: Arc<dyn KeyPairProvider>,
    keystore: KeyStore,
    allocator: SerialAllocator,
}

impl CertificateAuthority {
    pub fn new(
        store: Arc<CertificateStore>,
        registry: Arc<RevocationRegistry>,
        anchors: Arc<TrustAnchors>,
        provider: Arc<dyn KeyPairProvider>,
        keystore: KeyStore,
    ) -> Self {
        let allocator = SerialAllocator::starting_after(store.highest_serial());
        Self {
            store,
            registry,
            anchors,
            provider,
            keystore,
            allocator,
        }
    }

    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    pub fn registry(&self) -> &RevocationRegistry {
        &self.registry
    }

    pub fn anchors(&self) -> &TrustAnchors {
        &self.anchors
    }

    pub fn provider(&self) -> &dyn KeyPairProvider {
        self.provider.as_ref()
    }

    /// Bootstrap a new root: generate its key pair, self-sign, store
    /// the record, register the serial as a trust anchor, and keep the
    /// private key. Each root self-issues exactly once, here; `issue`
    /// refuses the Root tier.
    pub fn issue_root(
        &self,
        subject: &str,
        bits: KeyBits,
        window: ValidityWindow,
    ) -> Result<CertificateRecord> {
        let pair = self.provider.generate(bits)?;
        let serial = self.allocator.allocate();

        let record = self.sign_record(
            serial,
            subject,
            &pair.public_der,
            serial,
            Tier::Root,
            window,
            &pair.private_der,
        )?;

        self.keystore.store_private_key(serial, &pair.private_der)?;
        self.store.put(record.clone())?;
        self.anchors.add(serial)?;
        tracing::info!(serial = %serial, subject = %subject, "Root certificate issued");
        Ok(record)
    }

    /// Issue a certificate over a subject-supplied public key. The
    /// issuer must be known, non-revoked, non-expired, and of the tier
    /// directly above; the subject key must pass structural
    /// validation. The store write is the single commit point.
    pub fn issue(
        &self,
        subject: &str,
        subject_public_key: &[u8],
        tier: Tier,
        window: ValidityWindow,
        issuer_serial: SerialNumber,
    ) -> Result<CertificateRecord> {
        let issuer = self.check_issuer(issuer_serial, tier)?;

        if !self.provider.validate_public_key(subject_public_key, None) {
            return Err(CertmintError::InvalidKeyMaterial(format!(
                "Subject public key for '{subject}' failed structural validation"
            )));
        }

        let issuer_private = self.keystore.load_private_key(issuer.serial)?;
        let serial = self.allocator.allocate();

        let record = self.sign_record(
            serial,
            subject,
            subject_public_key,
            issuer.serial,
            tier,
            window,
            &issuer_private,
        )?;

        self.store.put(record.clone())?;
        tracing::info!(
            serial = %serial,
            subject = %subject,
            tier = %tier,
            issuer = %issuer.serial,
            "Certificate issued"
        );
        Ok(record)
    }

    /// Issue over a freshly generated key pair, returning the pair so
    /// the caller can hand the private half to the subject. For
    /// intermediates the private key is also kept, since this CA will
    /// sign leaves with it; leaf keys are the subject's alone.
    pub fn issue_generated(
        &self,
        subject: &str,
        bits: KeyBits,
        tier: Tier,
        window: ValidityWindow,
        issuer_serial: SerialNumber,
    ) -> Result<(CertificateRecord, GeneratedKeyPair)> {
        let pair = self.provider.generate(bits)?;
        let record = self.issue(subject, &pair.public_der, tier, window, issuer_serial)?;

        if tier == Tier::Intermediate {
            self.keystore.store_private_key(record.serial, &pair.private_der)?;
        }

        Ok((record, pair))
    }

    /// Revoke a certificate. The serial must exist; revoking an
    /// already-revoked serial succeeds without a second entry.
    pub fn revoke(&self, serial: SerialNumber, reason: &str) -> Result<()> {
        if !self.store.contains(serial) {
            return Err(CertmintError::UnknownSerial(serial));
        }

        let newly_added = self.registry.revoke(serial, reason, Utc::now())?;
        if !newly_added {
            tracing::debug!(serial = %serial, "Serial already revoked; no-op");
        }
        Ok(())
    }

    /// Validate a stored certificate against this CA's anchors.
    pub fn validate(&self, serial: SerialNumber, at: DateTime<Utc>) -> Result<ValidationOutcome> {
        let record = self
            .store
            .get(serial)
            .ok_or(CertmintError::UnknownSerial(serial))?;

        let validator = ChainValidator::new(&self.store, &self.registry, self.provider.as_ref());
        Ok(validator.validate(&record, &self.anchors, at))
    }

    fn check_issuer(&self, issuer_serial: SerialNumber, tier: Tier) -> Result<CertificateRecord> {
        let issuer = self.store.get(issuer_serial).ok_or_else(|| {
            CertmintError::IssuerNotTrusted(format!("Unknown issuer serial {issuer_serial}"))
        })?;

        if self.registry.is_revoked(issuer_serial) {
            return Err(CertmintError::IssuerNotTrusted(format!(
                "Issuer {issuer_serial} is revoked"
            )));
        }

        if !issuer.in_validity_window(Utc::now()) {
            return Err(CertmintError::IssuerNotTrusted(format!(
                "Issuer {issuer_serial} is outside its validity window"
            )));
        }

        if tier == Tier::Root {
            return Err(CertmintError::TierViolation(
                "Root certificates are created only by bootstrap".to_string(),
            ));
        }

        if issuer.tier.child() != Some(tier) {
            return Err(CertmintError::TierViolation(format!(
                "A {} certificate cannot issue a {} certificate",
                issuer.tier, tier
            )));
        }

        Ok(issuer)
    }

    #[allow(clippy::too_many_arguments)]
    fn sign_record(
        &self,
        serial: SerialNumber,
        subject: &str,
        subject_public_key: &[u8],
        issuer_serial: SerialNumber,
        tier: Tier,
        window: ValidityWindow,
        signing_key: &[u8],
    ) -> Result<CertificateRecord> {
        let mut record = CertificateRecord {
            serial,
            subject: subject.to_string(),
            issuer: issuer_serial,
            tier,
            not_before: window.not_before,
            not_after: window.not_after,
            public_key: subject_public_key.to_vec(),
            signature: Vec::new(),
            fingerprint: String::new(),
        };

        let payload = record.signing_payload();
        let digest = Sha256::digest(&payload);
        record.signature = self.provider.sign(signing_key, &digest)?;
        record.fingerprint = CertificateRecord::compute_fingerprint(&payload);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::provider::RsaKeyPairProvider;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn memory_ca() -> CertificateAuthority {
        CertificateAuthority::new(
            Arc::new(CertificateStore::in_memory()),
            Arc::new(RevocationRegistry::in_memory()),
            Arc::new(TrustAnchors::in_memory()),
            Arc::new(RsaKeyPairProvider::new()),
            KeyStore::in_memory(),
        )
    }

    fn window(days: u32) -> ValidityWindow {
        ValidityWindow::starting_now(days)
    }

    #[test]
    fn test_issue_root_bootstraps_anchor() {
        let ca = memory_ca();
        let root = ca.issue_root("root", KeyBits::Bits2048, window(3650)).unwrap();

        assert_eq!(root.tier, Tier::Root);
        assert!(root.is_self_issued());
        assert!(ca.anchors().contains(root.serial));
        assert!(ca.store().contains(root.serial));
        assert_eq!(ca.validate(root.serial, Utc::now()).unwrap(), ValidationOutcome::Valid);
    }

    #[test]
    fn test_multiple_independent_roots() {
        let ca = memory_ca();
        let r1 = ca.issue_root("root-a", KeyBits::Bits2048, window(3650)).unwrap();
        let r2 = ca.issue_root("root-b", KeyBits::Bits2048, window(3650)).unwrap();

        assert_ne!(r1.serial, r2.serial);
        assert!(ca.anchors().contains(r1.serial));
        assert!(ca.anchors().contains(r2.serial));
    }

    #[test]
    fn test_tier_rules_enforced() {
        let ca = memory_ca();
        let root = ca.issue_root("root", KeyBits::Bits2048, window(3650)).unwrap();
        let pair = ca.provider().generate(KeyBits::Bits2048).unwrap();

        // Leaf directly under root skips the intermediate tier
        let err = ca
            .issue("leaf", &pair.public_der, Tier::Leaf, window(365), root.serial)
            .unwrap_err();
        assert!(matches!(err, CertmintError::TierViolation(_)));

        // A second root cannot be issued through the normal path
        let err = ca
            .issue("root-2", &pair.public_der, Tier::Root, window(3650), root.serial)
            .unwrap_err();
        assert!(matches!(err, CertmintError::TierViolation(_)));

        // Leaves issue nothing
        let (leaf, _) = {
            let (int, _) = ca
                .issue_generated("int", KeyBits::Bits2048, Tier::Intermediate, window(365), root.serial)
                .unwrap();
            ca.issue_generated("leaf", KeyBits::Bits2048, Tier::Leaf, window(30), int.serial)
                .unwrap()
        };
        let err = ca
            .issue("sub-leaf", &pair.public_der, Tier::Leaf, window(30), leaf.serial)
            .unwrap_err();
        assert!(matches!(err, CertmintError::TierViolation(_)));
    }

    #[test]
    fn test_unknown_issuer() {
        let ca = memory_ca();
        let pair = ca.provider().generate(KeyBits::Bits2048).unwrap();

        let err = ca
            .issue("sub", &pair.public_der, Tier::Intermediate, window(365), SerialNumber::new(99))
            .unwrap_err();
        assert!(matches!(err, CertmintError::IssuerNotTrusted(_)));
    }

    #[test]
    fn test_revoked_issuer_refused() {
        let ca = memory_ca();
        let root = ca.issue_root("root", KeyBits::Bits2048, window(3650)).unwrap();
        ca.revoke(root.serial, "ceremony botched").unwrap();

        let pair = ca.provider().generate(KeyBits::Bits2048).unwrap();
        let err = ca
            .issue("int", &pair.public_der, Tier::Intermediate, window(365), root.serial)
            .unwrap_err();
        assert!(matches!(err, CertmintError::IssuerNotTrusted(_)));
    }

    #[test]
    fn test_invalid_key_material_refused() {
        let ca = memory_ca();
        let root = ca.issue_root("root", KeyBits::Bits2048, window(3650)).unwrap();

        let err = ca
            .issue("int", b"garbage", Tier::Intermediate, window(365), root.serial)
            .unwrap_err();
        assert!(matches!(err, CertmintError::InvalidKeyMaterial(_)));
        // Nothing partial was stored
        assert_eq!(ca.store().len(), 1);
    }

    #[test]
    fn test_revoke_unknown_serial() {
        let ca = memory_ca();
        let err = ca.revoke(SerialNumber::new(12), "whatever").unwrap_err();
        assert!(matches!(err, CertmintError::UnknownSerial(_)));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let ca = memory_ca();
        let root = ca.issue_root("root", KeyBits::Bits2048, window(3650)).unwrap();

        ca.revoke(root.serial, "first").unwrap();
        ca.revoke(root.serial, "second").unwrap();

        assert_eq!(ca.registry().len(), 1);
        assert_eq!(ca.registry().reason_for(root.serial).unwrap().reason, "first");
    }

    #[test]
    fn test_serials_strictly_increase() {
        let ca = memory_ca();
        let root = ca.issue_root("root", KeyBits::Bits2048, window(3650)).unwrap();
        let (i1, _) = ca
            .issue_generated("int-1", KeyBits::Bits2048, Tier::Intermediate, window(365), root.serial)
            .unwrap();
        let (i2, _) = ca
            .issue_generated("int-2", KeyBits::Bits2048, Tier::Intermediate, window(365), root.serial)
            .unwrap();

        assert!(root.serial < i1.serial);
        assert!(i1.serial < i2.serial);
    }

    #[test]
    fn test_concurrent_issuance_unique_serials() {
        let ca = Arc::new(memory_ca());
        let root = ca.issue_root("root", KeyBits::Bits2048, window(3650)).unwrap();

        // Reuse one subject key so each thread skips key generation
        let pair = ca.provider().generate(KeyBits::Bits2048).unwrap();
        let public_der = Arc::new(pair.public_der);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let ca = Arc::clone(&ca);
                let public_der = Arc::clone(&public_der);
                std::thread::spawn(move || {
                    (0..5)
                        .map(|i| {
                            ca.issue(
                                &format!("int-{t}-{i}"),
                                &public_der,
                                Tier::Intermediate,
                                window(365),
                                root.serial,
                            )
                            .unwrap()
                            .serial
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for serial in handle.join().unwrap() {
                assert!(seen.insert(serial), "serial {serial} issued twice");
            }
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_reopen_resumes_serials() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("certs.jsonl");
        let anchors_path = dir.path().join("anchors.json");

        let first_root_serial = {
            let ca = CertificateAuthority::new(
                Arc::new(CertificateStore::open(log.clone()).unwrap()),
                Arc::new(RevocationRegistry::in_memory()),
                Arc::new(TrustAnchors::open(anchors_path.clone()).unwrap()),
                Arc::new(RsaKeyPairProvider::new()),
                KeyStore::in_memory(),
            );
            ca.issue_root("root", KeyBits::Bits2048, window(3650)).unwrap().serial
        };

        let ca = CertificateAuthority::new(
            Arc::new(CertificateStore::open(log).unwrap()),
            Arc::new(RevocationRegistry::in_memory()),
            Arc::new(TrustAnchors::open(anchors_path).unwrap()),
            Arc::new(RsaKeyPairProvider::new()),
            KeyStore::in_memory(),
        );
        let second = ca.issue_root("root-2", KeyBits::Bits2048, window(3650)).unwrap();

        assert!(second.serial > first_root_serial);
        assert!(ca.anchors().contains(first_root_serial));
    }
}
