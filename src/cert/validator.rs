use crate::ca::anchors::TrustAnchors;
use crate::cert::record::CertificateRecord;
use crate::cert::serial::SerialNumber;
use crate::cert::store::CertificateStore;
use crate::keys::provider::KeyPairProvider;
use crate::revocation::RevocationRegistry;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum number of certificates in a chain (Leaf, Intermediate,
/// Root). Walks longer than this are malformed or cyclic.
pub const MAX_CHAIN_DEPTH: usize = 3;

/// Why a chain failed validation. Carries the serial of the offending
/// certificate, which for `Revoked` may be an ancestor of the leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidityReason {
    Expired { serial: SerialNumber },
    Revoked { serial: SerialNumber },
    SignatureMismatch { serial: SerialNumber },
    ChainTooLong,
}

impl fmt::Display for InvalidityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired { serial } => write!(f, "expired (serial {serial})"),
            Self::Revoked { serial } => write!(f, "revoked (serial {serial})"),
            Self::SignatureMismatch { serial } => {
                write!(f, "signature mismatch (serial {serial})")
            }
            Self::ChainTooLong => write!(f, "chain too long"),
        }
    }
}

/// Result of a chain walk. An invalid chain is a normal answer, not an
/// error; only infrastructure failures surface as `Err` elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(InvalidityReason),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    /// Process exit code for the `validate` command. Distinct from the
    /// error-taxonomy codes so scripts can tell outcomes from faults.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidationOutcome::Valid => 0,
            ValidationOutcome::Invalid(InvalidityReason::Expired { .. }) => 10,
            ValidationOutcome::Invalid(InvalidityReason::Revoked { .. }) => 11,
            ValidationOutcome::Invalid(InvalidityReason::SignatureMismatch { .. }) => 12,
            ValidationOutcome::Invalid(InvalidityReason::ChainTooLong) => 13,
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Valid => write!(f, "Valid"),
            ValidationOutcome::Invalid(reason) => write!(f, "Invalid: {reason}"),
        }
    }
}

/// Walks issuer links from a leaf to a trust anchor. Read-only; safe
/// to run concurrently with issuance and revocation, reading current
/// state per hop.
pub struct ChainValidator<'a> {
    store: &'a CertificateStore,
    registry: &'a RevocationRegistry,
    provider: &'a dyn KeyPairProvider,
}

impl<'a> ChainValidator<'a> {
    pub fn new(
        store: &'a CertificateStore,
        registry: &'a RevocationRegistry,
        provider: &'a dyn KeyPairProvider,
    ) -> Self {
        Self {
            store,
            registry,
            provider,
        }
    }

    /// Validate a certificate chain at the given instant. Per visited
    /// certificate, leaf to root: expiry, revocation, signature,
    /// anchor stop. The first failing check wins.
    pub fn validate(
        &self,
        leaf: &CertificateRecord,
        anchors: &TrustAnchors,
        at: DateTime<Utc>,
    ) -> ValidationOutcome {
        let mut current = leaf.clone();

        for _ in 0..MAX_CHAIN_DEPTH {
            if !current.in_validity_window(at) {
                return ValidationOutcome::Invalid(InvalidityReason::Expired {
                    serial: current.serial,
                });
            }

            if self.registry.is_revoked(current.serial) {
                return ValidationOutcome::Invalid(InvalidityReason::Revoked {
                    serial: current.serial,
                });
            }

            // A missing issuer record means the signature cannot be
            // attributed to any trusted key
            let issuer_key = if current.is_self_issued() {
                current.public_key.clone()
            } else {
                match self.store.get(current.issuer) {
                    Some(issuer) => issuer.public_key,
                    None => {
                        return ValidationOutcome::Invalid(InvalidityReason::SignatureMismatch {
                            serial: current.serial,
                        })
                    }
                }
            };

            let digest = Sha256::digest(current.signing_payload());
            if !self.provider.verify(&issuer_key, &digest, &current.signature) {
                return ValidationOutcome::Invalid(InvalidityReason::SignatureMismatch {
                    serial: current.serial,
                });
            }

            if anchors.contains(current.serial) {
                tracing::debug!(leaf = %leaf.serial, anchor = %current.serial, "Chain valid");
                return ValidationOutcome::Valid;
            }

            // Self-issued but not anchored: following the issuer link
            // would loop, so let the depth bound reject it
            match self.store.get(current.issuer) {
                Some(issuer) => current = issuer,
                None => {
                    return ValidationOutcome::Invalid(InvalidityReason::SignatureMismatch {
                        serial: current.serial,
                    })
                }
            }
        }

        ValidationOutcome::Invalid(InvalidityReason::ChainTooLong)
    }
}
