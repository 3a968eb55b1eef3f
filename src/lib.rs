pub mod ca;
pub mod cert;
pub mod cli;
pub mod keys;
pub mod revocation;
pub mod utils;

// Re-export specific items to avoid conflicts
pub use ca::{CaConfig, CertificateAuthority, TrustAnchors};
pub use cert::{
    CertificateRecord, CertificateStore, ChainValidator, SerialNumber, Tier, ValidationOutcome,
};
pub use cli::{args, commands};
pub use keys::{KeyBits, KeyPairProvider, KeyStore, RsaKeyPairProvider};
pub use revocation::RevocationRegistry;
pub use utils::{errors, paths};
