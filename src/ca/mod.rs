pub mod anchors;
pub mod authority;
pub mod config;

pub use anchors::TrustAnchors;
pub use authority::CertificateAuthority;
pub use config::CaConfig;
