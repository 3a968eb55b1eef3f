use crate::utils::errors::{CertmintError, Result};
use rsa::pkcs1::{
    DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding,
};
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

/// Supported RSA modulus sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum KeyBits {
    Bits2048,
    Bits3072,
    Bits4096,
}

impl KeyBits {
    pub const ALL: &'static [KeyBits] = &[KeyBits::Bits2048, KeyBits::Bits3072, KeyBits::Bits4096];

    pub fn bits(&self) -> usize {
        match self {
            KeyBits::Bits2048 => 2048,
            KeyBits::Bits3072 => 3072,
            KeyBits::Bits4096 => 4096,
        }
    }

    pub fn from_modulus_bits(bits: usize) -> Option<Self> {
        match bits {
            2048 => Some(KeyBits::Bits2048),
            3072 => Some(KeyBits::Bits3072),
            4096 => Some(KeyBits::Bits4096),
            _ => None,
        }
    }

    pub fn profile(&self) -> SecurityProfile {
        match self {
            KeyBits::Bits2048 => SecurityProfile {
                security_bits: 112,
                label: "Standard Security",
                horizon: "Through 2030",
                recommended_use: "General purpose, TLS leaf certificates",
            },
            KeyBits::Bits3072 => SecurityProfile {
                security_bits: 128,
                label: "High Security",
                horizon: "Beyond 2030",
                recommended_use: "Long-lived intermediate certificates",
            },
            KeyBits::Bits4096 => SecurityProfile {
                security_bits: 152,
                label: "Maximum Security",
                horizon: "Beyond 2030",
                recommended_use: "Root certificates, high-value signing keys",
            },
        }
    }
}

impl fmt::Display for KeyBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl FromStr for KeyBits {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bits: usize = s
            .parse()
            .map_err(|_| format!("Invalid key size: {s} (expected 2048, 3072, or 4096)"))?;
        Self::from_modulus_bits(bits)
            .ok_or_else(|| format!("Unsupported key size: {bits} (expected 2048, 3072, or 4096)"))
    }
}

impl TryFrom<u32> for KeyBits {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        Self::from_modulus_bits(value as usize)
            .ok_or_else(|| format!("Unsupported key size: {value}"))
    }
}

impl From<KeyBits> for u32 {
    fn from(bits: KeyBits) -> u32 {
        bits.bits() as u32
    }
}

/// NIST SP 800-57 strength estimate for a key size.
#[derive(Debug, Clone, Copy)]
pub struct SecurityProfile {
    pub security_bits: u32,
    pub label: &'static str,
    pub horizon: &'static str,
    pub recommended_use: &'static str,
}

/// A freshly generated key pair. Key material travels as PKCS#1 DER.
pub struct GeneratedKeyPair {
    pub bits: KeyBits,
    pub public_der: Vec<u8>,
    pub private_der: Vec<u8>,
}

/// RSA operations consumed by the CA and the chain validator. The rest
/// of the crate treats key material as opaque DER blobs behind this
/// trait; nothing outside this module touches the `rsa` crate.
pub trait KeyPairProvider: Send + Sync {
    fn generate(&self, bits: KeyBits) -> Result<GeneratedKeyPair>;

    /// Structural validation: well-formed PKCS#1 DER, odd public
    /// exponent, modulus of the expected size (any catalog size when
    /// `bits` is `None`).
    fn validate_public_key(&self, public_der: &[u8], bits: Option<KeyBits>) -> bool;

    /// PKCS#1 v1.5 signature over a SHA-256 digest.
    fn sign(&self, private_der: &[u8], digest: &[u8]) -> Result<Vec<u8>>;

    fn verify(&self, public_der: &[u8], digest: &[u8], signature: &[u8]) -> bool;

    /// OAEP encryption, used only by the key self-test.
    fn encrypt(&self, public_der: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, private_der: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Provider backed by the `rsa` crate.
#[derive(Debug, Default)]
pub struct RsaKeyPairProvider;

impl RsaKeyPairProvider {
    pub fn new() -> Self {
        Self
    }

    fn private_key(der: &[u8]) -> Result<RsaPrivateKey> {
        RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| CertmintError::Crypto(format!("Malformed private key: {e}")))
    }

    fn public_key(der: &[u8]) -> Result<RsaPublicKey> {
        RsaPublicKey::from_pkcs1_der(der)
            .map_err(|e| CertmintError::Crypto(format!("Malformed public key: {e}")))
    }
}

impl KeyPairProvider for RsaKeyPairProvider {
    fn generate(&self, bits: KeyBits) -> Result<GeneratedKeyPair> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, bits.bits())
            .map_err(|e| CertmintError::Crypto(format!("Key generation failed: {e}")))?;
        let public = private.to_public_key();

        let private_der = private
            .to_pkcs1_der()
            .map_err(|e| CertmintError::Crypto(format!("Private key encoding failed: {e}")))?
            .as_bytes()
            .to_vec();
        let public_der = public
            .to_pkcs1_der()
            .map_err(|e| CertmintError::Crypto(format!("Public key encoding failed: {e}")))?
            .as_bytes()
            .to_vec();

        Ok(GeneratedKeyPair {
            bits,
            public_der,
            private_der,
        })
    }

    fn validate_public_key(&self, public_der: &[u8], bits: Option<KeyBits>) -> bool {
        let Ok(key) = RsaPublicKey::from_pkcs1_der(public_der) else {
            return false;
        };

        let odd_exponent = key
            .e()
            .to_bytes_le()
            .first()
            .map(|b| b % 2 == 1)
            .unwrap_or(false);
        if !odd_exponent {
            return false;
        }

        match (KeyBits::from_modulus_bits(key.n().bits()), bits) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn sign(&self, private_der: &[u8], digest: &[u8]) -> Result<Vec<u8>> {
        let key = Self::private_key(private_der)?;
        key.sign(Pkcs1v15Sign::new::<Sha256>(), digest)
            .map_err(|e| CertmintError::Crypto(format!("Signing failed: {e}")))
    }

    fn verify(&self, public_der: &[u8], digest: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = RsaPublicKey::from_pkcs1_der(public_der) else {
            return false;
        };
        key.verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature)
            .is_ok()
    }

    fn encrypt(&self, public_der: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = Self::public_key(public_der)?;
        let mut rng = rand::thread_rng();
        key.encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| CertmintError::Crypto(format!("OAEP encryption failed: {e}")))
    }

    fn decrypt(&self, private_der: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let key = Self::private_key(private_der)?;
        key.decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|e| CertmintError::Crypto(format!("OAEP decryption failed: {e}")))
    }
}

/// Catalog size of a stored public key, if it parses.
pub fn public_key_bits(public_der: &[u8]) -> Option<KeyBits> {
    let key = RsaPublicKey::from_pkcs1_der(public_der).ok()?;
    KeyBits::from_modulus_bits(key.n().bits())
}

/// Render a PKCS#1 DER public key as PEM.
pub fn public_key_to_pem(public_der: &[u8]) -> Result<String> {
    let key = RsaKeyPairProvider::public_key(public_der)?;
    key.to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| CertmintError::Crypto(format!("PEM encoding failed: {e}")))
}

/// Render a PKCS#1 DER private key as PEM.
pub fn private_key_to_pem(private_der: &[u8]) -> Result<String> {
    let key = RsaKeyPairProvider::private_key(private_der)?;
    let pem = key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| CertmintError::Crypto(format!("PEM encoding failed: {e}")))?;
    Ok(pem.to_string())
}

/// Parse a public key PEM, accepting both PKCS#1 ("RSA PUBLIC KEY") and
/// SPKI ("PUBLIC KEY") headers, into PKCS#1 DER.
pub fn public_key_from_pem(pem: &str) -> Result<Vec<u8>> {
    let key = RsaPublicKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
        .map_err(|e| CertmintError::InvalidKeyMaterial(format!("Unparseable public key: {e}")))?;
    Ok(key
        .to_pkcs1_der()
        .map_err(|e| CertmintError::Crypto(format!("Public key encoding failed: {e}")))?
        .as_bytes()
        .to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest;

    fn test_pair() -> GeneratedKeyPair {
        RsaKeyPairProvider::new().generate(KeyBits::Bits2048).unwrap()
    }

    #[test]
    fn test_key_bits_catalog() {
        assert_eq!(KeyBits::Bits2048.bits(), 2048);
        assert_eq!(KeyBits::from_modulus_bits(3072), Some(KeyBits::Bits3072));
        assert_eq!(KeyBits::from_modulus_bits(1024), None);
        assert_eq!("4096".parse::<KeyBits>().unwrap(), KeyBits::Bits4096);
        assert!("512".parse::<KeyBits>().is_err());
        assert!("rsa".parse::<KeyBits>().is_err());
    }

    #[test]
    fn test_security_profiles() {
        assert_eq!(KeyBits::Bits2048.profile().security_bits, 112);
        assert_eq!(KeyBits::Bits3072.profile().security_bits, 128);
        assert_eq!(KeyBits::Bits4096.profile().security_bits, 152);
        assert_eq!(KeyBits::Bits2048.profile().horizon, "Through 2030");
    }

    #[test]
    fn test_generate_and_validate() {
        let provider = RsaKeyPairProvider::new();
        let pair = test_pair();

        assert!(provider.validate_public_key(&pair.public_der, Some(KeyBits::Bits2048)));
        assert!(provider.validate_public_key(&pair.public_der, None));
        // Wrong advertised size
        assert!(!provider.validate_public_key(&pair.public_der, Some(KeyBits::Bits4096)));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let provider = RsaKeyPairProvider::new();
        assert!(!provider.validate_public_key(b"not a key", None));
        assert!(!provider.validate_public_key(&[], None));

        // Truncated DER from a real key
        let pair = test_pair();
        let truncated = &pair.public_der[..pair.public_der.len() / 2];
        assert!(!provider.validate_public_key(truncated, None));
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let provider = RsaKeyPairProvider::new();
        let pair = test_pair();
        let digest = sha2::Sha256::digest(b"to-be-signed bytes");

        let signature = provider.sign(&pair.private_der, &digest).unwrap();
        assert!(provider.verify(&pair.public_der, &digest, &signature));

        let other_digest = sha2::Sha256::digest(b"different bytes");
        assert!(!provider.verify(&pair.public_der, &other_digest, &signature));

        let other_pair = test_pair();
        assert!(!provider.verify(&other_pair.public_der, &digest, &signature));
    }

    #[test]
    fn test_oaep_round_trip() {
        let provider = RsaKeyPairProvider::new();
        let pair = test_pair();
        let probe = b"certmint OAEP self-test probe";

        let ciphertext = provider.encrypt(&pair.public_der, probe).unwrap();
        assert_ne!(&ciphertext[..], &probe[..]);

        let recovered = provider.decrypt(&pair.private_der, &ciphertext).unwrap();
        assert_eq!(recovered, probe);
    }

    #[test]
    fn test_pem_round_trip() {
        let pair = test_pair();

        let pem = public_key_to_pem(&pair.public_der).unwrap();
        assert!(pem.contains("BEGIN RSA PUBLIC KEY"));
        assert_eq!(public_key_from_pem(&pem).unwrap(), pair.public_der);

        let key_pem = private_key_to_pem(&pair.private_der).unwrap();
        assert!(key_pem.contains("BEGIN RSA PRIVATE KEY"));
    }

    #[test]
    fn test_pem_rejects_garbage() {
        assert!(matches!(
            public_key_from_pem("-----BEGIN NONSENSE-----\n-----END NONSENSE-----\n"),
            Err(CertmintError::InvalidKeyMaterial(_))
        ));
    }
}
