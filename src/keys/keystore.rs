use crate::cert::serial::SerialNumber;
use crate::utils::errors::{CertmintError, Result};
use aes_gcm::{
    aead::Aead,
    Aes256Gcm, Key, KeyInit, Nonce,
};
use parking_lot::RwLock;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const PASSPHRASE_ENV: &str = "CERTMINT_PASSPHRASE";
const NONCE_LEN: usize = 12;

enum Backend {
    /// Plaintext map, for tests and ephemeral CAs.
    Memory(RwLock<HashMap<SerialNumber, Vec<u8>>>),
    /// Encrypted files under a directory, one per serial.
    Disk { dir: PathBuf, passphrase: String },
}

/// At-rest storage for CA private keys. Disk-backed keys are encrypted
/// with AES-256-GCM under a key derived from the operator passphrase
/// and a per-serial context; the 12-byte nonce is prefixed to the
/// ciphertext.
pub struct KeyStore {
    backend: Backend,
}

impl KeyStore {
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(RwLock::new(HashMap::new())),
        }
    }

    pub fn open(dir: PathBuf, passphrase: String) -> Result<Self> {
        crate::utils::paths::ensure_dir_exists(&dir)?;
        Ok(Self {
            backend: Backend::Disk { dir, passphrase },
        })
    }

    /// Read the operator passphrase from the environment, falling back
    /// to an interactive prompt.
    pub fn read_passphrase() -> Result<String> {
        if let Ok(passphrase) = std::env::var(PASSPHRASE_ENV) {
            if !passphrase.is_empty() {
                return Ok(passphrase);
            }
        }
        rpassword::prompt_password("Key store passphrase: ")
            .map_err(|e| CertmintError::KeyStore(format!("Failed to read passphrase: {e}")))
    }

    pub fn store_private_key(&self, serial: SerialNumber, private_der: &[u8]) -> Result<()> {
        match &self.backend {
            Backend::Memory(map) => {
                map.write().insert(serial, private_der.to_vec());
                Ok(())
            }
            Backend::Disk { dir, passphrase } => {
                let encrypted = encrypt(passphrase, &key_context(serial), private_der)?;
                let path = key_file(dir, serial);
                fs::write(&path, encrypted)
                    .map_err(|e| CertmintError::KeyStore(format!("Failed to write key: {e}")))?;
                crate::utils::set_secure_file_permissions(&path)?;
                tracing::debug!(serial = %serial, "Private key stored encrypted");
                Ok(())
            }
        }
    }

    pub fn load_private_key(&self, serial: SerialNumber) -> Result<Vec<u8>> {
        match &self.backend {
            Backend::Memory(map) => map.read().get(&serial).cloned().ok_or_else(|| {
                CertmintError::KeyStore(format!("No private key held for serial {serial}"))
            }),
            Backend::Disk { dir, passphrase } => {
                let path = key_file(dir, serial);
                let encrypted = fs::read(&path).map_err(|_| {
                    CertmintError::KeyStore(format!("No private key held for serial {serial}"))
                })?;
                decrypt(passphrase, &key_context(serial), &encrypted)
            }
        }
    }

    pub fn holds_key(&self, serial: SerialNumber) -> bool {
        match &self.backend {
            Backend::Memory(map) => map.read().contains_key(&serial),
            Backend::Disk { dir, .. } => key_file(dir, serial).exists(),
        }
    }
}

fn key_file(dir: &std::path::Path, serial: SerialNumber) -> PathBuf {
    dir.join(format!("{serial}.key.enc"))
}

fn key_context(serial: SerialNumber) -> String {
    format!("certmint-key-{serial}")
}

/// Derive a context-specific 256-bit key from the passphrase.
fn derive_key(passphrase: &str, context: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    hasher.update(context.as_bytes());
    let result = hasher.finalize();

    let mut derived = [0u8; 32];
    derived.copy_from_slice(&result);
    derived
}

fn create_cipher(key: &[u8; 32]) -> Aes256Gcm {
    let key = Key::<Aes256Gcm>::from_slice(key);
    Aes256Gcm::new(key)
}

fn encrypt(passphrase: &str, context: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = create_cipher(&derive_key(passphrase, context));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CertmintError::KeyStore(format!("Encryption failed: {e}")))?;

    // Prepend nonce to ciphertext for storage
    let mut encrypted = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    encrypted.extend_from_slice(&nonce_bytes);
    encrypted.extend_from_slice(&ciphertext);
    Ok(encrypted)
}

fn decrypt(passphrase: &str, context: &str, encrypted: &[u8]) -> Result<Vec<u8>> {
    if encrypted.len() < NONCE_LEN {
        return Err(CertmintError::KeyStore("Encrypted key too short".to_string()));
    }

    let cipher = create_cipher(&derive_key(passphrase, context));
    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher.decrypt(nonce, ciphertext).map_err(|_| {
        CertmintError::KeyStore("Decryption failed (wrong passphrase or corrupted file)".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_round_trip() {
        let store = KeyStore::in_memory();
        let serial = SerialNumber::new(1);

        assert!(!store.holds_key(serial));
        store.store_private_key(serial, b"private material").unwrap();
        assert!(store.holds_key(serial));
        assert_eq!(store.load_private_key(serial).unwrap(), b"private material");
    }

    #[test]
    fn test_missing_key() {
        let store = KeyStore::in_memory();
        assert!(matches!(
            store.load_private_key(SerialNumber::new(9)),
            Err(CertmintError::KeyStore(_))
        ));
    }

    #[test]
    fn test_disk_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = KeyStore::open(dir.path().to_path_buf(), "hunter2".to_string()).unwrap();
        let serial = SerialNumber::new(7);

        store.store_private_key(serial, b"private material").unwrap();
        assert!(store.holds_key(serial));

        // File on disk is not plaintext
        let raw = std::fs::read(dir.path().join(format!("{serial}.key.enc"))).unwrap();
        assert!(!raw.windows(b"private material".len()).any(|w| w == b"private material"));

        assert_eq!(store.load_private_key(serial).unwrap(), b"private material");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let dir = TempDir::new().unwrap();
        let serial = SerialNumber::new(3);

        let store = KeyStore::open(dir.path().to_path_buf(), "correct".to_string()).unwrap();
        store.store_private_key(serial, b"secret").unwrap();

        let wrong = KeyStore::open(dir.path().to_path_buf(), "incorrect".to_string()).unwrap();
        assert!(matches!(
            wrong.load_private_key(serial),
            Err(CertmintError::KeyStore(_))
        ));
    }

    #[test]
    fn test_contexts_are_per_serial() {
        // Same plaintext under different serials must not produce
        // interchangeable files
        let dir = TempDir::new().unwrap();
        let store = KeyStore::open(dir.path().to_path_buf(), "pw".to_string()).unwrap();
        store.store_private_key(SerialNumber::new(1), b"same").unwrap();

        let a = key_file(dir.path(), SerialNumber::new(1));
        let b = key_file(dir.path(), SerialNumber::new(2));
        std::fs::copy(&a, &b).unwrap();

        assert!(store.load_private_key(SerialNumber::new(2)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = KeyStore::open(dir.path().to_path_buf(), "pw".to_string()).unwrap();
        store.store_private_key(SerialNumber::new(4), b"secret").unwrap();

        let path = key_file(dir.path(), SerialNumber::new(4));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
