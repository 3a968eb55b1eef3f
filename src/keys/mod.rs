pub mod keystore;
pub mod provider;

pub use keystore::KeyStore;
pub use provider::{
    public_key_from_pem, public_key_to_pem, private_key_to_pem, GeneratedKeyPair, KeyBits,
    KeyPairProvider, RsaKeyPairProvider, SecurityProfile,
};
