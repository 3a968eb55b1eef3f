use crate::cert::record::Tier;
use crate::keys::provider::KeyBits;
use crate::utils::errors::{CertmintError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Operator configuration (`config.yaml`). Validity lengths and key
/// sizes are deliberate inputs with no built-in industry defaults: a
/// command either names them with flags or they must appear here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaConfig {
    pub default_validity_days: ValidityDefaults,
    pub default_key_bits: Option<KeyBits>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityDefaults {
    pub root: Option<u32>,
    pub intermediate: Option<u32>,
    pub leaf: Option<u32>,
}

impl CaConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Resolve the validity length for an issuance: the explicit flag
    /// wins, then the per-tier default. Neither present is a config
    /// error, never a silent fallback.
    pub fn days_for(&self, tier: Tier, flag: Option<u32>) -> Result<u32> {
        if let Some(days) = flag {
            return Ok(days);
        }

        let default = match tier {
            Tier::Root => self.default_validity_days.root,
            Tier::Intermediate => self.default_validity_days.intermediate,
            Tier::Leaf => self.default_validity_days.leaf,
        };

        default.ok_or_else(|| {
            CertmintError::Config(format!(
                "No validity length for tier '{tier}': pass --days or set default_validity_days.{tier} in config.yaml"
            ))
        })
    }

    /// Resolve the key size: flag, then config default.
    pub fn bits_for(&self, flag: Option<KeyBits>) -> Result<KeyBits> {
        flag.or(self.default_key_bits).ok_or_else(|| {
            CertmintError::Config(
                "No key size given: pass --bits or set default_key_bits in config.yaml".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = TempDir::new().unwrap();
        let config = CaConfig::load(&dir.path().join("config.yaml")).unwrap();
        assert!(config.default_key_bits.is_none());
        assert!(config.days_for(Tier::Leaf, None).is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "default_validity_days:\n  root: 3650\n  intermediate: 1825\n  leaf: 365\ndefault_key_bits: 3072\n",
        )
        .unwrap();

        let config = CaConfig::load(&path).unwrap();
        assert_eq!(config.days_for(Tier::Root, None).unwrap(), 3650);
        assert_eq!(config.days_for(Tier::Leaf, None).unwrap(), 365);
        assert_eq!(config.bits_for(None).unwrap(), KeyBits::Bits3072);
    }

    #[test]
    fn test_flag_overrides_default() {
        let config = CaConfig {
            default_validity_days: ValidityDefaults {
                leaf: Some(365),
                ..Default::default()
            },
            default_key_bits: Some(KeyBits::Bits2048),
        };

        assert_eq!(config.days_for(Tier::Leaf, Some(30)).unwrap(), 30);
        assert_eq!(config.bits_for(Some(KeyBits::Bits4096)).unwrap(), KeyBits::Bits4096);
    }

    #[test]
    fn test_unsupported_bits_rejected() {
        let err = serde_yaml::from_str::<CaConfig>("default_key_bits: 1024\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_tier_default_is_config_error() {
        let config = CaConfig::default();
        assert!(matches!(
            config.days_for(Tier::Intermediate, None),
            Err(CertmintError::Config(_))
        ));
        assert!(matches!(config.bits_for(None), Err(CertmintError::Config(_))));
    }
}
