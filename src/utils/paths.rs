use crate::utils::errors::{CertmintError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const PROGRAM_NAME: &str = "certmint";

/// Filesystem layout for one CA home. The home defaults to
/// ~/.local/share/certmint/ and can be redirected with --home or
/// CERTMINT_HOME for tests and side-by-side CAs.
pub struct CertmintPaths {
    home: PathBuf,
    overridden: bool,
}

impl CertmintPaths {
    pub fn resolve(home_flag: Option<PathBuf>) -> Result<Self> {
        if let Some(home) = home_flag {
            return Ok(Self {
                home,
                overridden: true,
            });
        }

        let home = dirs::data_local_dir()
            .map(|dir| dir.join(PROGRAM_NAME))
            .ok_or_else(|| {
                CertmintError::Config("Cannot determine local data directory".to_string())
            })?;
        Ok(Self {
            home,
            overridden: false,
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Certificate log: <home>/certs.jsonl
    pub fn cert_log(&self) -> PathBuf {
        self.home.join("certs.jsonl")
    }

    /// Revocation log: <home>/revocations.jsonl
    pub fn revocation_log(&self) -> PathBuf {
        self.home.join("revocations.jsonl")
    }

    /// Trust anchor set: <home>/anchors.json
    pub fn anchors_file(&self) -> PathBuf {
        self.home.join("anchors.json")
    }

    /// Encrypted private keys: <home>/keys/
    pub fn keys_dir(&self) -> PathBuf {
        self.home.join("keys")
    }

    /// Operator config. Lives with the other config files under
    /// ~/.config/certmint/ unless the home was overridden, in which
    /// case everything stays inside the one directory.
    pub fn config_file(&self) -> Result<PathBuf> {
        if self.overridden {
            return Ok(self.home.join("config.yaml"));
        }
        dirs::config_dir()
            .map(|dir| dir.join(PROGRAM_NAME).join("config.yaml"))
            .ok_or_else(|| CertmintError::Config("Cannot determine config directory".to_string()))
    }

    /// Ensure the home layout exists with restrictive permissions.
    pub fn ensure_all_dirs(&self) -> Result<()> {
        ensure_dir_exists(&self.home)?;
        ensure_dir_exists(&self.keys_dir())?;
        Ok(())
    }
}

/// Create a directory with 700 permissions if it does not exist.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(path, perms)?;
        }
    }
    Ok(())
}
