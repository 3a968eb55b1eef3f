pub mod errors;
pub mod output;
pub mod paths;

pub use errors::*;
pub use output::*;
pub use paths::*;

/// Set 600 permissions on a sensitive file.
pub fn set_secure_file_permissions<P: AsRef<std::path::Path>>(path: P) -> errors::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path.as_ref())?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path.as_ref(), perms)?;
    }
    Ok(())
}
