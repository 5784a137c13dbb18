//! Persisted bearer credential.
//!
//! Lifecycle: absent (remote tier disabled), set (remote tier enabled),
//! cleared (disabled again; already uploaded datasets stay remote).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed token storage.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored token, if any. Blank files count as absent.
    pub fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token.trim())?;
        restrict_permissions(&self.path)?;
        debug!("Stored credential at {}", self.path.display());
        Ok(())
    }

    /// Remove the stored token. Returns whether one existed.
    pub fn clear(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Mask a token for display, keeping the last four characters.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("••••••••{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("nested").join("token"));

        assert_eq!(store.load().unwrap(), None);

        store.set("  ghp_abcdef1234\n").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("ghp_abcdef1234"));

        assert!(store.clear().unwrap());
        assert_eq!(store.load().unwrap(), None);
        assert!(!store.clear().unwrap());
    }

    #[test]
    fn test_blank_token_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "   \n").unwrap();
        assert_eq!(CredentialStore::new(path).load().unwrap(), None);
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("ghp_abcdef1234"), "••••••••1234");
        assert_eq!(mask_token("ab"), "••••••••ab");
    }
}
