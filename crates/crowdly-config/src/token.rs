//! File-backed persistence for the session bearer token.
//!
//! A single token lives in `token` under the platform data directory,
//! written with owner-only permissions on Unix. Clearing it on logout
//! or session expiry removes the file.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::ConfigError;

/// Reads and writes the persisted session token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store rooted at the platform data directory.
    pub fn new() -> Self {
        Self {
            path: crate::data_dir().join("token"),
        }
    }

    /// Store rooted at an explicit path (tests, overrides).
    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the persisted token, if any. A missing file is `Ok(None)`;
    /// an empty or whitespace-only file is treated as absent.
    pub fn load(&self) -> Result<Option<SecretString>, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(SecretString::from(trimmed.to_owned())))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the token, creating parent directories as needed.
    pub fn store(&self, token: &SecretString) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token.expose_secret())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }

    /// Remove the persisted token. Absence is not an error.
    pub fn clear(&self) -> Result<(), ConfigError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in_tempdir() -> (tempfile::TempDir, TokenStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::at_path(dir.path().join("token"));
        (dir, store)
    }

    #[test]
    fn missing_file_loads_as_none() {
        let (_dir, store) = store_in_tempdir();
        assert!(store.load().expect("load ok").is_none());
    }

    #[test]
    fn store_then_load_round_trips() {
        let (_dir, store) = store_in_tempdir();

        store
            .store(&SecretString::from("tok-abc".to_owned()))
            .expect("store ok");

        let loaded = store.load().expect("load ok").expect("present");
        assert_eq!(loaded.expose_secret(), "tok-abc");
    }

    #[test]
    fn store_overwrites_previous_token() {
        let (_dir, store) = store_in_tempdir();

        store
            .store(&SecretString::from("first".to_owned()))
            .expect("store ok");
        store
            .store(&SecretString::from("second".to_owned()))
            .expect("store ok");

        let loaded = store.load().expect("load ok").expect("present");
        assert_eq!(loaded.expose_secret(), "second");
    }

    #[test]
    fn clear_removes_token_and_is_idempotent() {
        let (_dir, store) = store_in_tempdir();

        store
            .store(&SecretString::from("tok".to_owned()))
            .expect("store ok");
        store.clear().expect("clear ok");
        assert!(store.load().expect("load ok").is_none());

        // Clearing again is fine
        store.clear().expect("clear ok");
    }

    #[test]
    fn whitespace_only_file_loads_as_none() {
        let (_dir, store) = store_in_tempdir();
        std::fs::write(dir_path(&store), "  \n").expect("write");
        assert!(store.load().expect("load ok").is_none());
    }

    fn dir_path(store: &TokenStore) -> &std::path::Path {
        &store.path
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store_in_tempdir();
        store
            .store(&SecretString::from("tok".to_owned()))
            .expect("store ok");

        let mode = std::fs::metadata(dir_path(&store))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
