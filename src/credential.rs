use crate::error::OverlayError;
use std::path::{Path, PathBuf};

pub const API_KEY_FILE: &str = "gemini_api_key.txt";

/// Environment variables consulted, in order, when no key file is present.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

pub trait CredentialStore: Send {
    fn load(&self) -> Option<String>;
    fn save(&self, key: &str) -> Result<(), OverlayError>;
}

/// Plain-text key file.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let key = content.trim();
                (!key.is_empty()).then(|| key.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("failed to read API key from {}: {e}", self.path.display());
                None
            }
        }
    }

    fn save(&self, key: &str) -> Result<(), OverlayError> {
        validate_key(key)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OverlayError::Storage(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(&self.path, key)
            .map_err(|e| OverlayError::Storage(format!("{}: {e}", self.path.display())))?;
        tracing::info!("API key saved to {}", self.path.display());
        Ok(())
    }
}

/// Keys are stored verbatim, so anything that would not survive a trimmed
/// read is rejected up front.
pub fn validate_key(key: &str) -> Result<(), OverlayError> {
    if key.is_empty() {
        return Err(OverlayError::Config("API key is empty".into()));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(OverlayError::Config("API key must not contain whitespace".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    File,
    Environment(&'static str),
}

/// Find the API key. The stored key file wins over the environment.
pub fn resolve_credential(
    store: &dyn CredentialStore,
    env: impl Fn(&str) -> Option<String>,
) -> Option<(String, CredentialSource)> {
    if let Some(key) = store.load() {
        return Some((key, CredentialSource::File));
    }
    API_KEY_ENV_VARS.iter().find_map(|name| {
        env(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| (v, CredentialSource::Environment(name)))
    })
}

/// [`resolve_credential`] against the process environment.
pub fn resolve_from_process_env(store: &dyn CredentialStore) -> Option<(String, CredentialSource)> {
    resolve_credential(store, |name| std::env::var(name).ok())
}
