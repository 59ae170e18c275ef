use crate::models::api::AuthGrant;
use crate::models::chat::Identity;
use log::debug;
use serde::{ Deserialize, Serialize };
use std::fs;
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential file IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential file at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable storage for the signed-in credential.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<AuthGrant>, CredentialError>;
    fn save(&self, grant: &AuthGrant) -> Result<(), CredentialError>;
    fn clear(&self) -> Result<(), CredentialError>;
}

/// On-disk layout: the token and the user summary under separate keys.
#[derive(Serialize, Deserialize)]
struct StoredCredentials {
    token: Option<String>,
    user: Option<Identity>,
}

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

    fn io_err(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Io { path: self.path.clone(), source }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<AuthGrant>, CredentialError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => {
                return Err(self.io_err(e));
            }
        };
        let stored: StoredCredentials = serde_json
            ::from_str(&raw)
            .map_err(|source| CredentialError::Json { path: self.path.clone(), source })?;

        // Both keys must be present for the credential to count.
        Ok(match (stored.token, stored.user) {
            (Some(token), Some(identity)) if !token.is_empty() =>
                Some(AuthGrant { token, identity }),
            _ => None,
        })
    }

    fn save(&self, grant: &AuthGrant) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let stored = StoredCredentials {
            token: Some(grant.token.clone()),
            user: Some(grant.identity.clone()),
        };
        let json = serde_json
            ::to_string_pretty(&stored)
            .map_err(|source| CredentialError::Json { path: self.path.clone(), source })?;
        fs::write(&self.path, json).map_err(|e| self.io_err(e))?;
        debug!("Credentials written to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

/// Process-local store, used when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryCredentialStore {
    grant: Mutex<Option<AuthGrant>>,
}

impl MemoryCredentialStore {
    pub fn with_grant(grant: AuthGrant) -> Self {
        Self { grant: Mutex::new(Some(grant)) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<AuthGrant>, CredentialError> {
        Ok(self.grant.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, grant: &AuthGrant) -> Result<(), CredentialError> {
        *self.grant.lock().unwrap_or_else(|e| e.into_inner()) = Some(grant.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *self.grant.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
