pub mod store;

use crate::models::api::AuthGrant;
use crate::models::chat::Identity;
use log::{ error, info, warn };
use std::sync::{ Arc, RwLock };
use store::{ CredentialError, CredentialStore };
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    SignedIn(Identity),
    SignedOut,
}

/// Process-wide holder of the bearer credential.
///
/// Built from durable storage at startup and torn down on logout or when the
/// backend answers 401. Handed to the gateway explicitly so tests can build
/// one over a `MemoryCredentialStore`.
pub struct AuthContext {
    storage: Arc<dyn CredentialStore>,
    current: RwLock<Option<AuthGrant>>,
    status: watch::Sender<AuthStatus>,
}

impl AuthContext {
    pub fn init_from_storage(storage: Arc<dyn CredentialStore>) -> Self {
        let current = match storage.load() {
            Ok(grant) => grant,
            Err(e) => {
                warn!("Could not read stored credentials, starting signed out: {}", e);
                None
            }
        };
        let status = match &current {
            Some(grant) => {
                info!("Restored session for {}", grant.identity.email);
                AuthStatus::SignedIn(grant.identity.clone())
            }
            None => AuthStatus::SignedOut,
        };
        let (status, _rx) = watch::channel(status);
        Self {
            storage,
            current: RwLock::new(current),
            status,
        }
    }

    pub fn token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|g| g.token.clone())
    }

    pub fn identity(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|g| g.identity.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    /// Persists `grant` and installs it for subsequent requests.
    pub fn sign_in(&self, grant: AuthGrant) -> Result<(), CredentialError> {
        self.storage.save(&grant)?;
        let identity = grant.identity.clone();
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(grant);
        info!("Signed in as {}", identity.email);
        self.status.send_replace(AuthStatus::SignedIn(identity));
        Ok(())
    }

    /// Clears the stored credential and tells subscribers to return to login.
    pub fn sign_out(&self) {
        if let Err(e) = self.storage.clear() {
            error!("Failed to clear stored credentials: {}", e);
        }
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.status.send_if_modified(|status| {
            if *status == AuthStatus::SignedOut {
                false
            } else {
                *status = AuthStatus::SignedOut;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryCredentialStore;

    fn grant() -> AuthGrant {
        AuthGrant {
            token: "jwt".into(),
            identity: Identity { name: "Ravi".into(), email: "ravi@example.in".into() },
        }
    }

    #[test]
    fn restores_from_storage() {
        let storage = Arc::new(MemoryCredentialStore::with_grant(grant()));
        let auth = AuthContext::init_from_storage(storage);
        assert_eq!(auth.token().as_deref(), Some("jwt"));
        assert!(auth.is_authenticated());
    }

    #[tokio::test]
    async fn sign_out_clears_storage_and_notifies() {
        let storage = Arc::new(MemoryCredentialStore::with_grant(grant()));
        let auth = AuthContext::init_from_storage(storage.clone());
        let mut rx = auth.subscribe();

        auth.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AuthStatus::SignedOut);
        assert_eq!(auth.token(), None);
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn sign_in_persists() {
        let storage = Arc::new(MemoryCredentialStore::default());
        let auth = AuthContext::init_from_storage(storage.clone());
        assert!(!auth.is_authenticated());

        auth.sign_in(grant()).unwrap();
        assert_eq!(storage.load().unwrap(), Some(grant()));
        assert_eq!(*auth.subscribe().borrow(), AuthStatus::SignedIn(grant().identity));
    }
}
