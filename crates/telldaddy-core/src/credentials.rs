//! Password lookup for authenticated SMTP.
//!
//! Secrets are keyed by `(server, account)` and live in an external
//! [`SecretStore`]; the system keyring is the production backend:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use crate::error::{CredentialError, CredentialResult};
use keyring::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Backend that holds secrets keyed by service and account.
pub trait SecretStore: Send + Sync {
    /// Returns the stored secret, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    fn get(&self, service: &str, account: &str) -> CredentialResult<Option<String>>;

    /// Stores `secret`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, service: &str, account: &str, secret: &str) -> CredentialResult<()>;
}

/// Secrets in the platform keyring.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringStore;

impl SecretStore for KeyringStore {
    fn get(&self, service: &str, account: &str) -> CredentialResult<Option<String>> {
        let entry = Entry::new(service, account)?;
        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => {
                debug!("No keyring entry for {account} on {service}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> CredentialResult<()> {
        let entry = Entry::new(service, account)?;
        entry.set_password(secret)?;
        debug!("Stored keyring entry for {account} on {service}");
        Ok(())
    }
}

/// In-process secrets, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    secrets: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, service: &str, account: &str) -> CredentialResult<Option<String>> {
        let secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(secrets
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> CredentialResult<()> {
        let mut secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        secrets.insert(
            (service.to_string(), account.to_string()),
            secret.to_string(),
        );
        Ok(())
    }
}

/// Credential access with an optional backend.
///
/// Without a backend every operation fails with
/// [`CredentialError::Unavailable`], so authenticated delivery can never
/// silently fall back to an unauthenticated send.
#[derive(Clone, Default)]
pub struct CredentialStore {
    backend: Option<Arc<dyn SecretStore>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("available", &self.backend.is_some())
            .finish()
    }
}

impl CredentialStore {
    /// Uses `backend` for all lookups.
    #[must_use]
    pub fn new(backend: impl SecretStore + 'static) -> Self {
        Self {
            backend: Some(Arc::new(backend)),
        }
    }

    /// Uses the system keyring.
    #[must_use]
    pub fn keyring() -> Self {
        Self::new(KeyringStore)
    }

    /// A store with no backend.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Returns true if a backend is configured.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> CredentialResult<&dyn SecretStore> {
        self.backend.as_deref().ok_or(CredentialError::Unavailable)
    }

    /// Returns true iff a non-empty password is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is configured or it fails.
    pub fn has_password(&self, server: &str, account: &str) -> CredentialResult<bool> {
        Ok(self.get_password(server, account)?.is_some())
    }

    /// Returns the stored password; an empty secret counts as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is configured or it fails.
    pub fn get_password(&self, server: &str, account: &str) -> CredentialResult<Option<String>> {
        let secret = self.backend()?.get(server, account)?;
        Ok(secret.filter(|secret| !secret.is_empty()))
    }

    /// Returns the stored password or [`CredentialError::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns an error if no password is stored, no backend is configured
    /// or the backend fails.
    pub fn require_password(&self, server: &str, account: &str) -> CredentialResult<String> {
        self.get_password(server, account)?
            .ok_or_else(|| CredentialError::NotFound {
                server: server.to_string(),
                account: account.to_string(),
            })
    }

    /// Resolves the password like [`require_password`](Self::require_password)
    /// on tokio's blocking pool, since keyring backends make synchronous
    /// IPC calls.
    ///
    /// # Errors
    ///
    /// Returns an error if no password is stored, the backend fails, or the
    /// lookup task panics.
    pub async fn fetch_password(&self, server: &str, account: &str) -> CredentialResult<String> {
        let store = self.clone();
        let server = server.to_string();
        let account = account.to_string();
        tokio::task::spawn_blocking(move || store.require_password(&server, &account))
            .await
            .map_err(|_| CredentialError::LookupAborted)?
    }

    /// Stores `password` without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is configured or it fails.
    pub fn store_password(&self, server: &str, account: &str, password: &str) -> CredentialResult<()> {
        self.backend()?.set(server, account, password)
    }

    /// Prompts on the terminal with masked input and stores the answer.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is configured, reading the terminal
    /// fails or the backend fails.
    pub fn set_password(&self, server: &str, account: &str) -> CredentialResult<()> {
        self.set_password_with(server, account, |prompt| {
            rpassword::prompt_password_stdout(prompt)
        })
    }

    /// Like [`set_password`](Self::set_password) with a caller-supplied
    /// prompt function.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is configured, `prompt` fails or the
    /// backend fails.
    pub fn set_password_with<F>(&self, server: &str, account: &str, prompt: F) -> CredentialResult<()>
    where
        F: FnOnce(&str) -> std::io::Result<String>,
    {
        let backend = self.backend()?;
        let password = prompt(&password_prompt(server, account)).map_err(CredentialError::Prompt)?;
        backend.set(server, account, &password)
    }
}

/// Text shown when asking for the password of `account` on `server`.
#[must_use]
pub fn password_prompt(server: &str, account: &str) -> String {
    format!("Enter password for {account} using {server}: ")
}
