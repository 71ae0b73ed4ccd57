use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::credentials::{CredentialStore, StoreError};
use super::error::AuthError;
use super::session::{SessionHandle, SessionWatcher};
use super::state::{AuthSnapshot, SessionState};
use crate::api::ApiClient;
use crate::config::Config;

/// Drives the session lifecycle: restore, register, login, logout.
///
/// The controller is the only writer of the session state and the stored
/// credential. Login and logout are stamped with an intent sequence number
/// when called; their effects are committed under one lock, and a commit
/// older than the last committed operation is dropped as superseded.
///
/// Store calls may block (keychain access), so they run on the blocking pool.
pub struct SessionController<S: CredentialStore> {
    store: Arc<S>,
    token_key: String,
    session: SessionHandle,
    api: ApiClient,
    intent: AtomicU64,
    /// Sequence number of the last committed operation
    committed: Mutex<u64>,
}

impl<S: CredentialStore + 'static> SessionController<S> {
    /// Controller in the `Pending` state. Call [`restore`](Self::restore) next.
    pub fn new(config: &Config, store: S) -> Result<Self> {
        let session = SessionHandle::new();
        let api = ApiClient::new(config, session.clone())?;
        Ok(Self::with_api(api, store, &config.token_key))
    }

    /// Controller around an existing client; the client's session becomes ours.
    pub fn with_api(api: ApiClient, store: S, token_key: &str) -> Self {
        Self {
            store: Arc::new(store),
            token_key: token_key.to_string(),
            session: api.session().clone(),
            api,
            intent: AtomicU64::new(0),
            committed: Mutex::new(0),
        }
    }

    /// Build and restore in one step.
    pub async fn start(config: &Config, store: S) -> Result<Self> {
        let controller = Self::new(config, store)?;
        controller.restore().await;
        Ok(controller)
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.session.snapshot()
    }

    pub fn subscribe(&self) -> SessionWatcher {
        self.session.subscribe()
    }

    fn next_intent(&self) -> u64 {
        self.intent.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run a store operation against the token key off the async executor.
    async fn with_store<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&S, &str) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let key = self.token_key.clone();
        tokio::task::spawn_blocking(move || op(store.as_ref(), key.as_str()))
            .await
            .map_err(|e| StoreError::Unavailable(format!("credential store task failed: {}", e)))?
    }

    /// Reconcile the in-memory state with the credential store.
    ///
    /// Only the first call reads the store; later calls return the current state.
    /// Read failures fall back to unauthenticated.
    pub async fn restore(&self) -> SessionState {
        let committed = self.committed.lock().await;
        self.restore_locked(&committed).await
    }

    async fn restore_locked(&self, _committed: &MutexGuard<'_, u64>) -> SessionState {
        let current = self.session.state();
        if !current.is_pending() {
            debug!(state = current.label(), "Session already restored");
            return current;
        }

        let stored = match self.with_store(|store, key| store.get(key)).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential, starting unauthenticated");
                None
            }
        };

        let state = SessionState::from_stored(stored);
        info!(state = state.label(), "Session restored");
        self.session.publish(state.clone());
        state
    }

    /// Take the commit lock, restoring first if nothing has been restored yet.
    async fn lock_for_commit(&self) -> MutexGuard<'_, u64> {
        let committed = self.committed.lock().await;
        self.restore_locked(&committed).await;
        committed
    }

    /// Request account creation. Never touches the session or the store.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<serde_json::Value, AuthError> {
        debug!(email, "Registering account");
        match self.api.register(email, password).await {
            Ok(body) => {
                info!("Registration accepted");
                Ok(body)
            }
            Err(e) => {
                let err = AuthError::from(e);
                warn!(error = %err, "Registration failed");
                Err(err)
            }
        }
    }

    /// Authenticate and make the returned token the session credential.
    ///
    /// On any failure the session state and the store are left as they were.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let seq = self.next_intent();
        debug!(email, seq, "Logging in");

        let token = self.api.login(email, password).await.map_err(|e| {
            let err = AuthError::from(e);
            if err.is_rejected() {
                warn!(error = %err, "Login rejected");
            } else {
                error!(error = %err, "Login failed");
            }
            err
        })?;

        let mut committed = self.lock_for_commit().await;
        if seq < *committed {
            warn!(seq, committed = *committed, "Discarding stale login");
            return Err(AuthError::Superseded);
        }

        // Persist before publishing so a failed write leaves nothing half-done
        let value = token.as_str().to_string();
        if let Err(e) = self.with_store(move |store, key| store.set(key, &value)).await {
            warn!(error = %e, "Failed to persist token, login not applied");
            return Err(e.into());
        }

        *committed = seq;
        self.session.publish(SessionState::Authenticated(token));
        info!("Login successful");
        Ok(())
    }

    /// Forget the credential.
    ///
    /// The session always ends up unauthenticated. A store deletion failure is
    /// returned after the in-memory state has been cleared.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let seq = self.next_intent();
        let mut committed = self.lock_for_commit().await;
        if seq < *committed {
            debug!(seq, committed = *committed, "Discarding stale logout");
            return Err(AuthError::Superseded);
        }

        let deleted = self.with_store(|store, key| store.delete(key)).await;
        *committed = seq;
        self.session.publish(SessionState::Unauthenticated);

        match deleted {
            Ok(()) => {
                info!("Logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Logged out, but failed to delete stored credential");
                Err(e.into())
            }
        }
    }
}
