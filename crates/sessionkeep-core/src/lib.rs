//! sessionkeep core - client-side session management.
//!
//! Establishes, persists, attaches and tears down the bearer token used to
//! authorize calls to a remote API.
//!
//! ```no_run
//! use sessionkeep_core::{Config, KeyringStore, SessionController};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let store = KeyringStore::new(config.keyring_service.clone());
//! let controller = SessionController::start(&config, store).await?;
//!
//! if let Err(e) = controller.login("user@example.com", "hunter2").await {
//!     eprintln!("{}", e.message());
//! }
//! let me: serde_json::Value = controller.api().get_json("me").await?;
//! # let _ = me;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthError, AuthFailure, AuthSnapshot, CredentialStore, KeyringStore, MemoryStore,
    SessionController, SessionHandle, SessionState, SessionWatcher, StoreError, Token,
};
pub use config::Config;
