//! Session lifecycle management.
//!
//! This module provides:
//! - `SessionState`: `Pending`, `Unauthenticated` or `Authenticated(token)`
//! - `SessionHandle` / `SessionWatcher`: shared state with change notification
//! - `CredentialStore`: persistent token storage (OS keychain or in-memory)
//! - `SessionController`: restore, register, login and logout
//!
//! The token is persisted under a single fixed key and survives restarts.

pub mod controller;
pub mod credentials;
pub mod error;
pub mod session;
pub mod state;

pub use controller::SessionController;
pub use credentials::{CredentialStore, KeyringStore, MemoryStore, StoreError};
pub use error::{AuthError, AuthFailure};
pub use session::{SessionHandle, SessionWatcher};
pub use state::{AuthSnapshot, SessionState, Token};
