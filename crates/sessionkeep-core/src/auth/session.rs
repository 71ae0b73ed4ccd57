use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::state::{AuthSnapshot, SessionState, Token};

/// Shared, observable session state.
///
/// Cloning is cheap; every clone sees the same state. Only the controller
/// publishes; everyone else reads or subscribes.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Pending);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().snapshot()
    }

    /// Bearer token if authenticated
    pub fn token(&self) -> Option<Token> {
        self.tx.borrow().token().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub fn subscribe(&self) -> SessionWatcher {
        SessionWatcher {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Replace the state. Subscribers are woken only on an actual change.
    pub(crate) fn publish(&self, next: SessionState) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if changed {
            debug!(state = next.label(), "Session state changed");
        }
        changed
    }
}

/// Subscriber side of a [`SessionHandle`].
#[derive(Debug, Clone)]
pub struct SessionWatcher {
    rx: watch::Receiver<SessionState>,
}

impl SessionWatcher {
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Wait for the next transition. `None` once the handle is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        let state = self.rx.borrow_and_update();
        Some((*state).clone())
    }

    /// Wait until restore has finished. `None` if the handle is dropped first.
    pub async fn wait_ready(&mut self) -> Option<SessionState> {
        let state = self.rx.wait_for(|s| !s.is_pending()).await.ok()?;
        Some((*state).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authed(token: &str) -> SessionState {
        SessionState::Authenticated(Token::new(token).unwrap())
    }

    #[test]
    fn test_new_handle_is_pending() {
        let handle = SessionHandle::new();
        assert!(handle.state().is_pending());
        assert!(handle.token().is_none());
    }

    #[test]
    fn test_publish_reports_change() {
        let handle = SessionHandle::new();
        assert!(handle.publish(SessionState::Unauthenticated));
        assert!(!handle.publish(SessionState::Unauthenticated));
        assert!(handle.publish(authed("abc")));
        assert_eq!(handle.token().unwrap().as_str(), "abc");
    }

    #[tokio::test]
    async fn test_all_subscribers_see_transition() {
        let handle = SessionHandle::new();
        let mut first = handle.subscribe();
        let mut second = handle.subscribe();
        assert_eq!(handle.subscriber_count(), 2);

        handle.publish(authed("abc"));

        assert_eq!(first.changed().await, Some(authed("abc")));
        assert_eq!(second.changed().await, Some(authed("abc")));
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_after_restore() {
        let handle = SessionHandle::new();
        let mut watcher = handle.subscribe();

        let publisher = handle.clone();
        tokio::spawn(async move {
            publisher.publish(SessionState::Unauthenticated);
        });

        assert_eq!(watcher.wait_ready().await, Some(SessionState::Unauthenticated));
    }

    #[tokio::test]
    async fn test_changed_returns_none_when_handle_dropped() {
        let handle = SessionHandle::new();
        let mut watcher = handle.subscribe();
        drop(handle);
        assert_eq!(watcher.changed().await, None);
    }
}
