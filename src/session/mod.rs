//! Session transport: the bearer token, the backend host and everything that
//! reacts to either changing.

mod store;

pub use store::TokenStore;

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use anyhow::Result;
use log::{error, info};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::{
    events::{self, EventSink, ToastKind, LOGIN_ROUTE, SESSION_CHANGED},
    timer::TimerSlot,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub host: String,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionChangedEvent {
    authenticated: bool,
}

struct SessionInner {
    host: String,
    store: TokenStore,
    tx: watch::Sender<SessionSnapshot>,
    auto_logout: TimerSlot,
    auto_logout_after: Duration,
    events: Arc<dyn EventSink>,
}

/// Explicit replacement for an ambient auth global: one instance is created
/// at startup and cloned into every component that talks to the backend.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

impl SessionContext {
    pub fn new(
        host: impl Into<String>,
        store: TokenStore,
        auto_logout_after: Duration,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        let (tx, _rx) = watch::channel(SessionSnapshot {
            token: store.token(),
            host: host.clone(),
        });

        let session = Self {
            inner: Arc::new(SessionInner {
                host,
                store,
                tx,
                auto_logout: TimerSlot::new("auto-logout"),
                auto_logout_after,
                events,
            }),
        };

        // A token restored from storage expires on the same clock as a fresh one.
        if session.is_authenticated() {
            info!("restored stored session");
            session.arm_auto_logout();
        }
        session
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn token(&self) -> Option<String> {
        self.inner.tx.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.tx.borrow().is_authenticated()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Absolute HTTP URL for a backend path such as `/auth/token`.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.inner.host, path)
    }

    /// WebSocket URL for a backend path: `http` becomes `ws`, `https` becomes `wss`.
    pub fn ws_url(&self, path: &str) -> String {
        let host = &self.inner.host;
        let ws_host = if let Some(rest) = host.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = host.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            host.clone()
        };
        format!("{ws_host}{path}")
    }

    /// Stores and publishes a freshly issued token, then arms the
    /// auto-logout timer from now.
    pub fn login(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        self.inner.store.set_token(Some(token.clone()))?;
        self.publish(Some(token));
        self.arm_auto_logout();
        info!("session started");
        Ok(())
    }

    /// Drops the token and sends the user to the login screen. Safe to call
    /// when already logged out.
    pub fn logout(&self) {
        self.inner.auto_logout.cancel();
        self.clear_token();
        events::navigate(self.inner.events.as_ref(), LOGIN_ROUTE);
    }

    pub fn user(&self) -> Option<Value> {
        self.inner.store.user()
    }

    pub fn save_user(&self, user: Value) -> Result<()> {
        self.inner.store.set_user(Some(user))
    }

    /// Applies a storage change made elsewhere (another window or process).
    pub fn sync_from_storage(&self) -> Result<()> {
        self.inner.store.reload()?;
        let stored = self.inner.store.token();
        if stored == self.token() {
            return Ok(());
        }

        match stored {
            Some(token) => {
                self.publish(Some(token));
                self.arm_auto_logout();
            }
            None => {
                self.inner.auto_logout.cancel();
                self.publish(None);
            }
        }
        Ok(())
    }

    pub fn auto_logout_pending(&self) -> bool {
        self.inner.auto_logout.is_pending()
    }

    fn arm_auto_logout(&self) {
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        self.inner
            .auto_logout
            .schedule(self.inner.auto_logout_after, async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let session = SessionContext { inner };
                info!("session expired; logging out");
                events::toast(
                    session.inner.events.as_ref(),
                    "Your session has expired. You will be logged out.",
                    ToastKind::Warning,
                );
                session.clear_token();
                events::navigate(session.inner.events.as_ref(), LOGIN_ROUTE);
            });
    }

    fn clear_token(&self) {
        if let Err(err) = self.inner.store.set_token(None) {
            error!("failed to clear stored token: {err:#}");
        }
        self.publish(None);
    }

    fn publish(&self, token: Option<String>) {
        let authenticated = token.is_some();
        self.inner.tx.send_replace(SessionSnapshot {
            token,
            host: self.inner.host.clone(),
        });
        events::emit(
            self.inner.events.as_ref(),
            SESSION_CHANGED,
            &SessionChangedEvent { authenticated },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;

    fn session_with(host: &str, events: Arc<EventLog>) -> (SessionContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("session.json")).unwrap();
        let session = SessionContext::new(host, store, Duration::from_secs(60), events);
        (session, dir)
    }

    #[test]
    fn ws_url_rewrites_scheme() {
        let events = Arc::new(EventLog::new());
        let (secure, _a) = session_with("https://api.example.com/", events.clone());
        assert_eq!(
            secure.ws_url("/emotion/detection/"),
            "wss://api.example.com/emotion/detection/"
        );

        let (plain, _b) = session_with("http://localhost:8000", events);
        assert_eq!(
            plain.ws_url("/emotion/detection/"),
            "ws://localhost:8000/emotion/detection/"
        );
        assert_eq!(
            plain.endpoint_url("/auth/token"),
            "http://localhost:8000/auth/token"
        );
    }

    #[tokio::test]
    async fn login_publishes_to_subscribers() {
        let events = Arc::new(EventLog::new());
        let (session, _dir) = session_with("http://localhost:8000", events);
        let mut rx = session.subscribe();

        session.login("tok").unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().token.as_deref(), Some("tok"));
        assert!(session.auto_logout_pending());
    }

    #[tokio::test]
    async fn logout_clears_token_and_navigates() {
        let events = Arc::new(EventLog::new());
        let (session, _dir) = session_with("http://localhost:8000", events.clone());
        session.login("tok").unwrap();

        session.logout();
        assert!(!session.is_authenticated());
        assert!(!session.auto_logout_pending());
        assert_eq!(events.routes(), vec!["/login".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn token_expires_after_fixed_timeout() {
        let events = Arc::new(EventLog::new());
        let (session, _dir) = session_with("http://localhost:8000", events.clone());
        session.login("tok").unwrap();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(session.is_authenticated());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!session.is_authenticated());
        assert_eq!(events.routes(), vec!["/login".to_string()]);
        assert_eq!(
            events.toasts()[0].0,
            "Your session has expired. You will be logged out."
        );
    }

    #[tokio::test]
    async fn sync_follows_storage_written_elsewhere() {
        let events = Arc::new(EventLog::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = SessionContext::new(
            "http://localhost:8000",
            TokenStore::new(path.clone()).unwrap(),
            Duration::from_secs(60),
            events,
        );

        let other = TokenStore::new(path.clone()).unwrap();
        other.set_token(Some("other-tab".into())).unwrap();
        session.sync_from_storage().unwrap();
        assert_eq!(session.token().as_deref(), Some("other-tab"));

        other.set_token(None).unwrap();
        session.sync_from_storage().unwrap();
        assert!(session.token().is_none());
        assert!(!session.auto_logout_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn restored_token_expires_on_the_same_timeout() {
        let events = Arc::new(EventLog::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        TokenStore::new(path.clone())
            .unwrap()
            .set_token(Some("persisted".into()))
            .unwrap();

        let session = SessionContext::new(
            "http://localhost:8000",
            TokenStore::new(path).unwrap(),
            Duration::from_secs(60),
            events.clone(),
        );
        assert!(session.is_authenticated());
        assert!(session.auto_logout_pending());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(!session.is_authenticated());
        assert_eq!(events.routes(), vec!["/login".to_string()]);
    }

    #[test]
    fn sync_outside_a_runtime_arms_the_timer() {
        let events = Arc::new(EventLog::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = SessionContext::new(
            "http://localhost:8000",
            TokenStore::new(path.clone()).unwrap(),
            Duration::from_secs(60),
            events,
        );

        TokenStore::new(path)
            .unwrap()
            .set_token(Some("other-instance".into()))
            .unwrap();
        session.sync_from_storage().unwrap();

        assert_eq!(session.token().as_deref(), Some("other-instance"));
        assert!(session.auto_logout_pending());
    }
}
