use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use shared::types::AuthEvent;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// AuthEvents
// ---------------------------------------------------------------------------

/// Fan-out of auth state changes to every registered listener.
///
/// Backends own one of these and emit on sign-in, sign-out and token
/// refresh. Listeners hold an [`AuthSubscription`]; dropping it unregisters
/// the listener.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
    listeners: Arc<AtomicUsize>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            listeners: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a listener for every event emitted from now on.
    pub fn subscribe(&self) -> AuthSubscription {
        let count = self.listeners.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Auth listener registered ({} active)", count);
        AuthSubscription {
            rx: self.tx.subscribe(),
            listeners: self.listeners.clone(),
        }
    }

    /// Broadcast an event; returns how many listeners received it.
    pub fn emit(&self, event: AuthEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(count) => {
                info!("Auth event {} delivered to {} listeners", name, count);
                count
            }
            Err(_) => {
                debug!("Auth event {} dropped: no listeners", name);
                0
            }
        }
    }

    /// Listeners whose subscription has not been dropped yet.
    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// AuthSubscription
// ---------------------------------------------------------------------------

/// A registered auth listener. Released on drop.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthEvent>,
    listeners: Arc<AtomicUsize>,
}

impl AuthSubscription {
    /// Next event, or `None` once the emitting side is gone.
    ///
    /// A listener that falls behind skips to the oldest retained event;
    /// every event carries the full resulting state, so nothing is lost
    /// by skipping intermediate ones.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Auth listener lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        let remaining = self.listeners.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!("Auth listener released ({} active)", remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::{Session, User};

    fn session(id: &str) -> Session {
        Session {
            access_token: "t".into(),
            token_type: None,
            expires_in: None,
            refresh_token: None,
            user: User {
                id: id.into(),
                email: None,
            },
        }
    }

    #[tokio::test]
    async fn test_emit_with_no_listeners() {
        let events = AuthEvents::new();
        assert_eq!(events.emit(AuthEvent::SignedOut), 0);
    }

    #[tokio::test]
    async fn test_every_listener_receives_event() {
        let events = AuthEvents::new();
        let mut a = events.subscribe();
        let mut b = events.subscribe();

        assert_eq!(events.emit(AuthEvent::SignedIn(session("u1"))), 2);

        assert_eq!(a.recv().await.unwrap().user().unwrap().id, "u1");
        assert_eq!(b.recv().await.unwrap().user().unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_drop_releases_listener() {
        let events = AuthEvents::new();
        let sub = events.subscribe();
        let other = events.subscribe();
        assert_eq!(events.listener_count(), 2);

        drop(sub);
        assert_eq!(events.listener_count(), 1);
        drop(other);
        assert_eq!(events.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();

        events.emit(AuthEvent::SignedIn(session("u1")));
        events.emit(AuthEvent::TokenRefreshed(session("u1")));
        events.emit(AuthEvent::SignedOut);

        assert_eq!(sub.recv().await.unwrap().name(), "SIGNED_IN");
        assert_eq!(sub.recv().await.unwrap().name(), "TOKEN_REFRESHED");
        assert_eq!(sub.recv().await.unwrap().name(), "SIGNED_OUT");
    }

    #[tokio::test]
    async fn test_lagging_listener_recovers() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();

        for _ in 0..(CHANNEL_CAPACITY + 4) {
            events.emit(AuthEvent::SignedOut);
        }
        events.emit(AuthEvent::SignedIn(session("late")));

        let mut last = None;
        while let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv()).await
        {
            last = Some(event);
        }
        assert_eq!(last.unwrap().user().unwrap().id, "late");
    }

    #[tokio::test]
    async fn test_recv_ends_when_hub_dropped() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();
        drop(events);
        assert!(sub.recv().await.is_none());
    }
}
