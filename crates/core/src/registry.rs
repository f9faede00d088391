//! Registry of live sessions, owned by the relay process.
//!
//! Entries are added when a connection opens and removed when it ends. On
//! shutdown every connection is told to close its session, and the relay can
//! wait for them to finish.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, Notify, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

/// Resolves when the relay asks this connection to shut down.
pub type ShutdownSignal = oneshot::Receiver<()>;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    /// The sender is taken once the session has been signalled.
    entries: Arc<Mutex<HashMap<Uuid, Option<oneshot::Sender<()>>>>>,
    emptied: Arc<Notify>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new session and returns the signal its connection should watch.
    pub async fn register(&self, session_id: Uuid) -> ShutdownSignal {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries.lock().await;
        entries.insert(session_id, Some(tx));
        debug!(%session_id, active = entries.len(), "Session registered");
        rx
    }

    /// Removes a session. Returns `false` if it was not registered.
    pub async fn deregister(&self, session_id: &Uuid) -> bool {
        let mut entries = self.entries.lock().await;
        let removed = entries.remove(session_id).is_some();
        if removed {
            debug!(%session_id, active = entries.len(), "Session deregistered");
        }
        if entries.is_empty() {
            self.emptied.notify_waiters();
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Signals every registered connection to close.
    ///
    /// Sessions stay registered until their connection deregisters. Returns
    /// the number of sessions signalled by this call.
    pub async fn shutdown_all(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let mut count = 0;
        for (session_id, slot) in entries.iter_mut() {
            let Some(tx) = slot.take() else {
                continue;
            };
            count += 1;
            if tx.send(()).is_err() {
                debug!(%session_id, "Connection already gone at shutdown");
            }
        }
        info!(count, "Signalled all active sessions to close");
        count
    }

    /// Resolves once no session is registered.
    pub async fn wait_closed(&self) {
        loop {
            let emptied = self.emptied.notified();
            if self.is_empty().await {
                return;
            }
            emptied.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_deregister() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty().await);

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let _sig_a = registry.register(a).await;
        let _sig_b = registry.register(b).await;
        assert_eq!(registry.len().await, 2);

        assert!(registry.deregister(&a).await);
        assert!(!registry.deregister(&a).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let registry = SessionRegistry::new();
        let clone = registry.clone();
        let _sig = registry.register(Uuid::new_v4()).await;
        assert_eq!(clone.len().await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_signals_every_session() {
        let registry = SessionRegistry::new();
        let first = registry.register(Uuid::new_v4()).await;
        let second = registry.register(Uuid::new_v4()).await;
        let dropped = registry.register(Uuid::new_v4()).await;
        drop(dropped);

        assert_eq!(registry.shutdown_all().await, 3);
        assert_eq!(registry.len().await, 3);
        assert!(first.await.is_ok());
        assert!(second.await.is_ok());

        assert_eq!(registry.shutdown_all().await, 0);
    }

    #[tokio::test]
    async fn test_deregister_after_shutdown_empties_registry() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        let _sig = registry.register(id).await;
        registry.shutdown_all().await;
        assert!(registry.deregister(&id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_wait_closed_resolves_after_last_deregister() {
        let registry = SessionRegistry::new();
        registry.wait_closed().await;

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let sig_a = registry.register(a).await;
        let sig_b = registry.register(b).await;

        let waiter = tokio::spawn({
            let registry = registry.clone();
            async move { registry.wait_closed().await }
        });

        registry.shutdown_all().await;
        assert!(sig_a.await.is_ok());
        assert!(sig_b.await.is_ok());

        registry.deregister(&a).await;
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        registry.deregister(&b).await;
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
