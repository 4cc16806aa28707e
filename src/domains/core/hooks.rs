use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::types::ChangeEvent;

/// Receives entity mutation events after the write has landed.
#[async_trait]
pub trait ChangeListener: Send + Sync {
    async fn on_change(&self, event: &ChangeEvent);
}

/// Fan-out point for entity mutations.
///
/// Repositories dispatch exactly one event per logical write (create,
/// update, soft/hard delete). Listeners decide for themselves which events
/// they act on; the dispatcher itself never filters, so a listener that
/// must ignore revision or reference-sync writes checks `event.origin`.
///
/// Registration happens once at wiring time; dispatch is read-only.
#[derive(Default)]
pub struct ChangeDispatcher {
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners
            .write()
            .expect("change listener registry poisoned")
            .push(listener);
    }

    pub async fn dispatch(&self, event: ChangeEvent) {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .expect("change listener registry poisoned")
            .clone();
        for listener in listeners {
            listener.on_change(&event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl ChangeListener for CountingListener {
        async fn on_change(&self, _event: &ChangeEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_every_listener() {
        let dispatcher = ChangeDispatcher::new();
        let first = Arc::new(CountingListener { seen: AtomicUsize::new(0) });
        let second = Arc::new(CountingListener { seen: AtomicUsize::new(0) });
        dispatcher.register(first.clone());
        dispatcher.register(second.clone());

        dispatcher.dispatch(ChangeEvent::created(EntityType::Project, 1)).await;
        dispatcher.dispatch(ChangeEvent::deleted(EntityType::Project, 1)).await;

        assert_eq!(first.seen.load(Ordering::SeqCst), 2);
        assert_eq!(second.seen.load(Ordering::SeqCst), 2);
    }
}
