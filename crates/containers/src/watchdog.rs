//! Watchdog System - delayed reactions to tab events
//!
//! A watchdog sees every tab event the coordinator accepts and decides on
//! its own what to care about. Anything it schedules must survive the tab
//! disappearing underneath it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::events::TabEvent;

#[async_trait]
pub trait Watchdog: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// Handle a tab event. Called for every event, incognito tabs excluded.
    async fn on_event(&self, event: &TabEvent);

    /// Called on coordinator shutdown; abort anything still scheduled
    async fn on_detach(&self) {}
}

/// Dispatches tab events to all registered watchdogs
pub struct WatchdogManager {
    watchdogs: Vec<Arc<dyn Watchdog>>,
}

impl WatchdogManager {
    pub fn new() -> Self {
        Self {
            watchdogs: Vec::new(),
        }
    }

    pub fn register(&mut self, watchdog: Arc<dyn Watchdog>) {
        tracing::debug!("Registered watchdog: {}", watchdog.name());
        self.watchdogs.push(watchdog);
    }

    pub fn len(&self) -> usize {
        self.watchdogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchdogs.is_empty()
    }

    pub async fn detach_all(&self) {
        for watchdog in &self.watchdogs {
            watchdog.on_detach().await;
            tracing::info!("[{}] Detached", watchdog.name());
        }
    }

    /// Dispatch event to all watchdogs concurrently
    pub async fn dispatch(&self, event: &TabEvent) {
        use futures_util::future::join_all;

        let tasks: Vec<_> = self
            .watchdogs
            .iter()
            .map(|w| async move {
                w.on_event(event).await;
            })
            .collect();

        join_all(tasks).await;
    }
}

impl Default for WatchdogManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingWatchdog {
        name: String,
        event_count: Arc<AtomicUsize>,
        detached: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Watchdog for CountingWatchdog {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_event(&self, _event: &TabEvent) {
            self.event_count.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_detach(&self) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_watchdog_dispatch() {
        let counter = Arc::new(AtomicUsize::new(0));
        let detached = Arc::new(AtomicUsize::new(0));
        let mut manager = WatchdogManager::new();

        for name in ["first", "second"] {
            manager.register(Arc::new(CountingWatchdog {
                name: name.to_string(),
                event_count: counter.clone(),
                detached: detached.clone(),
            }));
        }
        assert_eq!(manager.len(), 2);

        manager.dispatch(&TabEvent::Removed { tab_id: 1 }).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        manager.detach_all().await;
        assert_eq!(detached.load(Ordering::SeqCst), 2);
    }
}
