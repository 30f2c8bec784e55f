//! Safe Removal Queue - close tabs without ever closing their window
//!
//! Closing the last tab of a window closes the window. A removal that would
//! do that is deferred to a scheduled task that re-checks the window every
//! `retry_delay` and only closes the tab once it has company. The task ends
//! when the tab is removed, vanishes, or is cancelled.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::events::{EventBus, LifecycleEvent};
use crate::host::TabsApi;
use crate::registry::ContainerRegistry;
use crate::types::{ContainerId, Tab, TabId, TabQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    /// Sole tab of its window; a retry task owns the removal now
    Deferred { task_id: Uuid },
    /// The tab vanished before it could be removed
    Gone,
    /// The host refused; nothing further will be attempted
    Failed,
}

enum Attempt {
    Removed,
    Gone,
    LastTab,
    Failed,
}

type PendingRemovals = Arc<DashMap<TabId, (Uuid, JoinHandle<()>)>>;

pub struct SafeRemovalQueue {
    tabs: Arc<dyn TabsApi>,
    registry: Arc<ContainerRegistry>,
    event_bus: EventBus,
    retry_delay: Duration,
    /// `None` polls until the tab gets company or the task is cancelled
    max_attempts: Option<u32>,
    pending: PendingRemovals,
}

impl SafeRemovalQueue {
    pub fn new(
        tabs: Arc<dyn TabsApi>,
        registry: Arc<ContainerRegistry>,
        event_bus: EventBus,
        retry_delay: Duration,
        max_attempts: Option<u32>,
    ) -> Self {
        Self {
            tabs,
            registry,
            event_bus,
            retry_delay,
            max_attempts,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Close `tab`, deferring while it is the last tab of its window
    pub async fn remove(&self, tab: &Tab) -> RemovalOutcome {
        if let Some(entry) = self.pending.get(&tab.id) {
            return RemovalOutcome::Deferred {
                task_id: entry.value().0,
            };
        }

        match Self::attempt(self.tabs.as_ref(), tab.id).await {
            Attempt::Removed => {
                tracing::debug!("[SafeRemovalQueue] Removed old tab {}", tab.id);
                self.event_bus
                    .publish(LifecycleEvent::TabRemoved { tab_id: tab.id });
                RemovalOutcome::Removed
            }
            Attempt::Gone => RemovalOutcome::Gone,
            Attempt::Failed => RemovalOutcome::Failed,
            Attempt::LastTab => {
                tracing::debug!(
                    "[SafeRemovalQueue] Queuing removal of tab {} to prevent closing of window {}",
                    tab.id,
                    tab.window_id
                );
                RemovalOutcome::Deferred {
                    task_id: self.schedule_retry(tab.id),
                }
            }
        }
    }

    /// Bookkeeping for a tab the host closed: drop any pending removal and
    /// queue its container for teardown if it was the container's last tab.
    pub fn add_to_remove_queue(&self, tab_id: TabId) -> Option<ContainerId> {
        self.cancel(tab_id);
        let queued = self.registry.queue_cleanup(tab_id);
        if let Some(container_id) = &queued {
            tracing::debug!(
                "[SafeRemovalQueue] Container {} queued for cleanup",
                container_id
            );
        }
        queued
    }

    pub fn cancel(&self, tab_id: TabId) -> bool {
        match self.pending.remove(&tab_id) {
            Some((_, (_, task))) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let pending: Vec<TabId> = self.pending.iter().map(|entry| *entry.key()).collect();
        for tab_id in pending {
            self.cancel(tab_id);
        }
    }

    pub fn is_pending(&self, tab_id: TabId) -> bool {
        self.pending.contains_key(&tab_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// A concurrent `remove` of the same tab may have scheduled a task while
    /// this one was suspended; that task keeps ownership.
    fn schedule_retry(&self, tab_id: TabId) -> Uuid {
        let slot = match self.pending.entry(tab_id) {
            Entry::Occupied(existing) => return existing.get().0,
            Entry::Vacant(slot) => slot,
        };

        let task_id = Uuid::now_v7();
        let tabs = self.tabs.clone();
        let event_bus = self.event_bus.clone();
        let pending = self.pending.clone();
        let retry_delay = self.retry_delay;
        let max_attempts = self.max_attempts;

        let task = tokio::spawn(async move {
            let mut attempts = 0u32;
            loop {
                tokio::time::sleep(retry_delay).await;
                attempts += 1;

                match Self::attempt(tabs.as_ref(), tab_id).await {
                    Attempt::LastTab => {
                        if max_attempts.is_some_and(|max| attempts >= max) {
                            tracing::warn!(
                                "[SafeRemovalQueue] Giving up on tab {} after {} attempts",
                                tab_id,
                                attempts
                            );
                            break;
                        }
                    }
                    Attempt::Removed => {
                        tracing::info!(
                            "[SafeRemovalQueue] Removed queued tab {} after {} attempts",
                            tab_id,
                            attempts
                        );
                        event_bus.publish(LifecycleEvent::TabRemoved { tab_id });
                        break;
                    }
                    Attempt::Gone | Attempt::Failed => break,
                }
            }
            pending.remove_if(&tab_id, |_, (id, _)| *id == task_id);
        });

        slot.insert((task_id, task));
        self.event_bus
            .publish(LifecycleEvent::RemovalDeferred { tab_id, task_id });
        task_id
    }

    async fn attempt(tabs: &dyn TabsApi, tab_id: TabId) -> Attempt {
        // the tab may have moved windows or closed since it was queued
        let tab = match tabs.get(tab_id).await {
            Ok(tab) => tab,
            Err(e) => {
                tracing::debug!("[SafeRemovalQueue] Tab {} is gone: {}", tab_id, e);
                return Attempt::Gone;
            }
        };

        let window_tabs = match tabs.query(TabQuery::window(tab.window_id)).await {
            Ok(window_tabs) => window_tabs,
            Err(e) => {
                tracing::debug!("[SafeRemovalQueue] Couldn't query tabs: {}", e);
                return Attempt::Failed;
            }
        };

        if window_tabs.len() <= 1 {
            return Attempt::LastTab;
        }

        match tabs.remove(tab_id).await {
            Ok(()) => Attempt::Removed,
            Err(e) if e.is_gone() => Attempt::Gone,
            Err(e) => {
                tracing::debug!(
                    "[SafeRemovalQueue] Error while removing tab {}: {}",
                    tab_id,
                    e
                );
                Attempt::Failed
            }
        }
    }
}
