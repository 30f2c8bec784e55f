//! Redirector Watchdog - closes tabs parked on redirector domains
//!
//! Responsibilities:
//! - Notice navigation completing on a configured redirector hostname
//! - Re-check the tab after the configured delay
//! - Close it only if it is *still* on a redirector hostname
//!
//! The decision is made on the hostname at fire time. A tab that passed
//! through a redirector on its way somewhere else is left alone.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::events::{EventBus, LifecycleEvent, TabEvent};
use crate::host::TabsApi;
use crate::preferences::SharedPreferences;
use crate::types::{TabId, TabStatus};
use crate::urls;
use crate::watchdog::Watchdog;

type ScheduledChecks = Arc<DashMap<TabId, (Uuid, JoinHandle<()>)>>;

pub struct RedirectorWatchdog {
    tabs: Arc<dyn TabsApi>,
    preferences: SharedPreferences,
    event_bus: EventBus,
    /// One pending check per tab; rescheduling replaces it
    scheduled: ScheduledChecks,
}

impl RedirectorWatchdog {
    pub fn new(tabs: Arc<dyn TabsApi>, preferences: SharedPreferences, event_bus: EventBus) -> Self {
        Self {
            tabs,
            preferences,
            event_bus,
            scheduled: Arc::new(DashMap::new()),
        }
    }

    /// Re-check `tab_id` against `domains` after `delay`
    pub fn schedule(&self, tab_id: TabId, delay: Duration, domains: Vec<String>) {
        let task_id = Uuid::now_v7();
        let tabs = self.tabs.clone();
        let event_bus = self.event_bus.clone();
        let scheduled = self.scheduled.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Self::check(tabs.as_ref(), tab_id, &domains, &event_bus).await;
            scheduled.remove_if(&tab_id, |_, (id, _)| *id == task_id);
        });

        if let Some((_, (_, previous))) = self.scheduled.remove(&tab_id) {
            previous.abort();
        }
        self.scheduled.insert(tab_id, (task_id, task));

        tracing::debug!(
            "[RedirectorWatchdog] Check for tab {} scheduled in {:?}",
            tab_id,
            delay
        );
        self.event_bus
            .publish(LifecycleEvent::RedirectorCheckScheduled { tab_id });
    }

    /// Drop a pending check. Returns true if one was pending.
    pub fn cancel(&self, tab_id: TabId) -> bool {
        match self.scheduled.remove(&tab_id) {
            Some((_, (_, task))) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, tab_id: TabId) -> bool {
        self.scheduled.contains_key(&tab_id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    async fn check(tabs: &dyn TabsApi, tab_id: TabId, domains: &[String], event_bus: &EventBus) {
        let tab = match tabs.get(tab_id).await {
            Ok(tab) => tab,
            Err(e) => {
                tracing::debug!(
                    "[RedirectorWatchdog] Error while requesting tab info: {}",
                    e
                );
                return;
            }
        };

        let still_matching = tab
            .url()
            .is_some_and(|url| urls::matches_domain(url, domains));
        if !still_matching {
            tracing::debug!(
                "[RedirectorWatchdog] Tab {} moved on to {:?}, keeping it",
                tab_id,
                tab.url
            );
            return;
        }

        match tabs.remove(tab_id).await {
            Ok(()) => {
                tracing::info!("[RedirectorWatchdog] Removed redirector tab {}", tab_id);
                event_bus.publish(LifecycleEvent::RedirectorTabClosed { tab_id });
            }
            Err(e) => {
                tracing::debug!(
                    "[RedirectorWatchdog] Failed to remove redirector tab {}: {}",
                    tab_id,
                    e
                );
            }
        }
    }
}

#[async_trait]
impl Watchdog for RedirectorWatchdog {
    fn name(&self) -> &str {
        "RedirectorWatchdog"
    }

    async fn on_event(&self, event: &TabEvent) {
        match event {
            TabEvent::Updated {
                tab_id,
                change_info,
                tab,
            } => {
                if change_info.status != Some(TabStatus::Complete) {
                    return;
                }
                let settings = self.preferences.read().await.close_redirector_tabs.clone();
                if !settings.active {
                    return;
                }
                if tab
                    .url()
                    .is_some_and(|url| urls::matches_domain(url, &settings.domains))
                {
                    self.schedule(
                        *tab_id,
                        Duration::from_millis(settings.delay),
                        settings.domains,
                    );
                }
            }

            TabEvent::Removed { tab_id } => {
                if self.cancel(*tab_id) {
                    tracing::debug!(
                        "[RedirectorWatchdog] Tab {} closed, check dropped",
                        tab_id
                    );
                }
            }

            _ => {
                // Ignore other events
            }
        }
    }

    async fn on_detach(&self) {
        let pending: Vec<TabId> = self.scheduled.iter().map(|entry| *entry.key()).collect();
        for tab_id in pending {
            self.cancel(tab_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCall, MemoryBrowser};
    use crate::preferences::Preferences;
    use crate::types::ChangeInfo;

    fn redirector_prefs() -> SharedPreferences {
        let mut prefs = Preferences::default();
        prefs.close_redirector_tabs.active = true;
        prefs.close_redirector_tabs.domains = vec!["t.co".to_string()];
        prefs.close_redirector_tabs.delay = 500;
        prefs.into_shared()
    }

    fn setup(prefs: SharedPreferences) -> (Arc<MemoryBrowser>, RedirectorWatchdog) {
        let browser = Arc::new(MemoryBrowser::new());
        let watchdog = RedirectorWatchdog::new(browser.clone(), prefs, EventBus::new());
        (browser, watchdog)
    }

    fn completed(tab: &crate::types::Tab) -> TabEvent {
        TabEvent::Updated {
            tab_id: tab.id,
            change_info: ChangeInfo::status(TabStatus::Complete),
            tab: tab.clone(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_closes_tab_still_on_redirector() {
        let (browser, watchdog) = setup(redirector_prefs());
        browser.open_tab(1, "https://example.com", "firefox-default", true).await;
        let tab = browser.open_tab(1, "https://t.co/abc", "firefox-default", false).await;

        watchdog.on_event(&completed(&tab)).await;
        assert!(watchdog.is_scheduled(tab.id));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(browser.tab(tab.id).await.is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(browser.tab(tab.id).await.is_none());
        assert!(browser
            .calls()
            .await
            .contains(&HostCall::RemoveTab { tab_id: tab.id }));
        assert_eq!(watchdog.scheduled_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_tab_that_navigated_away() {
        let (browser, watchdog) = setup(redirector_prefs());
        let tab = browser.open_tab(1, "https://t.co/abc", "firefox-default", true).await;

        watchdog.on_event(&completed(&tab)).await;
        browser.navigate(tab.id, "https://news.example.org/story").await;

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(browser.tab(tab.id).await.is_some());
        assert!(browser.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_tab_is_nothing_to_do() {
        let (browser, watchdog) = setup(redirector_prefs());
        let tab = browser.open_tab(1, "https://t.co/abc", "firefox-default", true).await;

        watchdog.schedule(tab.id, Duration::from_millis(500), vec!["t.co".to_string()]);
        browser.close_tab(tab.id).await;

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(browser.calls().await.is_empty());
        assert_eq!(watchdog.scheduled_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_or_incomplete_does_not_schedule() {
        let (browser, watchdog) = setup(Preferences::default().into_shared());
        let tab = browser.open_tab(1, "https://t.co/abc", "firefox-default", true).await;
        watchdog.on_event(&completed(&tab)).await;
        assert!(!watchdog.is_scheduled(tab.id));

        let (browser, watchdog) = setup(redirector_prefs());
        let tab = browser.open_tab(1, "https://t.co/abc", "firefox-default", true).await;
        watchdog
            .on_event(&TabEvent::Updated {
                tab_id: tab.id,
                change_info: ChangeInfo::status(TabStatus::Loading),
                tab: tab.clone(),
            })
            .await;
        assert!(!watchdog.is_scheduled(tab.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_completion_schedules_once() {
        let (browser, watchdog) = setup(redirector_prefs());
        browser.open_tab(1, "https://example.com", "firefox-default", true).await;
        let tab = browser.open_tab(1, "https://t.co/abc", "firefox-default", false).await;

        watchdog.on_event(&completed(&tab)).await;
        watchdog.on_event(&completed(&tab)).await;
        assert_eq!(watchdog.scheduled_count(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let removals = browser
            .calls()
            .await
            .into_iter()
            .filter(|call| matches!(call, HostCall::RemoveTab { .. }))
            .count();
        assert_eq!(removals, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_event_cancels_check() {
        let (browser, watchdog) = setup(redirector_prefs());
        let tab = browser.open_tab(1, "https://t.co/abc", "firefox-default", true).await;

        watchdog.on_event(&completed(&tab)).await;
        watchdog.on_event(&TabEvent::Removed { tab_id: tab.id }).await;
        assert!(!watchdog.is_scheduled(tab.id));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(browser.tab(tab.id).await.is_some());
    }
}
