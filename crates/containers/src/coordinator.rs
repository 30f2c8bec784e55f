//! Lifecycle Coordinator - reacts to tab events
//!
//! One handler per host event. Each handler reads what it needs, asks the
//! pure [`decision::evaluate`] what to do and performs the resulting
//! [`Action`]. Host calls are suspension points: other events may be handled
//! meanwhile, so anything destructive re-validates after them (the removal
//! queue re-fetches the tab, the redirector re-reads the URL).
//!
//! Host-level lookup failures are logged and treated as "nothing to do".

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::decision::{self, Action, DecisionContext};
use crate::error::{ContainerError, Result};
use crate::events::{EventBus, LifecycleEvent, TabEvent};
use crate::guard::SameContainerGuard;
use crate::host::Host;
use crate::preferences::{Preferences, SharedPreferences};
use crate::registry::ContainerRegistry;
use crate::removal::SafeRemovalQueue;
use crate::types::{
    ActiveInfo, ChangeInfo, Container, CreateProperties, Tab, TabId, TabQuery,
};
use crate::urls;
use crate::watchdog::WatchdogManager;
use crate::watchdogs::RedirectorWatchdog;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub id: String,
    /// Delay between attempts to remove the last tab of a window
    pub removal_retry_delay: Duration,
    /// `None` retries until the window gains a tab or the tab closes
    pub removal_max_attempts: Option<u32>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            removal_retry_delay: Duration::from_millis(500),
            removal_max_attempts: None,
        }
    }
}

pub struct LifecycleCoordinator {
    pub config: CoordinatorConfig,
    host: Host,
    preferences: SharedPreferences,
    registry: Arc<ContainerRegistry>,
    removal: SafeRemovalQueue,
    redirector: Arc<RedirectorWatchdog>,
    watchdog_manager: WatchdogManager,
    guard: SameContainerGuard,
    event_bus: EventBus,
}

impl LifecycleCoordinator {
    pub fn new(host: Host, preferences: Preferences, config: CoordinatorConfig) -> Self {
        Self::with_registry(host, preferences, config, Arc::new(ContainerRegistry::new()))
    }

    /// Start from a registry restored out of persisted state, or one the
    /// host's container manager also writes to
    pub fn with_registry(
        host: Host,
        preferences: Preferences,
        config: CoordinatorConfig,
        registry: Arc<ContainerRegistry>,
    ) -> Self {
        log_conflicts(&preferences);

        let preferences = preferences.into_shared();
        let event_bus = EventBus::new();

        let removal = SafeRemovalQueue::new(
            host.tabs.clone(),
            registry.clone(),
            event_bus.clone(),
            config.removal_retry_delay,
            config.removal_max_attempts,
        );

        let redirector = Arc::new(RedirectorWatchdog::new(
            host.tabs.clone(),
            preferences.clone(),
            event_bus.clone(),
        ));
        let mut watchdog_manager = WatchdogManager::new();
        watchdog_manager.register(redirector.clone());

        tracing::info!("[Coordinator] {} created", config.id);

        Self {
            config,
            host,
            preferences,
            registry,
            removal,
            redirector,
            watchdog_manager,
            guard: SameContainerGuard::new(),
            event_bus,
        }
    }

    pub fn registry(&self) -> &Arc<ContainerRegistry> {
        &self.registry
    }

    pub fn removal_queue(&self) -> &SafeRemovalQueue {
        &self.removal
    }

    pub fn redirector(&self) -> &RedirectorWatchdog {
        &self.redirector
    }

    pub fn same_container_guard(&self) -> &SameContainerGuard {
        &self.guard
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_bus.subscribe()
    }

    pub async fn preferences(&self) -> Preferences {
        self.preferences.read().await.clone()
    }

    pub async fn update_preferences(&self, preferences: Preferences) {
        log_conflicts(&preferences);
        *self.preferences.write().await = preferences;
    }

    /// Reconcile with tabs that already exist, e.g. after install or restart
    pub async fn initialize(&self) {
        let tabs = match self.host.tabs.query(TabQuery::all()).await {
            Ok(tabs) => tabs,
            Err(e) => {
                tracing::warn!("[Coordinator] Couldn't query tabs on startup: {}", e);
                return;
            }
        };

        tracing::info!("[Coordinator] Reconciling {} existing tabs", tabs.len());
        for tab in tabs {
            if self.registry.map_tab(tab.id, &tab.cookie_store_id) {
                tracing::debug!(
                    "[Coordinator] Tab {} belongs to temporary container {}",
                    tab.id,
                    tab.cookie_store_id
                );
            }
            self.maybe_reload_in_temp_container(&tab, &ChangeInfo::default())
                .await;
        }
    }

    /// Handle events from `events` one at a time until the sender closes
    pub async fn run(&self, mut events: mpsc::Receiver<TabEvent>) {
        tracing::info!("[Coordinator] Event loop started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        tracing::info!("[Coordinator] Event loop stopped");
    }

    pub async fn handle(&self, event: TabEvent) {
        match event {
            TabEvent::Created { tab } => self.on_created(tab).await,
            TabEvent::Updated {
                tab_id,
                change_info,
                tab,
            } => self.on_updated(tab_id, change_info, tab).await,
            TabEvent::Removed { tab_id } => self.on_removed(tab_id).await,
            TabEvent::Activated { active_info } => self.on_activated(active_info).await,
        }
    }

    pub async fn on_created(&self, mut tab: Tab) {
        tracing::debug!(
            "[Coordinator] Tab {} created in window {}",
            tab.id,
            tab.window_id
        );
        if tab.incognito {
            tracing::debug!("[Coordinator] Tab {} is incognito, ignoring", tab.id);
            self.host.browser_action.disable(tab.id).await;
            return;
        }

        if !tab.active {
            self.keep_inactive_tab_order(&mut tab).await;
        }

        if !self.registry.is_mapped(tab.id) && self.registry.map_tab(tab.id, &tab.cookie_store_id)
        {
            tracing::debug!(
                "[Coordinator] Tab {} mapped to temporary container {}",
                tab.id,
                tab.cookie_store_id
            );
        }

        self.maybe_reload_in_temp_container(&tab, &ChangeInfo::default())
            .await;
    }

    pub async fn on_updated(&self, tab_id: TabId, change_info: ChangeInfo, tab: Tab) {
        tracing::debug!("[Coordinator] Tab {} updated: {:?}", tab_id, change_info);
        if tab.incognito {
            tracing::debug!("[Coordinator] Tab {} is incognito, ignoring", tab_id);
            self.host.browser_action.disable(tab.id).await;
            return;
        }

        if let Some(url) = &change_info.url {
            if let Err(e) = self.host.containers.maybe_add_history(&tab, url).await {
                tracing::debug!("[Coordinator] Adding history for tab {} failed: {}", tab_id, e);
            }
        }

        self.watchdog_manager
            .dispatch(&TabEvent::Updated {
                tab_id,
                change_info: change_info.clone(),
                tab: tab.clone(),
            })
            .await;

        if change_info.url.is_none() {
            tracing::debug!("[Coordinator] Url of tab {} didn't change, not relevant", tab_id);
            return;
        }

        self.host.page_action.show_or_hide(&tab).await;
        self.maybe_reload_in_temp_container(&tab, &change_info)
            .await;
    }

    pub async fn on_removed(&self, tab_id: TabId) {
        tracing::debug!("[Coordinator] Tab {} removed", tab_id);
        self.registry.include_tab(tab_id);
        self.registry.clear_confirm_page(tab_id);
        self.registry.end_replacement(tab_id);
        self.registry.clear_badge(tab_id);
        self.removal.add_to_remove_queue(tab_id);
        self.watchdog_manager
            .dispatch(&TabEvent::Removed { tab_id })
            .await;
    }

    pub async fn on_activated(&self, active_info: ActiveInfo) {
        tracing::debug!("[Coordinator] Tab {} activated", active_info.tab_id);
        self.registry.clear_last_inactive_tab(active_info.window_id);

        match self.host.tabs.get(active_info.tab_id).await {
            Ok(tab) if !tab.incognito => self.host.page_action.show_or_hide(&tab).await,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    "[Coordinator] Activated tab {} went away: {}",
                    active_info.tab_id,
                    e
                );
            }
        }
    }

    /// Decide what to do with `tab` and do it
    pub async fn maybe_reload_in_temp_container(
        &self,
        tab: &Tab,
        change_info: &ChangeInfo,
    ) -> Action {
        let prefs = self.preferences.read().await.clone();
        let ctx = DecisionContext {
            preferences: &prefs,
            creating_in_same_container: self.guard.is_active(),
            excluded: self.registry.is_excluded(tab.id),
            container_temporary: self.registry.is_temporary(&tab.cookie_store_id),
            container_clean: self.registry.is_clean(&tab.cookie_store_id),
        };
        let action = decision::evaluate(tab, change_info, &ctx);

        tracing::debug!("[Coordinator] Decision for tab {}: {:?}", tab.id, action);
        self.event_bus.publish(LifecycleEvent::Decision {
            tab_id: tab.id,
            action: action.clone(),
        });

        self.perform(tab, &action, &prefs).await;
        action
    }

    async fn perform(&self, tab: &Tab, action: &Action, prefs: &Preferences) {
        match action {
            Action::DisableAffordance => {
                self.host.browser_action.disable(tab.id).await;
                return;
            }
            Action::Ignore { reason } => {
                tracing::debug!("[Coordinator] Ignoring tab {}: {:?}", tab.id, reason);
                return;
            }
            Action::AddPendingBadge => {
                self.add_badge(tab.id, prefs).await;
                return;
            }
            _ => {}
        }

        // the tab moved past its new-tab page
        self.remove_badge(tab.id, prefs).await;

        match action {
            Action::HandleConfirmPage => {
                self.registry.mark_confirm_page(tab.id);
                if let Err(e) = self.host.confirm_page.handle_confirm_page(tab).await {
                    tracing::debug!("[Coordinator] Confirm page for tab {} failed: {}", tab.id, e);
                }
            }
            Action::OpenInDefaultContainer => self.open_in_default_container(tab, prefs).await,
            Action::ReloadInTempContainer { deletes_history } => {
                self.reload_in_temp_container(tab, *deletes_history).await
            }
            Action::MarkDirty { container_id } => {
                if self.registry.mark_dirty(container_id) {
                    tracing::debug!(
                        "[Coordinator] Marking temporary container {} as not clean anymore",
                        container_id
                    );
                }
            }
            _ => {
                tracing::debug!(
                    "[Coordinator] Not a home/new/extension tab or disabled, not handling tab {}",
                    tab.id
                );
            }
        }
    }

    async fn reload_in_temp_container(&self, tab: &Tab, deletes_history: bool) {
        if !self.claim_replacement(tab.id) {
            return;
        }
        match self
            .host
            .containers
            .reload_tab_in_temp_container(tab, deletes_history)
            .await
        {
            Ok(replacement) => {
                tracing::debug!(
                    "[Coordinator] Tab {} reloaded as tab {} in {}",
                    tab.id,
                    replacement.id,
                    replacement.cookie_store_id
                );
                self.track_temp_tab(&replacement, deletes_history);
            }
            Err(e) => {
                tracing::debug!(
                    "[Coordinator] Reloading tab {} in temporary container failed: {}",
                    tab.id,
                    e
                );
                self.registry.end_replacement(tab.id);
            }
        }
    }

    /// Register the fresh container of `tab` and map the tab to it
    fn track_temp_tab(&self, tab: &Tab, deletes_history: bool) {
        self.registry.add_temporary(Container::temporary(
            tab.cookie_store_id.clone(),
            deletes_history,
        ));
        self.registry.map_tab(tab.id, &tab.cookie_store_id);
    }

    async fn open_in_default_container(&self, tab: &Tab, prefs: &Preferences) {
        if !self.claim_replacement(tab.id) {
            return;
        }
        let created = match self
            .host
            .tabs
            .create(CreateProperties::in_container(prefs.default_container()))
            .await
        {
            Ok(created) => created,
            Err(e) => {
                tracing::debug!(
                    "[Coordinator] Couldn't open default container tab for {}: {}",
                    tab.id,
                    e
                );
                self.registry.end_replacement(tab.id);
                return;
            }
        };

        let outcome = self.removal.remove(tab).await;
        tracing::debug!(
            "[Coordinator] Tab {} replaced by default container tab {}: {:?}",
            tab.id,
            created.id,
            outcome
        );

        self.add_badge(created.id, prefs).await;
    }

    fn claim_replacement(&self, tab_id: TabId) -> bool {
        if self.registry.begin_replacement(tab_id) {
            return true;
        }
        tracing::debug!("[Coordinator] Tab {} is already being replaced", tab_id);
        self.event_bus
            .publish(LifecycleEvent::ReplacementSkipped { tab_id });
        false
    }

    /// Badges are only shown, and only recorded, while isolation is active
    async fn add_badge(&self, tab_id: TabId, prefs: &Preferences) {
        if prefs.isolation.active && self.registry.mark_badged(tab_id) {
            self.host.browser_action.add_badge(tab_id).await;
        }
    }

    async fn remove_badge(&self, tab_id: TabId, prefs: &Preferences) {
        if self.registry.clear_badge(tab_id) && prefs.isolation.active {
            self.host.browser_action.remove_badge(tab_id).await;
        }
    }

    /// Background tabs opened in quick succession can land in front of the
    /// one opened just before them; put them back behind it.
    async fn keep_inactive_tab_order(&self, tab: &mut Tab) {
        let window_id = tab.window_id;

        if let Some(last_id) = self.registry.last_inactive_tab(window_id) {
            if last_id == tab.id {
                return;
            }
            match self.host.tabs.get(last_id).await {
                Ok(last) if last.window_id == window_id && last.index > tab.index => {
                    tracing::debug!(
                        "[Coordinator] Moving tab {} behind tab {} to index {}",
                        tab.id,
                        last.id,
                        last.index
                    );
                    match self.host.tabs.move_tab(tab.id, last.index).await {
                        Ok(()) => {
                            tab.index = last.index;
                            self.event_bus.publish(LifecycleEvent::TabMoved {
                                tab_id: tab.id,
                                index: last.index,
                            });
                        }
                        Err(e) => tracing::debug!("[Coordinator] Moving tab {} failed: {}", tab.id, e),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        "[Coordinator] Getting last created inactive tab failed: {}",
                        e
                    );
                }
            }
        }

        self.registry.set_last_inactive_tab(window_id, tab.id);
    }

    /// Open a tab next to the active one, in the same container, without the
    /// coordinator reacting to it
    pub async fn create_in_same_container(&self) -> Result<Tab> {
        let _token = self
            .guard
            .try_acquire()
            .ok_or(ContainerError::CreationInProgress)?;

        let active = self
            .host
            .tabs
            .query(TabQuery::active_in_current_window())
            .await?
            .into_iter()
            .next()
            .ok_or(ContainerError::NoActiveTab)?;

        let tab = self
            .host
            .tabs
            .create(CreateProperties {
                window_id: Some(active.window_id),
                index: Some(active.index + 1),
                cookie_store_id: Some(active.cookie_store_id.clone()),
                ..CreateProperties::default()
            })
            .await?;

        tracing::debug!(
            "[Coordinator] New same container tab {} created next to {}",
            tab.id,
            active.id
        );
        Ok(tab)
    }

    /// Open a tab that lifecycle handling leaves alone until it closes
    pub async fn open_excluded_tab(&self, properties: CreateProperties) -> Result<Tab> {
        let _token = self
            .guard
            .try_acquire()
            .ok_or(ContainerError::CreationInProgress)?;

        let tab = self.host.tabs.create(properties).await?;
        self.registry.exclude_tab(tab.id);
        tracing::debug!("[Coordinator] Tab {} excluded from container handling", tab.id);
        Ok(tab)
    }

    /// Open a new tab in a fresh temporary container (browser action click)
    pub async fn open_in_temp_container(&self) -> Result<Tab> {
        let deletes_history = self
            .preferences
            .read()
            .await
            .deletes_history_automatically();

        let tab = self
            .host
            .containers
            .create_tab_in_temp_container(deletes_history)
            .await?;

        self.track_temp_tab(&tab, deletes_history);
        Ok(tab)
    }

    /// Container cleanup must not run when there are no tabs, only incognito
    /// tabs, or a session restore page
    pub async fn only_incognito_none_or_session_restore(&self) -> bool {
        match self.host.tabs.query(TabQuery::all()).await {
            Ok(tabs) => {
                tabs.is_empty()
                    || tabs
                        .iter()
                        .any(|tab| tab.incognito || tab.url_is(urls::ABOUT_SESSIONRESTORE))
            }
            Err(e) => {
                tracing::debug!("[Coordinator] Failed to query tabs: {}", e);
                false
            }
        }
    }

    pub async fn shutdown(&self) {
        self.watchdog_manager.detach_all().await;
        self.removal.cancel_all();
        tracing::info!("[Coordinator] {} shut down", self.config.id);
    }
}

fn log_conflicts(preferences: &Preferences) {
    for conflict in preferences.conflicts() {
        tracing::warn!(
            "[Coordinator] Preference conflict {:?}, first matching rule wins",
            conflict
        );
    }
}
