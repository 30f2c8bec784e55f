//! In-memory browser host
//!
//! Plays every collaborator role without a browser: tabs live in per-window
//! vectors, collaborator calls are recorded for inspection. Closing the last
//! tab of a window closes the window, like the real thing.
//!
//! # Example
//!
//! ```ignore
//! let browser = Arc::new(MemoryBrowser::new());
//! let tab = browser.open_tab(1, "about:newtab", "firefox-default", true).await;
//! let coordinator = LifecycleCoordinator::new(Host::from_shared(browser.clone()), prefs, config);
//! coordinator.on_created(tab).await;
//! assert!(browser.calls().await.contains(&HostCall::AddBadge { tab_id: 1 }));
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{BrowserAction, ConfirmPageHandler, ContainerManager, PageAction, TabsApi};
use crate::error::{ContainerError, Result};
use crate::types::{ContainerId, CreateProperties, Tab, TabId, TabQuery, WindowId};

/// A recorded host or collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    CreateTab {
        tab_id: TabId,
        cookie_store_id: ContainerId,
        index: usize,
    },
    MoveTab {
        tab_id: TabId,
        index: usize,
    },
    RemoveTab {
        tab_id: TabId,
    },
    ReloadInTempContainer {
        tab_id: TabId,
        deletes_history: bool,
    },
    CreateInTempContainer {
        tab_id: TabId,
        cookie_store_id: ContainerId,
        deletes_history: bool,
    },
    AddHistory {
        tab_id: TabId,
        url: String,
    },
    ConfirmPage {
        tab_id: TabId,
    },
    ShowOrHide {
        tab_id: TabId,
    },
    AddBadge {
        tab_id: TabId,
    },
    RemoveBadge {
        tab_id: TabId,
    },
    DisableBrowserAction {
        tab_id: TabId,
    },
}

impl HostCall {
    /// Calls that change which tabs or containers exist
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            HostCall::CreateTab { .. }
                | HostCall::RemoveTab { .. }
                | HostCall::ReloadInTempContainer { .. }
                | HostCall::CreateInTempContainer { .. }
        )
    }
}

struct BrowserState {
    windows: BTreeMap<WindowId, Vec<Tab>>,
    current_window: WindowId,
    next_tab_id: TabId,
    next_container: u64,
    container_prefix: String,
    closed_windows: Vec<WindowId>,
    calls: Vec<HostCall>,
    fail_creates: bool,
}

impl BrowserState {
    fn find(&self, tab_id: TabId) -> Option<(WindowId, usize)> {
        self.windows.iter().find_map(|(window_id, tabs)| {
            tabs.iter()
                .position(|tab| tab.id == tab_id)
                .map(|position| (*window_id, position))
        })
    }

    fn tab(&self, tab_id: TabId) -> Option<Tab> {
        let (window_id, position) = self.find(tab_id)?;
        self.windows.get(&window_id)?.get(position).cloned()
    }

    fn reindex(tabs: &mut [Tab]) {
        for (index, tab) in tabs.iter_mut().enumerate() {
            tab.index = index;
        }
    }

    fn insert(&mut self, properties: CreateProperties) -> Tab {
        let window_id = properties.window_id.unwrap_or(self.current_window);
        let id = self.next_tab_id;
        self.next_tab_id += 1;

        let cookie_store_id = properties
            .cookie_store_id
            .unwrap_or_else(|| format!("{}-default", self.container_prefix));
        let active = properties.active.unwrap_or(true);

        let tabs = self.windows.entry(window_id).or_default();
        let index = properties.index.unwrap_or(tabs.len()).min(tabs.len());
        if active {
            tabs.iter_mut().for_each(|tab| tab.active = false);
        }
        tabs.insert(
            index,
            Tab {
                id,
                window_id,
                index,
                url: Some(properties.url.unwrap_or_else(|| "about:newtab".to_string())),
                cookie_store_id,
                incognito: false,
                active,
            },
        );
        Self::reindex(tabs);
        tabs[index].clone()
    }

    fn next_container_id(&mut self) -> ContainerId {
        let id = format!("{}-container-{}", self.container_prefix, self.next_container);
        self.next_container += 1;
        id
    }

    fn detach(&mut self, tab_id: TabId) -> Option<Tab> {
        let (window_id, position) = self.find(tab_id)?;
        let tabs = self.windows.get_mut(&window_id)?;
        let tab = tabs.remove(position);
        Self::reindex(tabs);
        if tabs.is_empty() {
            self.windows.remove(&window_id);
            self.closed_windows.push(window_id);
        }
        Some(tab)
    }
}

pub struct MemoryBrowser {
    state: Mutex<BrowserState>,
}

impl MemoryBrowser {
    pub fn new() -> Self {
        Self::with_container_prefix("firefox")
    }

    pub fn with_container_prefix(prefix: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(BrowserState {
                windows: BTreeMap::new(),
                current_window: 1,
                next_tab_id: 1,
                next_container: 1,
                container_prefix: prefix.into(),
                closed_windows: Vec::new(),
                calls: Vec::new(),
                fail_creates: false,
            }),
        }
    }

    /// Open a tab at the end of `window_id` without recording a call
    pub async fn open_tab(
        &self,
        window_id: WindowId,
        url: &str,
        cookie_store_id: &str,
        active: bool,
    ) -> Tab {
        self.state.lock().await.insert(CreateProperties {
            window_id: Some(window_id),
            index: None,
            cookie_store_id: Some(cookie_store_id.to_string()),
            url: Some(url.to_string()),
            active: Some(active),
        })
    }

    /// Same as [`open_tab`](Self::open_tab) but marks the tab incognito
    pub async fn open_private_tab(&self, window_id: WindowId, url: &str) -> Tab {
        let mut state = self.state.lock().await;
        let tab = state.insert(CreateProperties {
            window_id: Some(window_id),
            url: Some(url.to_string()),
            cookie_store_id: Some("firefox-private".to_string()),
            ..CreateProperties::default()
        });
        if let Some((window_id, position)) = state.find(tab.id) {
            if let Some(stored) = state
                .windows
                .get_mut(&window_id)
                .and_then(|tabs| tabs.get_mut(position))
            {
                stored.incognito = true;
                return stored.clone();
            }
        }
        tab
    }

    /// Change a tab's URL, as a navigation would
    pub async fn navigate(&self, tab_id: TabId, url: &str) -> Option<Tab> {
        let mut state = self.state.lock().await;
        let (window_id, position) = state.find(tab_id)?;
        let tab = state.windows.get_mut(&window_id)?.get_mut(position)?;
        tab.url = Some(url.to_string());
        Some(tab.clone())
    }

    /// Close a tab as the user would, without recording a call
    pub async fn close_tab(&self, tab_id: TabId) -> bool {
        self.state.lock().await.detach(tab_id).is_some()
    }

    pub async fn set_current_window(&self, window_id: WindowId) {
        self.state.lock().await.current_window = window_id;
    }

    pub async fn set_fail_creates(&self, fail: bool) {
        self.state.lock().await.fail_creates = fail;
    }

    pub async fn tab(&self, tab_id: TabId) -> Option<Tab> {
        self.state.lock().await.tab(tab_id)
    }

    pub async fn window_tabs(&self, window_id: WindowId) -> Vec<Tab> {
        self.state
            .lock()
            .await
            .windows
            .get(&window_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn closed_windows(&self) -> Vec<WindowId> {
        self.state.lock().await.closed_windows.clone()
    }

    pub async fn calls(&self) -> Vec<HostCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    async fn record(&self, call: HostCall) {
        self.state.lock().await.calls.push(call);
    }
}

impl Default for MemoryBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TabsApi for MemoryBrowser {
    async fn query(&self, query: TabQuery) -> Result<Vec<Tab>> {
        let state = self.state.lock().await;
        let tabs = state
            .windows
            .iter()
            .filter(|(window_id, _)| query.window_id.map_or(true, |id| id == **window_id))
            .filter(|(window_id, _)| !query.current_window || **window_id == state.current_window)
            .flat_map(|(_, tabs)| tabs.iter())
            .filter(|tab| query.active.map_or(true, |active| tab.active == active))
            .cloned()
            .collect();
        Ok(tabs)
    }

    async fn get(&self, tab_id: TabId) -> Result<Tab> {
        self.state
            .lock()
            .await
            .tab(tab_id)
            .ok_or(ContainerError::TabNotFound(tab_id))
    }

    async fn create(&self, properties: CreateProperties) -> Result<Tab> {
        let mut state = self.state.lock().await;
        if state.fail_creates {
            return Err(ContainerError::Host("tab creation refused".to_string()));
        }
        let tab = state.insert(properties);
        state.calls.push(HostCall::CreateTab {
            tab_id: tab.id,
            cookie_store_id: tab.cookie_store_id.clone(),
            index: tab.index,
        });
        Ok(tab)
    }

    async fn move_tab(&self, tab_id: TabId, index: usize) -> Result<()> {
        let mut state = self.state.lock().await;
        let (window_id, position) = state
            .find(tab_id)
            .ok_or(ContainerError::TabNotFound(tab_id))?;
        let tabs = state
            .windows
            .get_mut(&window_id)
            .ok_or(ContainerError::WindowNotFound(window_id))?;
        let tab = tabs.remove(position);
        let index = index.min(tabs.len());
        tabs.insert(index, tab);
        BrowserState::reindex(tabs);
        state.calls.push(HostCall::MoveTab { tab_id, index });
        Ok(())
    }

    async fn remove(&self, tab_id: TabId) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .detach(tab_id)
            .ok_or(ContainerError::TabNotFound(tab_id))?;
        state.calls.push(HostCall::RemoveTab { tab_id });
        Ok(())
    }
}

#[async_trait]
impl ContainerManager for MemoryBrowser {
    /// Opens the replacement right after the original and leaves the
    /// original open
    async fn reload_tab_in_temp_container(&self, tab: &Tab, deletes_history: bool) -> Result<Tab> {
        let mut state = self.state.lock().await;
        if state.fail_creates {
            return Err(ContainerError::Host("tab creation refused".to_string()));
        }
        let container_id = state.next_container_id();
        let replacement = state.insert(CreateProperties {
            window_id: Some(tab.window_id),
            index: Some(tab.index + 1),
            cookie_store_id: Some(container_id),
            url: tab.url.clone(),
            active: Some(tab.active),
        });
        state.calls.push(HostCall::ReloadInTempContainer {
            tab_id: tab.id,
            deletes_history,
        });
        Ok(replacement)
    }

    async fn create_tab_in_temp_container(&self, deletes_history: bool) -> Result<Tab> {
        let mut state = self.state.lock().await;
        if state.fail_creates {
            return Err(ContainerError::Host("tab creation refused".to_string()));
        }
        let container_id = state.next_container_id();

        let tab = state.insert(CreateProperties::in_container(container_id.clone()));
        state.calls.push(HostCall::CreateInTempContainer {
            tab_id: tab.id,
            cookie_store_id: container_id,
            deletes_history,
        });
        Ok(tab)
    }

    async fn maybe_add_history(&self, tab: &Tab, url: &str) -> Result<()> {
        self.record(HostCall::AddHistory {
            tab_id: tab.id,
            url: url.to_string(),
        })
        .await;
        Ok(())
    }
}

#[async_trait]
impl ConfirmPageHandler for MemoryBrowser {
    async fn handle_confirm_page(&self, tab: &Tab) -> Result<()> {
        self.record(HostCall::ConfirmPage { tab_id: tab.id }).await;
        Ok(())
    }
}

#[async_trait]
impl PageAction for MemoryBrowser {
    async fn show_or_hide(&self, tab: &Tab) {
        self.record(HostCall::ShowOrHide { tab_id: tab.id }).await;
    }
}

#[async_trait]
impl BrowserAction for MemoryBrowser {
    async fn add_badge(&self, tab_id: TabId) {
        self.record(HostCall::AddBadge { tab_id }).await;
    }

    async fn remove_badge(&self, tab_id: TabId) {
        self.record(HostCall::RemoveBadge { tab_id }).await;
    }

    async fn disable(&self, tab_id: TabId) {
        self.record(HostCall::DisableBrowserAction { tab_id }).await;
    }
}
