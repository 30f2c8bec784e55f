//! Container Registry - bookkeeping for temporary containers and their tabs
//!
//! Every map is keyed by host-assigned ids that die with the tab or window.
//! Entries are added from creation hooks and removed from the removal hook;
//! nothing here talks to the host.
//!
//! Invariants:
//! - a tab is mapped iff its container is a tracked temporary container
//! - a tab is never both mapped and excluded
//! - a container's `clean` flag only ever goes from true to false

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Container, ContainerId, TabId, WindowId};

/// Persistable part of the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub temp_containers: HashMap<ContainerId, Container>,
}

#[derive(Default)]
pub struct ContainerRegistry {
    temp_containers: DashMap<ContainerId, Container>,
    tab_containers: DashMap<TabId, ContainerId>,
    /// Tabs excluded from lifecycle handling
    no_container_tabs: DashSet<TabId>,
    /// Tabs opened as confirmation pages
    confirm_page_tabs: DashSet<TabId>,
    /// Tabs with a replacement (reload or divert) already issued
    replacing: DashSet<TabId>,
    /// Tabs showing the pending-navigation badge
    badged: DashSet<TabId>,
    /// Last tab created while inactive, per window
    last_inactive: DashMap<WindowId, TabId>,
    /// Containers whose last tab closed, awaiting teardown
    cleanup_queue: DashSet<ContainerId>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let registry = Self::new();
        for (_, container) in snapshot.temp_containers {
            registry.add_temporary(container);
        }
        registry
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            temp_containers: self
                .temp_containers
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        }
    }

    // ---- containers ----

    /// Start tracking a temporary container. Re-adding a known id keeps the
    /// existing entry so a used container never turns clean again.
    pub fn add_temporary(&self, mut container: Container) {
        container.temporary = true;
        self.temp_containers
            .entry(container.id.clone())
            .or_insert(container);
    }

    pub fn is_temporary(&self, container_id: &str) -> bool {
        self.temp_containers.contains_key(container_id)
    }

    pub fn container(&self, container_id: &str) -> Option<Container> {
        self.temp_containers
            .get(container_id)
            .map(|entry| entry.value().clone())
    }

    pub fn is_clean(&self, container_id: &str) -> bool {
        self.temp_containers
            .get(container_id)
            .map(|entry| entry.clean)
            .unwrap_or(false)
    }

    /// Clear the `clean` flag. Returns true if it was set.
    pub fn mark_dirty(&self, container_id: &str) -> bool {
        match self.temp_containers.get_mut(container_id) {
            Some(mut entry) if entry.clean => {
                entry.clean = false;
                true
            }
            _ => false,
        }
    }

    /// Stop tracking a container; tabs still mapped to it are unmapped.
    pub fn remove_container(&self, container_id: &str) -> Option<Container> {
        let removed = self.temp_containers.remove(container_id).map(|(_, c)| c);
        self.tab_containers.retain(|_, mapped| mapped.as_str() != container_id);
        self.cleanup_queue.remove(container_id);
        removed
    }

    pub fn temporary_containers(&self) -> Vec<Container> {
        self.temp_containers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    // ---- tab <-> container ----

    /// Map a tab to its container. Only tracked temporary containers are
    /// mapped, and excluded tabs never are.
    pub fn map_tab(&self, tab_id: TabId, container_id: &str) -> bool {
        if !self.is_temporary(container_id) || self.no_container_tabs.contains(&tab_id) {
            return false;
        }
        self.tab_containers.insert(tab_id, container_id.to_string());
        true
    }

    pub fn unmap_tab(&self, tab_id: TabId) -> Option<ContainerId> {
        self.tab_containers.remove(&tab_id).map(|(_, c)| c)
    }

    pub fn container_of(&self, tab_id: TabId) -> Option<ContainerId> {
        self.tab_containers
            .get(&tab_id)
            .map(|entry| entry.value().clone())
    }

    pub fn is_mapped(&self, tab_id: TabId) -> bool {
        self.tab_containers.contains_key(&tab_id)
    }

    pub fn tabs_in(&self, container_id: &str) -> Vec<TabId> {
        self.tab_containers
            .iter()
            .filter(|entry| entry.value().as_str() == container_id)
            .map(|entry| *entry.key())
            .collect()
    }

    // ---- excluded tabs ----

    pub fn exclude_tab(&self, tab_id: TabId) {
        self.unmap_tab(tab_id);
        self.no_container_tabs.insert(tab_id);
    }

    pub fn is_excluded(&self, tab_id: TabId) -> bool {
        self.no_container_tabs.contains(&tab_id)
    }

    pub fn include_tab(&self, tab_id: TabId) -> bool {
        self.no_container_tabs.remove(&tab_id).is_some()
    }

    // ---- confirm pages ----

    pub fn mark_confirm_page(&self, tab_id: TabId) {
        self.confirm_page_tabs.insert(tab_id);
    }

    pub fn is_confirm_page(&self, tab_id: TabId) -> bool {
        self.confirm_page_tabs.contains(&tab_id)
    }

    pub fn clear_confirm_page(&self, tab_id: TabId) -> bool {
        self.confirm_page_tabs.remove(&tab_id).is_some()
    }

    // ---- replacements in flight ----

    /// Claim a tab for replacement. False if a replacement was already issued.
    pub fn begin_replacement(&self, tab_id: TabId) -> bool {
        self.replacing.insert(tab_id)
    }

    pub fn end_replacement(&self, tab_id: TabId) {
        self.replacing.remove(&tab_id);
    }

    pub fn is_replacing(&self, tab_id: TabId) -> bool {
        self.replacing.contains(&tab_id)
    }

    // ---- badges ----

    /// Returns false if the tab already carries the badge
    pub fn mark_badged(&self, tab_id: TabId) -> bool {
        self.badged.insert(tab_id)
    }

    pub fn clear_badge(&self, tab_id: TabId) -> bool {
        self.badged.remove(&tab_id).is_some()
    }

    // ---- per-window ordering ----

    pub fn last_inactive_tab(&self, window_id: WindowId) -> Option<TabId> {
        self.last_inactive.get(&window_id).map(|entry| *entry.value())
    }

    pub fn set_last_inactive_tab(&self, window_id: WindowId, tab_id: TabId) {
        self.last_inactive.insert(window_id, tab_id);
    }

    pub fn clear_last_inactive_tab(&self, window_id: WindowId) {
        self.last_inactive.remove(&window_id);
    }

    // ---- cleanup ----

    /// Unmap a closed tab and queue its container for teardown if no other
    /// tab uses it. Returns the queued container.
    pub fn queue_cleanup(&self, tab_id: TabId) -> Option<ContainerId> {
        let container_id = self.unmap_tab(tab_id)?;
        if !self.tabs_in(&container_id).is_empty() {
            return None;
        }
        self.cleanup_queue.insert(container_id.clone());
        Some(container_id)
    }

    /// Hand the queued containers to the container manager
    pub fn take_cleanup_queue(&self) -> Vec<ContainerId> {
        let queued: Vec<ContainerId> = self.cleanup_queue.iter().map(|id| id.key().clone()).collect();
        for id in &queued {
            self.cleanup_queue.remove(id);
        }
        queued
    }
}
