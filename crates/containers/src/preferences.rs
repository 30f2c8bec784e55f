//! Preferences consumed by the lifecycle core
//!
//! Owned and persisted elsewhere. The core reads a snapshot at the start of
//! every handler; updates swap the whole struct.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::ContainerId;

/// Shared, hot-swappable preferences
pub type SharedPreferences = Arc<RwLock<Preferences>>;

/// When automatic mode moves a new tab into a temporary container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewTabPolicy {
    /// As soon as the new tab shows up
    Created,
    /// Once the new tab navigates to a real page
    Navigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletesHistoryPolicy {
    Automatic,
    #[serde(alias = "never")]
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomaticMode {
    pub active: bool,
    pub new_tab: NewTabPolicy,
}

impl Default for AutomaticMode {
    fn default() -> Self {
        Self {
            active: false,
            new_tab: NewTabPolicy::Created,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Isolation {
    pub active: bool,
}

impl Default for Isolation {
    fn default() -> Self {
        Self { active: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeletesHistory {
    pub automatic_mode: DeletesHistoryPolicy,
}

impl Default for DeletesHistory {
    fn default() -> Self {
        Self {
            automatic_mode: DeletesHistoryPolicy::Manual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloseRedirectorTabs {
    pub active: bool,
    pub domains: Vec<String>,
    /// Milliseconds between navigation complete and the re-check
    pub delay: u64,
}

impl Default for CloseRedirectorTabs {
    fn default() -> Self {
        Self {
            active: false,
            domains: vec!["t.co".to_string(), "outgoing.prod.mozaws.net".to_string()],
            delay: 500,
        }
    }
}

/// Preference combinations where the rule order silently decides the outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceConflict {
    /// `navigation` policy with automatic history deletion: new tabs are
    /// reloaded on creation and the pending badge never shows.
    NavigationWithAutomaticHistoryDeletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub automatic_mode: AutomaticMode,
    pub isolation: Isolation,
    pub deletes_history: DeletesHistory,
    pub close_redirector_tabs: CloseRedirectorTabs,
    pub container_prefix: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            automatic_mode: AutomaticMode::default(),
            isolation: Isolation::default(),
            deletes_history: DeletesHistory::default(),
            close_redirector_tabs: CloseRedirectorTabs::default(),
            container_prefix: "firefox".to_string(),
        }
    }
}

impl Preferences {
    /// Parse the extension's preference JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_shared(self) -> SharedPreferences {
        Arc::new(RwLock::new(self))
    }

    pub fn default_container(&self) -> ContainerId {
        format!("{}-default", self.container_prefix)
    }

    pub fn deletes_history_automatically(&self) -> bool {
        self.deletes_history.automatic_mode == DeletesHistoryPolicy::Automatic
    }

    pub fn conflicts(&self) -> Vec<PreferenceConflict> {
        let mut conflicts = Vec::new();
        if self.automatic_mode.active
            && self.automatic_mode.new_tab == NewTabPolicy::Navigation
            && self.deletes_history_automatically()
        {
            conflicts.push(PreferenceConflict::NavigationWithAutomaticHistoryDeletion);
        }
        conflicts
    }
}
