//! Host data model
//!
//! Tabs and windows are owned by the browser. These types are snapshots of
//! what the host reported at some point and may be stale by the time they
//! are used.

use serde::{Deserialize, Serialize};

/// Tab ID assigned by the host, unique while the tab is open
pub type TabId = i64;

/// Window ID assigned by the host
pub type WindowId = i64;

/// Container (cookie store) ID, e.g. `firefox-default` or `firefox-container-12`
pub type ContainerId = String;

/// Snapshot of a browser tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    pub index: usize,
    /// Missing until the first navigation commits
    #[serde(default)]
    pub url: Option<String>,
    pub cookie_store_id: ContainerId,
    #[serde(default)]
    pub incognito: bool,
    #[serde(default)]
    pub active: bool,
}

impl Tab {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn url_is(&self, url: &str) -> bool {
        self.url() == Some(url)
    }
}

/// Loading status reported with a tab update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// The subset of a tab update that changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
}

impl ChangeInfo {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            status: None,
        }
    }

    pub fn status(status: TabStatus) -> Self {
        Self {
            url: None,
            status: Some(status),
        }
    }

    pub fn with_status(mut self, status: TabStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Payload of a tab activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveInfo {
    pub tab_id: TabId,
    pub window_id: WindowId,
}

/// Container as tracked by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: ContainerId,
    pub temporary: bool,
    /// True until the tab inside navigates away from its initial page
    pub clean: bool,
    pub deletes_history: bool,
}

impl Container {
    /// A freshly created temporary container
    pub fn temporary(id: impl Into<ContainerId>, deletes_history: bool) -> Self {
        Self {
            id: id.into(),
            temporary: true,
            clean: true,
            deletes_history,
        }
    }
}

/// Arguments for creating a tab
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_store_id: Option<ContainerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl CreateProperties {
    pub fn in_container(cookie_store_id: impl Into<ContainerId>) -> Self {
        Self {
            cookie_store_id: Some(cookie_store_id.into()),
            ..Self::default()
        }
    }
}

/// Tab query filter. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default)]
    pub current_window: bool,
}

impl TabQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn window(window_id: WindowId) -> Self {
        Self {
            window_id: Some(window_id),
            ..Self::default()
        }
    }

    pub fn active_in_current_window() -> Self {
        Self {
            window_id: None,
            active: Some(true),
            current_window: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_from_host_json() {
        let tab: Tab = serde_json::from_value(serde_json::json!({
            "id": 7,
            "windowId": 1,
            "index": 2,
            "url": "about:newtab",
            "cookieStoreId": "firefox-default",
            "active": true
        }))
        .unwrap();

        assert_eq!(tab.id, 7);
        assert_eq!(tab.window_id, 1);
        assert!(tab.url_is("about:newtab"));
        assert!(!tab.incognito);
    }

    #[test]
    fn test_change_info_status_wire_format() {
        let info: ChangeInfo =
            serde_json::from_str(r#"{"status":"loading","url":"about:blank"}"#).unwrap();
        assert_eq!(info.status, Some(TabStatus::Loading));
        assert_eq!(info.url.as_deref(), Some("about:blank"));

        let json = serde_json::to_string(&ChangeInfo::status(TabStatus::Complete)).unwrap();
        assert_eq!(json, r#"{"status":"complete"}"#);
    }

    #[test]
    fn test_new_temporary_container_is_clean() {
        let container = Container::temporary("firefox-container-3", true);
        assert!(container.temporary);
        assert!(container.clean);
        assert!(container.deletes_history);
    }
}
