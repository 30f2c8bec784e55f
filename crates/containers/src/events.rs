//! Events in and out of the coordinator
//!
//! [`TabEvent`] is what the host delivers. [`LifecycleEvent`] is what the
//! coordinator decided, broadcast for the UI reflectors and for tests.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::decision::Action;
use crate::types::{ActiveInfo, ChangeInfo, Tab, TabId};

/// Tab events delivered by the host, one at a time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TabEvent {
    Created {
        tab: Tab,
    },
    #[serde(rename_all = "camelCase")]
    Updated {
        tab_id: TabId,
        change_info: ChangeInfo,
        tab: Tab,
    },
    #[serde(rename_all = "camelCase")]
    Removed {
        tab_id: TabId,
    },
    #[serde(rename_all = "camelCase")]
    Activated {
        active_info: ActiveInfo,
    },
}

impl TabEvent {
    pub fn tab_id(&self) -> TabId {
        match self {
            TabEvent::Created { tab } => tab.id,
            TabEvent::Updated { tab_id, .. } | TabEvent::Removed { tab_id } => *tab_id,
            TabEvent::Activated { active_info } => active_info.tab_id,
        }
    }
}

/// Outcomes published by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LifecycleEvent {
    #[serde(rename_all = "camelCase")]
    Decision { tab_id: TabId, action: Action },
    #[serde(rename_all = "camelCase")]
    TabMoved { tab_id: TabId, index: usize },
    #[serde(rename_all = "camelCase")]
    ReplacementSkipped { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    RemovalDeferred { tab_id: TabId, task_id: Uuid },
    #[serde(rename_all = "camelCase")]
    RedirectorCheckScheduled { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    RedirectorTabClosed { tab_id: TabId },
}

/// Broadcast bus for [`LifecycleEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: LifecycleEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(LifecycleEvent::TabRemoved { tab_id: 3 });

        match rx.recv().await {
            Ok(LifecycleEvent::TabRemoved { tab_id: 3 }) => {}
            other => panic!("Expected TabRemoved event, got {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(LifecycleEvent::RedirectorTabClosed { tab_id: 1 });
    }

    #[test]
    fn test_lifecycle_event_json_is_camel_case() {
        let task_id = Uuid::now_v7();
        let json = serde_json::to_value(LifecycleEvent::RemovalDeferred { tab_id: 2, task_id }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "removalDeferred", "tabId": 2, "taskId": task_id })
        );

        let json = serde_json::to_value(LifecycleEvent::Decision {
            tab_id: 5,
            action: Action::MarkDirty {
                container_id: "firefox-container-1".to_string(),
            },
        })
        .unwrap();
        assert_eq!(json["tabId"], 5);
        assert_eq!(json["action"]["containerId"], "firefox-container-1");
    }

    #[test]
    fn test_tab_event_from_host_json() {
        let event: TabEvent = serde_json::from_value(serde_json::json!({
            "type": "updated",
            "tabId": 4,
            "changeInfo": { "status": "complete" },
            "tab": {
                "id": 4,
                "windowId": 1,
                "index": 0,
                "url": "https://t.co/x",
                "cookieStoreId": "firefox-default"
            }
        }))
        .unwrap();

        assert_eq!(event.tab_id(), 4);
        assert!(matches!(event, TabEvent::Updated { .. }));

        let removed: TabEvent =
            serde_json::from_str(r#"{"type":"removed","tabId":9}"#).unwrap();
        assert_eq!(removed, TabEvent::Removed { tab_id: 9 });
    }
}
