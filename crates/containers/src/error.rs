//! Error types for lifecycle operations
//!
//! Flat hierarchy. Most of these are expected at runtime: tabs close while
//! a decision is in flight, and handlers swallow those.

use thiserror::Error;

use crate::types::{TabId, WindowId};

pub type Result<T> = std::result::Result<T, ContainerError>;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    #[error("Window not found: {0}")]
    WindowNotFound(WindowId),

    #[error("No active tab in current window")]
    NoActiveTab,

    #[error("Tab creation in same container already in progress")]
    CreationInProgress,

    #[error("Host API error: {0}")]
    Host(String),

    #[error("Preferences parse error: {0}")]
    Preferences(#[from] serde_json::Error),
}

impl ContainerError {
    /// True when the addressed tab or window no longer exists.
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            ContainerError::TabNotFound(_) | ContainerError::WindowNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gone_classification() {
        assert!(ContainerError::TabNotFound(4).is_gone());
        assert!(ContainerError::WindowNotFound(1).is_gone());
        assert!(!ContainerError::NoActiveTab.is_gone());
        assert!(!ContainerError::Host("boom".to_string()).is_gone());
    }

    #[test]
    fn test_preferences_error_from_json() {
        let err: ContainerError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Preferences parse error"));
    }
}
