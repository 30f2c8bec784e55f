//! Host collaborators
//!
//! The core never owns tabs or containers; it asks the browser and the
//! surrounding extension through these traits. Every call may fail because
//! the tab it addresses is already gone.

pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{CreateProperties, Tab, TabId, TabQuery};

pub use memory::{HostCall, MemoryBrowser};

/// Browser tab/window API
#[async_trait]
pub trait TabsApi: Send + Sync {
    async fn query(&self, query: TabQuery) -> Result<Vec<Tab>>;

    async fn get(&self, tab_id: TabId) -> Result<Tab>;

    async fn create(&self, properties: CreateProperties) -> Result<Tab>;

    async fn move_tab(&self, tab_id: TabId, index: usize) -> Result<()>;

    async fn remove(&self, tab_id: TabId) -> Result<()>;
}

/// Creates temporary containers and tracks history
#[async_trait]
pub trait ContainerManager: Send + Sync {
    /// Reopen `tab`'s page in a fresh temporary container. Returns the
    /// replacement tab; closing the original is the manager's business.
    async fn reload_tab_in_temp_container(&self, tab: &Tab, deletes_history: bool) -> Result<Tab>;

    async fn create_tab_in_temp_container(&self, deletes_history: bool) -> Result<Tab>;

    async fn maybe_add_history(&self, tab: &Tab, url: &str) -> Result<()>;
}

/// Handles extension-internal confirmation pages
#[async_trait]
pub trait ConfirmPageHandler: Send + Sync {
    async fn handle_confirm_page(&self, tab: &Tab) -> Result<()>;
}

#[async_trait]
pub trait PageAction: Send + Sync {
    async fn show_or_hide(&self, tab: &Tab);
}

#[async_trait]
pub trait BrowserAction: Send + Sync {
    async fn add_badge(&self, tab_id: TabId);

    async fn remove_badge(&self, tab_id: TabId);

    async fn disable(&self, tab_id: TabId);
}

/// Every collaborator the coordinator talks to
#[derive(Clone)]
pub struct Host {
    pub tabs: Arc<dyn TabsApi>,
    pub containers: Arc<dyn ContainerManager>,
    pub confirm_page: Arc<dyn ConfirmPageHandler>,
    pub page_action: Arc<dyn PageAction>,
    pub browser_action: Arc<dyn BrowserAction>,
}

impl Host {
    /// One object playing every role, e.g. [`MemoryBrowser`]
    pub fn from_shared<B>(browser: Arc<B>) -> Self
    where
        B: TabsApi + ContainerManager + ConfirmPageHandler + PageAction + BrowserAction + 'static,
    {
        Self {
            tabs: browser.clone(),
            containers: browser.clone(),
            confirm_page: browser.clone(),
            page_action: browser.clone(),
            browser_action: browser,
        }
    }
}
