//! Temporary Containers - tab lifecycle coordination
//!
//! Decides, for every tab the browser creates, updates, activates or closes,
//! whether it should move into a fresh temporary container, go back to the
//! default container, or be left alone. The browser itself sits behind the
//! traits in [`host`], so the same coordinator drives a real extension host
//! or the in-memory [`MemoryBrowser`].
//!
//! # Layout
//!
//! 1. **Pure decision**: [`decision::evaluate`] maps a tab plus registry state to an [`Action`]
//! 2. **Shared state**: [`ContainerRegistry`] and [`SharedPreferences`], safe under interleaving
//! 3. **Delayed work**: removal retries and redirector checks run as cancellable tasks

pub mod coordinator;
pub mod decision;
pub mod error;
pub mod events;
pub mod guard;
pub mod host;
pub mod preferences;
pub mod registry;
pub mod removal;
pub mod types;
pub mod urls;
pub mod watchdog;
pub mod watchdogs;

pub use coordinator::{CoordinatorConfig, LifecycleCoordinator};
pub use decision::{Action, DecisionContext, IgnoreReason};
pub use error::{ContainerError, Result};
pub use events::{EventBus, LifecycleEvent, TabEvent};
pub use guard::{GuardToken, SameContainerGuard};
pub use host::{Host, HostCall, MemoryBrowser};
pub use preferences::{Preferences, SharedPreferences};
pub use registry::{ContainerRegistry, RegistrySnapshot};
pub use removal::{RemovalOutcome, SafeRemovalQueue};
pub use watchdog::{Watchdog, WatchdogManager};
pub use watchdogs::RedirectorWatchdog;
