//! Concrete Watchdog Implementations

pub mod redirector;

pub use redirector::RedirectorWatchdog;
