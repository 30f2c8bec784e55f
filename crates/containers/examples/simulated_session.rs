//! Simulated session - drive the coordinator against the in-memory browser

use std::sync::Arc;

use containers::host::TabsApi;
use containers::preferences::NewTabPolicy;
use containers::types::{ChangeInfo, TabStatus};
use containers::{
    CoordinatorConfig, Host, LifecycleCoordinator, MemoryBrowser, Preferences, TabEvent,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let prefs = Preferences::from_json(
        r#"{
            "automaticMode": { "active": true, "newTab": "created" },
            "closeRedirectorTabs": { "active": true, "delay": 500 }
        }"#,
    )?;
    let config = CoordinatorConfig {
        id: "example-session".to_string(),
        ..CoordinatorConfig::default()
    };

    let browser = Arc::new(MemoryBrowser::new());
    let coordinator = Arc::new(LifecycleCoordinator::new(
        Host::from_shared(browser.clone()),
        prefs,
        config,
    ));
    println!("Created coordinator: {}", coordinator.config.id);

    // Subscribe to events before starting
    let mut event_rx = coordinator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            println!("📢 Event: {:?}", event);
        }
    });

    let (tx, rx) = mpsc::channel(64);
    let runner = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(rx).await })
    };

    // A page the user already had open
    let first = browser
        .open_tab(1, "https://www.rust-lang.org", "firefox-default", true)
        .await;
    tx.send(TabEvent::Created { tab: first }).await?;

    // A new tab page, reloaded into a temporary container
    let new_tab = browser
        .open_tab(1, "about:newtab", "firefox-default", true)
        .await;
    tx.send(TabEvent::Created { tab: new_tab }).await?;

    // A redirector that finished loading
    let redirect = browser
        .open_tab(1, "https://t.co/abc", "firefox-default", false)
        .await;
    tx.send(TabEvent::Created {
        tab: redirect.clone(),
    })
    .await?;
    tx.send(TabEvent::Updated {
        tab_id: redirect.id,
        change_info: ChangeInfo::status(TabStatus::Complete),
        tab: redirect.clone(),
    })
    .await?;

    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

    // Switch to navigation mode and open a temporary container tab by hand
    let mut prefs = coordinator.preferences().await;
    prefs.automatic_mode.new_tab = NewTabPolicy::Navigation;
    coordinator.update_preferences(prefs).await;

    let temp = coordinator.open_in_temp_container().await?;
    println!("📄 Opened tab {} in {}", temp.id, temp.cookie_store_id);

    for tab in browser.query(Default::default()).await? {
        println!("📍 Tab {} [{}] {:?}", tab.id, tab.cookie_store_id, tab.url);
    }
    for call in browser.calls().await {
        println!("🔍 Host call: {:?}", call);
    }

    drop(tx);
    runner.await?;
    coordinator.shutdown().await;
    println!("🛑 Session stopped");

    Ok(())
}
