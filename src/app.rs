//! Headless runner: loads settings, spawns the owning thread, and logs
//! alerts until interrupted. A graphical front-end would subscribe its own
//! observer in place of [`AlertLogger`].

use std::path::PathBuf;
use std::sync::mpsc;

use crate::core::alerts::AlertEvent;
use crate::core::config::ConfigManager;
use crate::core::scheduler::{EngineObserver, RefreshScheduler};
use crate::core::worker;

/// Observer that renders alerts as log lines.
struct AlertLogger;

impl EngineObserver for AlertLogger {
    fn entity_added(&mut self, entity: &str) {
        log::info!("Now tracking {}", entity);
    }

    fn alert_raised(&mut self, alert: &AlertEvent) {
        match alert {
            AlertEvent::CooldownReady { category } => {
                log::info!("Cooldown ready: {}", category.display_name());
            }
            AlertEvent::PatternMatch { source, line } => {
                log::info!("Agent report from {}: {}", source, line);
            }
        }
    }
}

fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clockwatcher")
}

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let manager = ConfigManager::new(app_config_dir());
    let mut scheduler = RefreshScheduler::new();
    scheduler.subscribe(Box::new(AlertLogger));

    let handle = worker::spawn(scheduler, manager);

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .expect("failed to install interrupt handler");

    log::info!("Watching for cooldowns; press Ctrl-C to stop");
    let _ = stop_rx.recv();
    handle.shutdown();
}
