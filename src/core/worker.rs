//! The single owning thread.
//!
//! One worker thread owns the scheduler (and with it the registry and log
//! cursors). Everything that mutates them - interval ticks, explicit
//! refreshes, clear-ready, settings reloads - arrives as a command on one
//! channel, so nothing ever interleaves with an in-flight cycle. The
//! interval ticker is simply the channel receive timeout.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;

use super::config::ConfigManager;
use super::scheduler::RefreshScheduler;

#[derive(Debug)]
pub enum Command {
    /// Run a cycle now instead of waiting for the next tick.
    Refresh,
    /// Remove all ready entries for one character.
    ClearReady(String),
    /// Re-read settings from disk before the next cycle.
    ReloadConfig,
    Shutdown,
}

/// Handle for submitting work to the owning thread.
pub struct WorkerHandle {
    tx: Sender<Command>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn refresh(&self) {
        let _ = self.tx.send(Command::Refresh);
    }

    pub fn clear_ready(&self, entity: impl Into<String>) {
        let _ = self.tx.send(Command::ClearReady(entity.into()));
    }

    pub fn reload_config(&self) {
        let _ = self.tx.send(Command::ReloadConfig);
    }

    /// Stop the worker and wait for the in-flight cycle, if any, to end.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the owning thread. The scheduler moves onto it; the first cycle
/// runs immediately, then once per configured interval.
pub fn spawn(mut scheduler: RefreshScheduler, manager: ConfigManager) -> WorkerHandle {
    let (tx, rx) = mpsc::channel();

    let join = thread::spawn(move || {
        let mut settings = manager.load();
        scheduler.tick(&settings.cycle_config(), Utc::now());

        loop {
            let interval = Duration::from_secs(settings.poll_interval_secs.max(1));
            match rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) | Ok(Command::Refresh) => {
                    scheduler.tick(&settings.cycle_config(), Utc::now());
                }
                Ok(Command::ClearReady(entity)) => {
                    scheduler.clear_ready(&entity, Utc::now());
                }
                Ok(Command::ReloadConfig) => {
                    settings = manager.load();
                    log::info!("Settings reloaded");
                }
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("Worker thread stopped");
    });

    WorkerHandle {
        tx,
        join: Some(join),
    }
}
