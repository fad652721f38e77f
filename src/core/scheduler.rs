//! Poll-cycle sequencing: one `tick` reconciles log cursors, scans new
//! lines, parses and merges snapshots, detects ready transitions, and fans
//! alerts out to observers.
//!
//! The scheduler runs on a single owning thread (see `worker`); the
//! Idle/Running guard exists so a tick that arrives while a slow cycle is
//! still executing is dropped with a warning instead of queued.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::alerts::{self, AlertEvent, AlertMask};
use super::discovery;
use super::merge;
use super::model::{EntityRegistry, EntryChange, ModelError, TimerCategory, TimerKey};
use super::pattern;
use super::snapshot;
use super::tail::SourceTails;

/// Externally-refreshed inputs, re-read at the start of each cycle.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Root of the account/character preference tree.
    pub prefs_root: PathBuf,
    /// Client log files of the currently running game installations.
    pub client_logs: Vec<PathBuf>,
    pub alert_mask: AlertMask,
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub lines_read: usize,
    pub pattern_alerts: usize,
    pub snapshots_merged: usize,
    /// Category of the cycle's single cooldown alert, if one fired.
    pub cooldown_alert: Option<TimerCategory>,
}

#[derive(Debug)]
pub enum TickOutcome {
    Ran(CycleReport),
    /// A previous cycle was still running; this tick was dropped.
    Skipped,
    Failed(CycleError),
}

/// Listener interface for model changes and alerts. The presentation layer
/// translates these into its own refresh mechanism.
pub trait EngineObserver: Send {
    fn entity_added(&mut self, _entity: &str) {}
    fn entry_changed(&mut self, _entity: &str, _key: TimerKey, _change: &EntryChange) {}
    fn alert_raised(&mut self, _alert: &AlertEvent) {}
    fn cycle_completed(&mut self, _report: &CycleReport) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleState {
    Idle,
    Running,
}

pub struct RefreshScheduler {
    registry: EntityRegistry,
    tails: SourceTails,
    observers: Vec<Box<dyn EngineObserver>>,
    state: CycleState,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self {
            registry: EntityRegistry::new(),
            tails: SourceTails::new(),
            observers: Vec::new(),
            state: CycleState::Idle,
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn EngineObserver>) {
        self.observers.push(observer);
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Run one poll cycle, unless one is already in flight.
    ///
    /// The state returns to Idle no matter how the cycle went; a failed
    /// cycle must never wedge the scheduler.
    pub fn tick(&mut self, config: &CycleConfig, now: DateTime<Utc>) -> TickOutcome {
        if self.state == CycleState::Running {
            log::warn!("Poll cycle overran its interval; skipping this tick");
            return TickOutcome::Skipped;
        }
        self.state = CycleState::Running;
        let result = self.run_cycle(config, now);
        self.state = CycleState::Idle;

        match result {
            Ok(report) => {
                log::debug!(
                    "Cycle complete: {} lines read, {} snapshots merged, {} pattern alerts",
                    report.lines_read,
                    report.snapshots_merged,
                    report.pattern_alerts
                );
                self.notify(|o| o.cycle_completed(&report));
                TickOutcome::Ran(report)
            }
            Err(e) => {
                log::error!("Poll cycle failed: {}", e);
                TickOutcome::Failed(e)
            }
        }
    }

    /// Remove every currently-ready entry of one character in one step.
    /// Triggered externally (user action); the only removal path.
    pub fn clear_ready(&mut self, entity: &str, now: DateTime<Utc>) -> usize {
        match self.registry.get_mut(entity) {
            Some(set) => {
                let removed = set.clear_ready(now);
                log::info!("Cleared {} ready entries for {}", removed, entity);
                removed
            }
            None => {
                log::warn!("Clear-ready for unknown character {:?}", entity);
                0
            }
        }
    }

    fn run_cycle(&mut self, config: &CycleConfig, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        // (a) reconcile log cursors with the active client set.
        let active: HashSet<PathBuf> = config.client_logs.iter().cloned().collect();
        self.tails.reconcile(&active);

        // (b) drain and scan newly appended lines.
        let mut pattern_alerts = Vec::new();
        for (path, lines) in self.tails.drain() {
            report.lines_read += lines.len();
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            pattern_alerts.extend(pattern::scan(&source, &lines));
        }
        report.pattern_alerts = pattern_alerts.len();

        // (c) + (d) discover snapshots, parse, and merge per character.
        let sources = match discovery::find_snapshot_sources(&config.prefs_root) {
            Ok(sources) => sources,
            Err(e) => {
                log::warn!("Snapshot discovery failed under {:?}: {}", config.prefs_root, e);
                Vec::new()
            }
        };
        let mut seen_this_cycle = HashSet::new();
        for source in sources {
            let parsed = match snapshot::parse_snapshot_file(&source.path) {
                Ok(Some(parsed)) => parsed,
                // Mod unused for this character; not tracked, not an error.
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Skipping snapshot {:?} this cycle: {}", source.path, e);
                    continue;
                }
            };
            let name = parsed.name.unwrap_or(source.fallback_name);
            if !seen_this_cycle.insert(name.clone()) {
                log::warn!(
                    "Multiple snapshot sources resolve to {:?}; last processed wins",
                    name
                );
            }

            let first_seen = !self.registry.contains(&name);
            let outcome = merge::merge(self.registry.ensure(&name), parsed.candidates, first_seen, now)?;
            report.snapshots_merged += 1;

            if first_seen {
                self.notify(|o| o.entity_added(&name));
            }
            for (key, change) in &outcome.changes {
                self.notify(|o| o.entry_changed(&name, *key, change));
            }
        }

        // (e) ready-transition detection across all characters.
        let names: Vec<String> = self.registry.names().map(str::to_string).collect();
        for name in names {
            let outcome = match self.registry.get_mut(&name) {
                Some(set) => alerts::detect_ready_transitions(set, config.alert_mask, now),
                None => continue,
            };
            if report.cooldown_alert.is_none() {
                report.cooldown_alert = outcome.alert_category;
            }
            for (key, change) in &outcome.changes {
                self.notify(|o| o.entry_changed(&name, *key, change));
            }
        }

        // (f) at most one cooldown alert for the whole cycle, then the
        // per-line pattern alerts.
        if let Some(category) = report.cooldown_alert {
            let alert = AlertEvent::CooldownReady { category };
            self.notify(|o| o.alert_raised(&alert));
        }
        for alert in &pattern_alerts {
            self.notify(|o| o.alert_raised(alert));
        }

        Ok(report)
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn EngineObserver)) {
        for observer in &mut self.observers {
            f(observer.as_mut());
        }
    }
}
