//! Timer data model: entries, per-character sets, and the entity registry.
//!
//! All mutation goes through `TimerSet` methods so the key-uniqueness and
//! category-mutability invariants hold in one place.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Name of the synthetic always-last registry entry reserved for the
/// settings surface of a front-end.
pub const SETTINGS_ENTITY: &str = "Configuration";

/// Classification of a timer entry.
///
/// `AgentMission`/`AgentRecovery` are the two sub-states of the Agent
/// super-category and may flip between each other after creation.
/// `Lair`/`Mission` are fixed for the life of the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerCategory {
    AgentMission,
    AgentRecovery,
    Lair,
    Mission,
}

impl TimerCategory {
    pub fn scope(self) -> CategoryScope {
        match self {
            Self::AgentMission | Self::AgentRecovery => CategoryScope::Agent,
            Self::Lair | Self::Mission => CategoryScope::Fixed,
        }
    }

    /// Whether entries of this category may be reclassified after creation.
    pub fn is_mutable(self) -> bool {
        self.scope() == CategoryScope::Agent
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::AgentMission => "Agent Mission",
            Self::AgentRecovery => "Agent Recovery",
            Self::Lair => "Lair",
            Self::Mission => "Mission",
        }
    }
}

/// Key space an entry id is unique within.
///
/// Agent records and fixed-category records come from separate id spaces in
/// the snapshot data, so uniqueness is scoped by mutability class rather
/// than by the four leaf categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryScope {
    Agent,
    Fixed,
}

/// Identity of an entry within one `TimerSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub scope: CategoryScope,
    pub id: i64,
}

/// A single cooldown record.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerEntry {
    pub id: i64,
    pub name: String,
    pub unlock_time: DateTime<Utc>,
    pub category: TimerCategory,
    /// True once the ready transition for this entry has been reported.
    /// Cleared only by removing the entry.
    pub alert_fired: bool,
}

impl TimerEntry {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        unlock_time: DateTime<Utc>,
        category: TimerCategory,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            unlock_time,
            category,
            alert_fired: false,
        }
    }

    pub fn key(&self) -> TimerKey {
        TimerKey {
            scope: self.category.scope(),
            id: self.id,
        }
    }

    /// Time until the entry unlocks. Negative once the entry is ready.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.unlock_time - now
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now) <= Duration::zero()
    }
}

/// Invariant violations surfaced by the model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("duplicate timer entry for {0:?}")]
    DuplicateKey(TimerKey),
    #[error("no timer entry for {0:?}")]
    UnknownKey(TimerKey),
    #[error("cannot reclassify fixed-category entry {key:?} from {from:?} to {to:?}")]
    InvalidTransition {
        key: TimerKey,
        from: TimerCategory,
        to: TimerCategory,
    },
}

/// A change to one entry, reported to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryChange {
    Inserted,
    TimeUpdated,
    Reclassified {
        from: TimerCategory,
        to: TimerCategory,
    },
    RemainingUpdated(Duration),
}

/// All timer entries belonging to one tracked character.
#[derive(Debug, Default)]
pub struct TimerSet {
    entries: HashMap<TimerKey, TimerEntry>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: TimerKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn get(&self, key: TimerKey) -> Option<&TimerEntry> {
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimerEntry> {
        self.entries.values()
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut TimerEntry> {
        self.entries.values_mut()
    }

    /// Insert a new entry. Fails if the key is already live.
    pub fn insert(&mut self, entry: TimerEntry) -> Result<(), ModelError> {
        let key = entry.key();
        if self.entries.contains_key(&key) {
            return Err(ModelError::DuplicateKey(key));
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    pub fn set_unlock_time(
        &mut self,
        key: TimerKey,
        unlock_time: DateTime<Utc>,
    ) -> Result<(), ModelError> {
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or(ModelError::UnknownKey(key))?;
        entry.unlock_time = unlock_time;
        Ok(())
    }

    /// Change an entry's category.
    ///
    /// Returns `Ok(None)` when the category already matches, and
    /// `Ok(Some((from, to)))` when the change was applied. Attempting to
    /// change a fixed-category entry is a precondition violation, not a
    /// recoverable condition.
    pub fn set_category(
        &mut self,
        key: TimerKey,
        category: TimerCategory,
    ) -> Result<Option<(TimerCategory, TimerCategory)>, ModelError> {
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or(ModelError::UnknownKey(key))?;
        if entry.category == category {
            return Ok(None);
        }
        if !entry.category.is_mutable() || !category.is_mutable() {
            return Err(ModelError::InvalidTransition {
                key,
                from: entry.category,
                to: category,
            });
        }
        let from = entry.category;
        entry.category = category;
        Ok(Some((from, category)))
    }

    pub fn remove(&mut self, key: TimerKey) -> Option<TimerEntry> {
        self.entries.remove(&key)
    }

    /// Remove every currently-ready entry in one step. This is the only
    /// bulk removal path; entries never expire on their own.
    pub fn clear_ready(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_ready(now));
        before - self.entries.len()
    }

    /// Read-only view sorted ascending by remaining time, recomputed on
    /// demand at the end of each poll cycle.
    pub fn sorted_by_remaining(&self, now: DateTime<Utc>) -> Vec<&TimerEntry> {
        let mut view: Vec<&TimerEntry> = self.entries.values().collect();
        view.sort_by(|a, b| {
            a.remaining(now)
                .cmp(&b.remaining(now))
                .then_with(|| a.name.cmp(&b.name))
        });
        view
    }
}

/// Character name -> `TimerSet`, created lazily on first snapshot data and
/// never removed during a run.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    sets: HashMap<String, TimerSet>,
    order: Vec<String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TimerSet> {
        self.sets.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TimerSet> {
        self.sets.get_mut(name)
    }

    /// Fetch a character's set, creating an empty one on first sight.
    pub fn ensure(&mut self, name: &str) -> &mut TimerSet {
        if !self.sets.contains_key(name) {
            self.order.push(name.to_string());
            self.sets.insert(name.to_string(), TimerSet::new());
        }
        self.sets.get_mut(name).expect("entity just ensured")
    }

    /// Tracked character names in first-seen order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Presentation order: tracked characters followed by the synthetic
    /// configuration entry, which always sorts last.
    pub fn display_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = self.order.iter().map(String::as_str).collect();
        order.push(SETTINGS_ENTITY);
        order
    }
}
