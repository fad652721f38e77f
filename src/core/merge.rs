//! Folds freshly-parsed snapshot candidates into a live `TimerSet`.
//!
//! The merge never removes entries and never double-inserts a key; removal
//! is the explicit clear-ready operation on `TimerSet`.

use chrono::{DateTime, Utc};

use super::model::{EntryChange, ModelError, TimerEntry, TimerKey, TimerSet};

/// What one merge pass did, for observer fan-out and cycle logging.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub changes: Vec<(TimerKey, EntryChange)>,
    pub inserted: usize,
    pub updated: usize,
    pub reclassified: usize,
    pub discarded: usize,
}

impl MergeOutcome {
    pub fn is_quiet(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Merge a candidate sequence into `set`.
///
/// Rules:
/// - Known key: overwrite `unlock_time` (reported as `TimeUpdated` only if
///   the value actually moved) and apply any category change (reported as
///   `Reclassified`; erroring for fixed categories).
/// - Unknown key, not yet ready: insert.
/// - Unknown key, already ready: discard, so an event that completed while
///   nobody was watching cannot reappear just to fire a spurious alert.
/// - `first_seen` (brand-new character): insert unconditionally, ready or
///   not, so a newly discovered character shows its true current state.
///
/// Applying the same candidate sequence twice to a stabilized set reports
/// no changes the second time.
pub fn merge(
    set: &mut TimerSet,
    candidates: Vec<TimerEntry>,
    first_seen: bool,
    now: DateTime<Utc>,
) -> Result<MergeOutcome, ModelError> {
    let mut outcome = MergeOutcome::default();

    for candidate in candidates {
        let key = candidate.key();
        if let Some(existing) = set.get(key) {
            let time_moved = existing.unlock_time != candidate.unlock_time;

            // Category first: an invalid transition must fail before the
            // entry is touched at all.
            if let Some((from, to)) = set.set_category(key, candidate.category)? {
                outcome.reclassified += 1;
                outcome.changes.push((key, EntryChange::Reclassified { from, to }));
            }
            if time_moved {
                set.set_unlock_time(key, candidate.unlock_time)?;
                outcome.updated += 1;
                outcome.changes.push((key, EntryChange::TimeUpdated));
            }
        } else if first_seen || !candidate.is_ready(now) {
            set.insert(candidate)?;
            outcome.inserted += 1;
            outcome.changes.push((key, EntryChange::Inserted));
        } else {
            outcome.discarded += 1;
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::TimerCategory;
    use chrono::TimeZone;

    fn at(epoch: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(epoch, 0).single().unwrap()
    }

    fn mission(id: i64, name: &str, epoch: i64) -> TimerEntry {
        TimerEntry::new(id, name, at(epoch), TimerCategory::Mission)
    }

    #[test]
    fn test_merge_is_idempotent() {
        let now = at(1000);
        let mut set = TimerSet::new();
        let candidates = vec![mission(1, "A", 2000), mission(2, "B", 3000)];

        let first = merge(&mut set, candidates.clone(), true, now).unwrap();
        assert_eq!(first.inserted, 2);

        let second = merge(&mut set, candidates, false, now).unwrap();
        assert!(second.is_quiet());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_ready_candidate_not_resurrected() {
        let now = at(1000);
        let mut set = TimerSet::new();
        set.insert(mission(1, "Kept", 2000)).unwrap();

        // Key 2 is absent and its candidate is already ready: discarded.
        let outcome = merge(&mut set, vec![mission(2, "Gone", 500)], false, now).unwrap();
        assert_eq!(outcome.discarded, 1);
        assert_eq!(set.len(), 1);
        assert!(!set.contains(mission(2, "Gone", 500).key()));
    }

    #[test]
    fn test_first_seen_inserts_ready_entries() {
        let now = at(1000);
        let mut set = TimerSet::new();

        let outcome = merge(&mut set, vec![mission(2, "Expired", 500)], true, now).unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_existing_key_updates_unlock_time() {
        let now = at(1000);
        let mut set = TimerSet::new();
        set.insert(mission(1, "Mission", 2000)).unwrap();

        let outcome = merge(&mut set, vec![mission(1, "Mission", 2500)], false, now).unwrap();
        assert_eq!(outcome.updated, 1);
        assert_eq!(
            outcome.changes,
            vec![(mission(1, "Mission", 0).key(), EntryChange::TimeUpdated)]
        );
        assert_eq!(set.get(mission(1, "Mission", 0).key()).unwrap().unlock_time, at(2500));
    }

    #[test]
    fn test_agent_reclassification_keeps_one_entry() {
        let now = at(1000);
        let mut set = TimerSet::new();
        let agent = TimerEntry::new(4, "Carter", at(2000), TimerCategory::AgentMission);
        let key = agent.key();
        set.insert(agent).unwrap();

        let candidate = TimerEntry::new(4, "Carter", at(2000), TimerCategory::AgentRecovery);
        let outcome = merge(&mut set, vec![candidate], false, now).unwrap();

        assert_eq!(outcome.reclassified, 1);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(key).unwrap().category, TimerCategory::AgentRecovery);
        assert!(outcome.changes.iter().any(|(k, c)| {
            *k == key
                && *c == EntryChange::Reclassified {
                    from: TimerCategory::AgentMission,
                    to: TimerCategory::AgentRecovery,
                }
        }));
    }

    #[test]
    fn test_fixed_category_change_is_an_error() {
        let now = at(1000);
        let mut set = TimerSet::new();
        set.insert(TimerEntry::new(5, "Anima", at(2000), TimerCategory::Lair))
            .unwrap();

        let candidate = TimerEntry::new(5, "Anima", at(2500), TimerCategory::Mission);
        let err = merge(&mut set, vec![candidate], false, now).unwrap_err();
        assert!(matches!(err, ModelError::InvalidTransition { .. }));
        // The entry was not half-updated before the failure.
        let key = TimerEntry::new(5, "Anima", at(2000), TimerCategory::Lair).key();
        assert_eq!(set.get(key).unwrap().unlock_time, at(2000));
    }

    #[test]
    fn test_merge_preserves_alert_fired_on_update() {
        let now = at(1000);
        let mut set = TimerSet::new();
        let mut entry = mission(1, "Fired", 500);
        entry.alert_fired = true;
        let key = entry.key();
        set.insert(entry).unwrap();

        merge(&mut set, vec![mission(1, "Fired", 500)], false, now).unwrap();
        assert!(set.get(key).unwrap().alert_fired);
    }
}
