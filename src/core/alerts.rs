//! Alert mask, alert events, and edge-triggered ready detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{EntryChange, TimerCategory, TimerKey, TimerSet};

/// Bitmask over the category set, filtering which ready transitions are
/// surfaced as user-facing alerts. Configured externally; the core only
/// consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertMask(u8);

impl AlertMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b1111);

    const fn bit(category: TimerCategory) -> u8 {
        match category {
            TimerCategory::AgentMission => 1 << 0,
            TimerCategory::AgentRecovery => 1 << 1,
            TimerCategory::Lair => 1 << 2,
            TimerCategory::Mission => 1 << 3,
        }
    }

    pub const fn single(category: TimerCategory) -> Self {
        Self(Self::bit(category))
    }

    pub const fn with(self, category: TimerCategory) -> Self {
        Self(self.0 | Self::bit(category))
    }

    pub const fn contains(self, category: TimerCategory) -> bool {
        self.0 & Self::bit(category) != 0
    }
}

impl Default for AlertMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for AlertMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A user-facing notification produced by one poll cycle.
///
/// At most one `CooldownReady` is emitted per cycle regardless of how many
/// entries crossed; pattern matches are one per qualifying log line.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    CooldownReady { category: TimerCategory },
    PatternMatch { source: String, line: String },
}

/// Result of one detection pass over a `TimerSet`.
#[derive(Debug, Default)]
pub struct DetectOutcome {
    pub changes: Vec<(TimerKey, EntryChange)>,
    /// Category of the first mask-filtered ready transition, if any.
    pub alert_category: Option<TimerCategory>,
}

/// Recompute remaining times and catch not-ready -> ready edges.
///
/// Entries that are ready and already reported are skipped entirely: no
/// recomputation, no notification. Everything else reports its new
/// remaining value; an entry whose readiness disagrees with `alert_fired`
/// has the flag brought in line, and a fresh ready edge becomes the
/// candidate alert if its category passes the mask. (The reverse edge -
/// a merge pushed the unlock time forward after the alert fired - only
/// re-arms the flag.)
pub fn detect_ready_transitions(
    set: &mut TimerSet,
    mask: AlertMask,
    now: DateTime<Utc>,
) -> DetectOutcome {
    let mut outcome = DetectOutcome::default();

    for entry in set.entries_mut() {
        let ready = entry.is_ready(now);
        if ready && entry.alert_fired {
            // Settled; nothing left to report for this entry.
            continue;
        }

        outcome
            .changes
            .push((entry.key(), EntryChange::RemainingUpdated(entry.remaining(now))));

        if ready != entry.alert_fired {
            entry.alert_fired = ready;
            if ready && mask.contains(entry.category) && outcome.alert_category.is_none() {
                outcome.alert_category = Some(entry.category);
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::TimerEntry;
    use chrono::{Duration, TimeZone};

    fn at(epoch: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(epoch, 0).single().unwrap()
    }

    fn set_with(entries: Vec<TimerEntry>) -> TimerSet {
        let mut set = TimerSet::new();
        for entry in entries {
            set.insert(entry).unwrap();
        }
        set
    }

    #[test]
    fn test_ready_edge_fires_exactly_once() {
        let mut set = set_with(vec![TimerEntry::new(
            1,
            "Mission",
            at(1000),
            TimerCategory::Mission,
        )]);
        let key = TimerKey {
            scope: crate::core::model::CategoryScope::Fixed,
            id: 1,
        };

        // Poll before the unlock: pending, no alert.
        let before = detect_ready_transitions(&mut set, AlertMask::ALL, at(900));
        assert_eq!(before.alert_category, None);
        assert_eq!(before.changes.len(), 1);
        assert!(!set.get(key).unwrap().alert_fired);

        // Poll that crosses the edge: alert, flag latched.
        let crossing = detect_ready_transitions(&mut set, AlertMask::ALL, at(1001));
        assert_eq!(crossing.alert_category, Some(TimerCategory::Mission));
        assert!(set.get(key).unwrap().alert_fired);

        // Later polls skip the settled entry entirely.
        let after = detect_ready_transitions(&mut set, AlertMask::ALL, at(2000));
        assert_eq!(after.alert_category, None);
        assert!(after.changes.is_empty());
    }

    #[test]
    fn test_mask_filters_out_categories() {
        let mut set = set_with(vec![TimerEntry::new(
            2,
            "Lair",
            at(1000),
            TimerCategory::Lair,
        )]);

        let outcome =
            detect_ready_transitions(&mut set, AlertMask::single(TimerCategory::Mission), at(1500));
        // Filtered out of alerting, but the flag still latches.
        assert_eq!(outcome.alert_category, None);
        assert!(set.iter().next().unwrap().alert_fired);
    }

    #[test]
    fn test_pending_entries_report_remaining() {
        let mut set = set_with(vec![TimerEntry::new(
            3,
            "Soon",
            at(2000),
            TimerCategory::Mission,
        )]);

        let outcome = detect_ready_transitions(&mut set, AlertMask::ALL, at(1400));
        match &outcome.changes[..] {
            [(_, EntryChange::RemainingUpdated(remaining))] => {
                assert_eq!(*remaining, Duration::seconds(600));
            }
            other => panic!("unexpected changes: {:?}", other),
        }
    }

    #[test]
    fn test_forward_moved_unlock_rearms_without_alert() {
        let mut entry = TimerEntry::new(4, "Pushed", at(3000), TimerCategory::Mission);
        entry.alert_fired = true; // fired earlier, then a merge moved the time forward
        let key = entry.key();
        let mut set = set_with(vec![entry]);

        let outcome = detect_ready_transitions(&mut set, AlertMask::ALL, at(2000));
        assert_eq!(outcome.alert_category, None);
        assert!(!set.get(key).unwrap().alert_fired);

        // The next crossing alerts again.
        let crossing = detect_ready_transitions(&mut set, AlertMask::ALL, at(3001));
        assert_eq!(crossing.alert_category, Some(TimerCategory::Mission));
    }

    #[test]
    fn test_mask_bit_operations() {
        let mask = AlertMask::single(TimerCategory::Lair).with(TimerCategory::AgentMission);
        assert!(mask.contains(TimerCategory::Lair));
        assert!(mask.contains(TimerCategory::AgentMission));
        assert!(!mask.contains(TimerCategory::Mission));
        assert!(!AlertMask::NONE.contains(TimerCategory::Lair));
        assert_eq!(
            AlertMask::single(TimerCategory::Lair) | AlertMask::single(TimerCategory::Mission),
            AlertMask::single(TimerCategory::Lair).with(TimerCategory::Mission)
        );
    }
}
