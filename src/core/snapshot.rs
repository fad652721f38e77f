//! Snapshot wire format: the per-character `Prefs_2.xml` written by the
//! in-game mod.
//!
//! The file is a tree of named elements; we only look at the one `Archive`
//! tagged with the mod's archive name. String values arrive wrapped in
//! literal quote characters, and array-valued fields serialize as either a
//! single `String` element or an `Array` of them depending on cardinality.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{TimeZone, Utc};
use serde::Deserialize;

use super::model::{TimerCategory, TimerEntry};

/// Archive element the mod saves its cooldown data under.
pub const ARCHIVE_NAME: &str = "efdClockwatcherMissionList";
/// Name of the string child holding the character's display name.
const CHAR_NAME_FIELD: &str = "CharName";
/// Name of the array child holding the pipe-delimited cooldown records.
const RECORDS_FIELD: &str = "MissionCD";

/// Fixed-category records use sentinel ids to mark lairs.
const LAIR_ID_BASE: i64 = 1000;

#[derive(Debug, Deserialize)]
struct PrefsDoc {
    #[serde(rename = "Archive", default)]
    archives: Vec<ArchiveElem>,
}

#[derive(Debug, Deserialize)]
struct ArchiveElem {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "String", default)]
    strings: Vec<ValueElem>,
    #[serde(rename = "Array", default)]
    arrays: Vec<ArrayElem>,
}

#[derive(Debug, Deserialize)]
struct ValueElem {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@value", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct ArrayElem {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "String", default)]
    values: Vec<ValueElem>,
}

/// Parsed contents of one character's snapshot archive.
#[derive(Debug)]
pub struct ParsedSnapshot {
    /// Display name from the snapshot, if the mod saved one.
    pub name: Option<String>,
    pub candidates: Vec<TimerEntry>,
}

/// Load and parse one snapshot file.
///
/// `Ok(None)` means the mod archive is absent (or the XML is malformed):
/// the character is simply untracked this cycle, not an error. I/O
/// failures (file locked by the game, permissions) bubble up so the caller
/// can skip the source and retry next cycle.
pub fn parse_snapshot_file(path: &Path) -> io::Result<Option<ParsedSnapshot>> {
    let text = fs::read_to_string(path)?;
    let doc: PrefsDoc = match quick_xml::de::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("Malformed snapshot {:?}: {}", path, e);
            return Ok(None);
        }
    };

    let archive = match doc.archives.into_iter().find(|a| a.name == ARCHIVE_NAME) {
        Some(archive) => archive,
        // Mod not in use for this character.
        None => return Ok(None),
    };

    let name = archive
        .strings
        .iter()
        .find(|s| s.name.as_deref() == Some(CHAR_NAME_FIELD))
        .map(|s| s.value.trim().trim_matches('"').to_string())
        .filter(|n| !n.is_empty());

    // Single-element arrays serialize as a bare String child; coerce both
    // shapes into one sequence.
    let raw_records: Vec<&str> = match archive.arrays.iter().find(|a| a.name == RECORDS_FIELD) {
        Some(array) => array.values.iter().map(|v| v.value.as_str()).collect(),
        None => archive
            .strings
            .iter()
            .filter(|s| s.name.as_deref() == Some(RECORDS_FIELD))
            .map(|v| v.value.as_str())
            .collect(),
    };

    let mut candidates = Vec::with_capacity(raw_records.len());
    for raw in raw_records {
        match parse_record(raw) {
            Some(entry) => candidates.push(entry),
            None => log::warn!("Unparseable cooldown record in {:?}: {}", path, raw),
        }
    }

    Ok(Some(ParsedSnapshot { name, candidates }))
}

/// Category of a three-field (fixed) record, derived from its id.
fn fixed_category(id: i64) -> TimerCategory {
    if id <= 0 || id >= LAIR_ID_BASE {
        TimerCategory::Lair
    } else {
        TimerCategory::Mission
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "true" | "True" | "1")
}

/// Parse one pipe-delimited cooldown record.
///
/// `id|unix_epoch_seconds|name` for fixed-category records, with a fourth
/// boolean field for agent records selecting recovery over mission.
pub fn parse_record(raw: &str) -> Option<TimerEntry> {
    let raw = raw.trim().trim_matches('"');
    let fields: Vec<&str> = raw.split('|').collect();
    if fields.len() < 3 || fields.len() > 4 {
        return None;
    }

    let id: i64 = fields[0].trim().parse().ok()?;
    let epoch: i64 = fields[1].trim().parse().ok()?;
    let name = fields[2].trim();
    if name.is_empty() {
        return None;
    }

    let category = match fields.get(3) {
        Some(flag) => {
            if parse_flag(flag) {
                TimerCategory::AgentRecovery
            } else {
                TimerCategory::AgentMission
            }
        }
        None => fixed_category(id),
    };

    let unlock_time = Utc.timestamp_opt(epoch, 0).single()?;
    Some(TimerEntry::new(id, name, unlock_time, category))
}
