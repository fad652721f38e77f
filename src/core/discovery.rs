//! Discovery of per-character snapshot files.
//!
//! The game keeps one preferences tree per account, with a `Char<id>`
//! directory per character. Each of those may hold the snapshot file the
//! in-game mod writes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

/// Snapshot filename inside each character directory.
pub const SNAPSHOT_FILE: &str = "Prefs_2.xml";

lazy_static! {
    static ref CHAR_DIR: Regex = Regex::new(r"^Char\d+$").expect("invalid character dir pattern");
}

/// One discovered snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSource {
    pub path: PathBuf,
    /// Display name to fall back on when the snapshot has no name field.
    /// The `Char<id>` directory name is not informative, but it is unique.
    pub fallback_name: String,
}

/// Walk `prefs_root`'s account directories and their `Char<id>` children,
/// returning every character directory that holds a snapshot file.
///
/// Unreadable account directories are skipped with a warning; only a
/// missing or unreadable root is an error.
pub fn find_snapshot_sources(prefs_root: &Path) -> io::Result<Vec<SnapshotSource>> {
    let mut sources = Vec::new();

    for account in fs::read_dir(prefs_root)? {
        let account = match account {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {:?}: {}", prefs_root, e);
                continue;
            }
        };
        let account_path = account.path();
        if !account_path.is_dir() {
            continue;
        }

        let characters = match fs::read_dir(&account_path) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Skipping unreadable account dir {:?}: {}", account_path, e);
                continue;
            }
        };

        for character in characters.flatten() {
            let character_path = character.path();
            if !character_path.is_dir() {
                continue;
            }
            let dir_name = match character_path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if !CHAR_DIR.is_match(dir_name) {
                continue;
            }

            let snapshot = character_path.join(SNAPSHOT_FILE);
            if snapshot.is_file() {
                sources.push(SnapshotSource {
                    path: snapshot,
                    fallback_name: dir_name.to_string(),
                });
            }
        }
    }

    // Directory iteration order is platform-dependent; keep cycles stable.
    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}
