//! Keeps one open log cursor per active game client.
//!
//! The active set is supplied externally each cycle; clients that go away
//! have their cursor dropped, new ones get a cursor opened at end-of-file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::log_io::LogTailer;

#[derive(Default)]
pub struct SourceTails {
    cursors: HashMap<PathBuf, LogTailer>,
    /// Sources whose open already failed, so each failure is reported once
    /// rather than every poll. Cleared when the source recovers or leaves
    /// the active set.
    warned: HashSet<PathBuf>,
}

impl SourceTails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_tailing(&self, path: &Path) -> bool {
        self.cursors.contains_key(path)
    }

    /// Bring the cursor set in line with the active source set.
    ///
    /// Opening is best-effort: a source that cannot be opened is warned
    /// about once and skipped until a later poll succeeds.
    pub fn reconcile(&mut self, active: &HashSet<PathBuf>) {
        self.cursors.retain(|path, _| {
            let keep = active.contains(path);
            if !keep {
                log::info!("Stopped tailing {:?}", path);
            }
            keep
        });
        self.warned.retain(|path| active.contains(path));

        for path in active {
            if self.cursors.contains_key(path) {
                continue;
            }
            match LogTailer::open(path) {
                Ok(tailer) => {
                    log::info!("Tailing {:?}", path);
                    self.warned.remove(path);
                    self.cursors.insert(path.clone(), tailer);
                }
                Err(e) => {
                    if self.warned.insert(path.clone()) {
                        log::warn!("Cannot open log {:?}: {}", path, e);
                    }
                }
            }
        }
    }

    /// Read newly appended complete lines from every open cursor.
    ///
    /// A read failure on one source is warned about and skipped; it never
    /// aborts the poll.
    pub fn drain(&mut self) -> Vec<(PathBuf, Vec<String>)> {
        let mut drained = Vec::new();
        for (path, tailer) in &mut self.cursors {
            match tailer.read_new_lines() {
                Ok(lines) if !lines.is_empty() => drained.push((path.clone(), lines)),
                Ok(_) => {}
                Err(e) => {
                    log::warn!("Error reading log {:?}: {}", path, e);
                }
            }
        }
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        drained
    }
}
