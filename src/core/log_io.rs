//! Incremental line reader for the game client's append-only log files.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// An open read cursor into one growing log file.
///
/// Opens positioned at end-of-file, so historical content is never
/// replayed, and advances monotonically as complete lines are consumed.
pub struct LogTailer {
    file: File,
    position: u64,
    path: PathBuf,
}

impl LogTailer {
    /// Open a log for shared read access, positioned at the current end.
    /// The producing process may hold the file open for writing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)?;
        let position = file.metadata()?.len();
        Ok(Self {
            file,
            position,
            path: path_ref.to_path_buf(),
        })
    }

    /// Read all complete lines appended since the previous call.
    ///
    /// A trailing chunk without a newline terminator is held back - the
    /// cursor stays before it so the line is returned whole on a later
    /// poll once the writer finishes it.
    pub fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();

        self.file.seek(SeekFrom::Start(self.position))?;
        let mut reader = BufReader::new(&self.file);
        let mut buffer = String::new();

        loop {
            buffer.clear();
            let bytes_read = reader.read_line(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            if !buffer.ends_with('\n') {
                // Partial trailing line; leave the cursor before it.
                break;
            }
            self.position += bytes_read as u64;
            lines.push(buffer.trim_end_matches(['\r', '\n']).to_string());
        }

        Ok(lines)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_opens_at_end_and_reads_only_appended_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client.log");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "historic line").unwrap();

        let mut tailer = LogTailer::open(&path).unwrap();
        assert!(tailer.read_new_lines().unwrap().is_empty());

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "first").unwrap();
        writeln!(file, "second").unwrap();
        file.sync_all().unwrap();

        let lines = tailer.read_new_lines().unwrap();
        assert_eq!(lines, vec!["first", "second"]);
        // Nothing is re-read on the next poll.
        assert!(tailer.read_new_lines().unwrap().is_empty());
    }

    #[test]
    fn test_partial_trailing_line_is_held_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client.log");
        File::create(&path).unwrap();

        let mut tailer = LogTailer::open(&path).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "complete").unwrap();
        write!(file, "still being writ").unwrap();
        file.sync_all().unwrap();

        assert_eq!(tailer.read_new_lines().unwrap(), vec!["complete"]);

        // Writer finishes the line; now it comes through whole.
        writeln!(file, "ten").unwrap();
        file.sync_all().unwrap();
        assert_eq!(tailer.read_new_lines().unwrap(), vec!["still being written"]);
    }

    #[test]
    fn test_crlf_terminators_are_stripped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client.log");
        File::create(&path).unwrap();

        let mut tailer = LogTailer::open(&path).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "windows line\r\n").unwrap();
        file.sync_all().unwrap();

        assert_eq!(tailer.read_new_lines().unwrap(), vec!["windows line"]);
    }
}
