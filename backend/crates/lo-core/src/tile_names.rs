//! Recovers the in-game tile names servers print to their log files.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;

/// Bytes read from the end of a log file already scanned once.
pub const TAIL_BYTES: u64 = 50 * 1024;

const IDENTIFIER_MARKER: &str = "-identifier=";
const TILE_NAME_MARKER: &str = "LogPersistence: tile_name:";

struct LogFileState {
    modified: SystemTime,
    identifier: Option<String>,
}

/// Incremental scanner over a directory of server logs.
///
/// The first pass over a file reads all of it, because the `-identifier=`
/// command line is printed at the top. Later passes only read the tail and
/// reuse the identifier remembered for that file.
pub struct TileNameScanner {
    log_dir: PathBuf,
    files: HashMap<PathBuf, LogFileState>,
}

impl TileNameScanner {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            files: HashMap::new(),
        }
    }

    /// Tile id to display name for every changed log that names its tile.
    pub fn scan(&mut self) -> io::Result<BTreeMap<String, String>> {
        let mut names = BTreeMap::new();
        if !self.log_dir.is_dir() {
            return Ok(names);
        }

        for entry in std::fs::read_dir(&self.log_dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "log") {
                continue;
            }

            if let Err(e) = self.scan_file(&path, &mut names) {
                debug!("Skipping log {}: {e}", path.display());
            }
        }

        Ok(names)
    }

    fn scan_file(&mut self, path: &Path, names: &mut BTreeMap<String, String>) -> io::Result<()> {
        let modified = std::fs::metadata(path)?.modified()?;
        let previous = self.files.get(path);
        if previous.is_some_and(|state| state.modified >= modified) {
            return Ok(());
        }

        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        let tail_only = previous.is_some() && len > TAIL_BYTES;
        if tail_only {
            file.seek(SeekFrom::Start(len - TAIL_BYTES))?;
        }

        let mut identifier = previous.and_then(|state| state.identifier.clone());
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut first = true;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            // A tail read usually starts mid-line.
            if std::mem::take(&mut first) && tail_only {
                continue;
            }

            let line = String::from_utf8_lossy(&buf);
            if let Some(id) = parse_identifier(&line) {
                identifier = Some(id.to_string());
            }
            if let (Some(name), Some(id)) = (parse_tile_name(&line), identifier.as_ref()) {
                names.insert(id.clone(), name.to_string());
            }
        }

        self.files.insert(
            path.to_path_buf(),
            LogFileState {
                modified,
                identifier,
            },
        );
        Ok(())
    }
}

/// The word following `-identifier=` on a command-line log entry.
pub fn parse_identifier(line: &str) -> Option<&str> {
    let start = line.find(IDENTIFIER_MARKER)? + IDENTIFIER_MARKER.len();
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

pub fn parse_tile_name(line: &str) -> Option<&str> {
    let start = line.find(TILE_NAME_MARKER)? + TILE_NAME_MARKER.len();
    let name = line[start..].trim();
    (!name.is_empty()).then_some(name)
}
