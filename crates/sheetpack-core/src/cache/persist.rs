use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::Result;

/// Journal file name inside the output directory.
pub const JOURNAL_FILE: &str = ".tileset-cache";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct JournalRecord {
    key: String,
    digest: String,
}

fn journal_key(output_name: &str) -> String {
    format!("/{output_name}")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Digest of a whole atlas build: the serialized config plus every frame's content.
///
/// Frame order matters; the same files in a different order give a different digest.
pub fn content_digest<C: AsRef<[u8]>>(config_json: &str, frame_contents: &[C]) -> String {
    let mut joined = sha256_hex(config_json.as_bytes());
    for content in frame_contents {
        joined.push('|');
        joined.push_str(&sha256_hex(content.as_ref()));
    }
    sha256_hex(joined.as_bytes())
}

/// Append-only JSON-lines journal of build digests, one per output name.
///
/// Reads never fail: a missing or unreadable journal is a miss, malformed lines are skipped.
#[derive(Debug, Clone)]
pub struct PersistentCache {
    path: PathBuf,
}

impl PersistentCache {
    /// Journal stored as `<dir>/.tileset-cache`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(JOURNAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last digest recorded for `output_name`.
    pub fn last_digest(&self, output_name: &str) -> Option<String> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read cache journal");
                return None;
            }
        };
        let key = journal_key(output_name);
        let mut last = None;
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalRecord>(line) {
                Ok(rec) if rec.key == key => last = Some(rec.digest),
                Ok(_) => {}
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping malformed journal line"),
            }
        }
        last
    }

    /// True only if the last recorded digest matches and every artifact exists.
    pub fn is_fresh<P: AsRef<Path>>(&self, output_name: &str, digest: &str, artifacts: &[P]) -> bool {
        if let Some(missing) = artifacts.iter().find(|a| !a.as_ref().exists()) {
            debug!(artifact = %missing.as_ref().display(), "artifact missing, rebuilding");
            return false;
        }
        self.last_digest(output_name).as_deref() == Some(digest)
    }

    /// Appends a record; earlier records for the same name are shadowed, never rewritten.
    pub fn record(&self, output_name: &str, digest: &str) -> Result<()> {
        let line = serde_json::to_string(&JournalRecord {
            key: journal_key(output_name),
            digest: digest.to_string(),
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
