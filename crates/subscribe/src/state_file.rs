//! JSON state file holding every event and subscriber.
//!
//! ```json
//! {"events":{"motion":{"description":"front door"}},
//!  "subscribers":[{"api":"telegram","contact":"alice",
//!                  "events":{"motion":"2024-05-01T12:00:00Z"},
//!                  "is_admin":true,"ignored":false}]}
//! ```
//!
//! Per-subscription rules go in an optional `rules` object on each
//! subscriber; it is left out entirely when no subscription has rules.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::{Result, subscriber::Rules};

/// The whole persisted aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub events: BTreeMap<String, Rules>,
    #[serde(default)]
    pub subscribers: Vec<SubscriberRecord>,
}

/// One subscriber as it appears on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub api: String,
    pub contact: String,
    /// Subscribed event name to resume time.
    #[serde(default)]
    pub events: BTreeMap<String, DateTime<Utc>>,
    #[serde(default, rename = "is_admin")]
    pub admin: bool,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, Rules>,
}

/// Read and parse `path`. Returns `Ok(None)` when the file does not exist.
pub fn read(path: &Path) -> Result<Option<StateDocument>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let doc = serde_json::from_str(&data)?;
    Ok(Some(doc))
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write `doc` to `path`: temp file, keep the previous copy as `.bak`, rename.
///
/// Each call uses its own temp file. Callers writing the same path from
/// several threads must still serialize calls, since the `.bak` rotation
/// is two renames.
pub fn write(path: &Path, doc: &StateDocument) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(doc)?;
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = sibling(path, &format!("tmp.{}.{seq}", std::process::id()));
    if let Err(e) = fs::write(&tmp, json.as_bytes()) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    match fs::rename(path, sibling(path, "bak")) {
        Ok(()) => {},
        Err(e) if e.kind() == ErrorKind::NotFound => {},
        Err(e) => warn!(path = %path.display(), error = %e, "failed to keep backup of state file"),
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = json.len(), "wrote state file");
    Ok(())
}

/// `subscribers.json` -> `subscribers.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
