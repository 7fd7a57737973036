//! Persisted subscriber preferences.
//!
//! The store is a JSON object keyed by chat id:
//!
//! ```json
//! { "123456": { "subscribed": true, "warnings": false } }
//! ```
//!
//! Older nodes kept a plain text file with one subscribed id per line. When
//! only that legacy file exists it is converted once on load, written in the
//! current format and removed. Once the current store exists the legacy file
//! is never read again, so loading is safe to repeat.
//!
//! All access goes through one async mutex: the command path (mutations) and
//! the broadcast path (reads) never interleave a read-modify-write.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::RegistryError;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    // ---
    pub subscribed: bool,
    #[serde(rename = "warnings")]
    pub warnings_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    // ---
    pub id: String,
    pub subscribed: bool,
    pub warnings_enabled: bool,
}

/// On-disk layout found at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    /// Current JSON store.
    V1,
    /// Newline-delimited ids, every one subscribed without warnings.
    LegacyIdList,
    /// Nothing on disk yet.
    Empty,
}

type Entries = BTreeMap<String, Preferences>;

#[derive(Debug)]
pub struct SubscriberRegistry {
    // ---
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl SubscriberRegistry {
    // ---
    /// Load the store at `path`, migrating `legacy_path` first if needed.
    pub async fn open(
        path: impl Into<PathBuf>,
        legacy_path: impl AsRef<Path>,
    ) -> Result<Self, RegistryError> {
        // ---
        let path = path.into();
        let entries = load_or_migrate(&path, legacy_path.as_ref()).await?;
        tracing::info!(
            "Subscriber registry loaded from {} ({} entries)",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, id: &str) -> Option<Preferences> {
        self.entries.lock().await.get(id).copied()
    }

    /// Consistent copy of every known subscriber.
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        // ---
        self.entries
            .lock()
            .await
            .iter()
            .map(|(id, prefs)| Subscriber {
                id: id.clone(),
                subscribed: prefs.subscribed,
                warnings_enabled: prefs.warnings_enabled,
            })
            .collect()
    }

    /// Returns `Ok(false)` when the subscriber was already in that state.
    pub async fn set_subscribed(&self, id: &str, subscribed: bool) -> Result<bool, RegistryError> {
        self.mutate(id, |p| p.subscribed = subscribed).await
    }

    /// Returns `Ok(false)` when warnings were already in that state.
    pub async fn set_warnings(&self, id: &str, enabled: bool) -> Result<bool, RegistryError> {
        self.mutate(id, |p| p.warnings_enabled = enabled).await
    }

    /// Apply one change and persist the full map. The in-memory map only
    /// moves forward once the write succeeded.
    async fn mutate(
        &self,
        id: &str,
        change: impl FnOnce(&mut Preferences),
    ) -> Result<bool, RegistryError> {
        // ---
        let mut entries = self.entries.lock().await;

        let before = entries.get(id).copied().unwrap_or_default();
        let mut after = before;
        change(&mut after);
        if after == before {
            return Ok(false);
        }

        let mut next = entries.clone();
        next.insert(id.to_string(), after);
        persist(&self.path, &next).await?;
        *entries = next;

        tracing::info!(
            "Subscriber {} now subscribed={} warnings={}",
            id,
            after.subscribed,
            after.warnings_enabled
        );
        Ok(true)
    }
}

// ---

pub async fn detect_format(path: &Path, legacy_path: &Path) -> StoreFormat {
    // ---
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        StoreFormat::V1
    } else if tokio::fs::try_exists(legacy_path).await.unwrap_or(false) {
        StoreFormat::LegacyIdList
    } else {
        StoreFormat::Empty
    }
}

/// Versioned loader. Legacy ids become `{subscribed: true, warnings: false}`.
pub async fn load_or_migrate(path: &Path, legacy_path: &Path) -> Result<Entries, RegistryError> {
    // ---
    match detect_format(path, legacy_path).await {
        StoreFormat::V1 => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| io_error(path, source))?;
            if raw.trim().is_empty() {
                return Ok(Entries::new());
            }
            serde_json::from_str(&raw).map_err(|source| RegistryError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
        StoreFormat::LegacyIdList => {
            let raw = tokio::fs::read_to_string(legacy_path)
                .await
                .map_err(|source| io_error(legacy_path, source))?;
            let entries = parse_legacy(&raw);
            persist(path, &entries).await?;
            tracing::info!(
                "Migrated {} legacy subscribers from {} to {}",
                entries.len(),
                legacy_path.display(),
                path.display()
            );

            match tokio::fs::remove_file(legacy_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Could not remove legacy subscriber file {}: {} (it will be ignored)",
                    legacy_path.display(),
                    e
                ),
            }
            Ok(entries)
        }
        StoreFormat::Empty => Ok(Entries::new()),
    }
}

fn parse_legacy(raw: &str) -> Entries {
    // ---
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|id| {
            (
                id.to_string(),
                Preferences {
                    subscribed: true,
                    warnings_enabled: false,
                },
            )
        })
        .collect()
}

/// Write to a sibling temp file and rename it over the store.
async fn persist(path: &Path, entries: &Entries) -> Result<(), RegistryError> {
    // ---
    let json = serde_json::to_string_pretty(entries).map_err(|source| RegistryError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json)
        .await
        .map_err(|source| io_error(&tmp, source))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.to_path_buf(),
        source,
    }
}
