use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fetch::PageStatus;
use crate::scan::UrlScan;

/// One model's record on one URL. A missing model key in `UrlRecord::models`
/// means "never scanned for this model here", which is not the same as
/// scanned and not found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub found: bool,
    /// First sighting on this URL; kept once set, even if the model later
    /// drops off the page.
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    #[serde(default)]
    pub label: String,
    /// Last successful check. Stays null for a URL that has only ever failed
    /// to fetch.
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelRecord>,
}

/// The persisted snapshot, serialized as a JSON object keyed by URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaderboardState {
    pub urls: BTreeMap<String, UrlRecord>,
}

/// What changed between the prior snapshot and this run.
#[derive(Debug, Default, PartialEq)]
pub struct StateDiff {
    pub added_urls: Vec<String>,
    /// (url, label) pairs no longer present in the bookmarks.
    pub removed_urls: Vec<(String, String)>,
    /// (url, model) pairs that flipped to found this run.
    pub newly_found: Vec<(String, String)>,
    /// (url, model) pairs that were found before and are gone now.
    pub newly_lost: Vec<(String, String)>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.added_urls.is_empty()
            && self.removed_urls.is_empty()
            && self.newly_found.is_empty()
            && self.newly_lost.is_empty()
    }
}

/// Read the snapshot. An absent file is the normal first run; a corrupt file
/// costs the change history, not the run: warn and start empty.
pub fn load(path: &Path) -> LeaderboardState {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!("Could not read state file {}: {}", path.display(), e);
            }
            return LeaderboardState::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => state,
        Err(e) => {
            warn!(
                "State file {} is not valid JSON ({}); starting from an empty snapshot",
                path.display(),
                e
            );
            LeaderboardState::default()
        }
    }
}

/// Persist atomically: write a sibling temp file, then rename over the
/// target, so a crash can never leave a truncated snapshot behind.
pub fn save(state: &LeaderboardState, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .with_context(|| format!("Failed to write state file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move state file into place at {}", path.display()))?;
    Ok(())
}

/// Merge this run's scans into the prior snapshot.
///
/// Invariants:
/// - a model entry is written only when this run requested that model AND the
///   page fetched ok; entries for unrequested models carry over untouched,
///   and a blocked/failed/empty page changes nothing but the URL's presence;
/// - `last_checked` advances only on an ok scan;
/// - URLs absent from the current bookmarks are dropped and reported removed.
pub fn merge(
    prior: &LeaderboardState,
    scans: &[UrlScan],
    now: DateTime<Utc>,
) -> (LeaderboardState, StateDiff) {
    let mut next = LeaderboardState::default();
    let mut diff = StateDiff::default();

    for scan in scans {
        if !prior.urls.contains_key(&scan.url) && !next.urls.contains_key(&scan.url) {
            diff.added_urls.push(scan.url.clone());
        }

        let mut record = prior.urls.get(&scan.url).cloned().unwrap_or_default();
        record.label = scan.label.clone();

        if scan.status == PageStatus::Ok {
            record.last_checked = Some(now);
            for (model, &found) in &scan.models {
                let entry = record
                    .models
                    .entry(model.clone())
                    .or_insert(ModelRecord {
                        found: false,
                        first_seen: None,
                    });
                if found && !entry.found {
                    diff.newly_found.push((scan.url.clone(), model.clone()));
                }
                if !found && entry.found {
                    diff.newly_lost.push((scan.url.clone(), model.clone()));
                }
                if found && entry.first_seen.is_none() {
                    entry.first_seen = Some(now);
                }
                entry.found = found;
            }
        }

        next.urls.insert(scan.url.clone(), record);
    }

    for (url, record) in &prior.urls {
        if !next.urls.contains_key(url) {
            diff.removed_urls.push((url.clone(), record.label.clone()));
        }
    }

    (next, diff)
}
