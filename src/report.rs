use std::fmt::Write;

use crate::fetch::PageStatus;
use crate::scan::UrlScan;
use crate::state::{LeaderboardState, StateDiff};

/// Render the run summary: per-URL findings first, then what changed since
/// the last run. Pure formatting; the caller decides where it goes.
pub fn render(scans: &[UrlScan], diff: &StateDiff) -> String {
    let mut out = String::new();

    for scan in scans {
        match scan.status {
            PageStatus::Ok => {
                let found: Vec<&str> = scan
                    .models
                    .iter()
                    .filter(|(_, &found)| found)
                    .map(|(name, _)| name.as_str())
                    .collect();
                let list = if found.is_empty() {
                    "none".to_string()
                } else {
                    found.join(", ")
                };
                let _ = writeln!(out, "{} ({})\n    found: {}", scan.url, scan.label, list);
            }
            _ => {
                // Could not check. Keep it visibly distinct from "confirmed absent".
                let detail = scan
                    .error
                    .as_deref()
                    .map(|e| format!(" → {}", e))
                    .unwrap_or_default();
                let _ = writeln!(out, "[{}] {} ({}){}", scan.status, scan.url, scan.label, detail);
            }
        }
    }

    let _ = writeln!(out, "\n--- Changes since last run ---");
    if diff.is_empty() {
        let _ = writeln!(out, "No changes.");
        return out;
    }

    if !diff.newly_found.is_empty() {
        let _ = writeln!(out, "New matches:");
        for (url, model) in &diff.newly_found {
            let _ = writeln!(out, "  + {} @ {}", model, url);
        }
    }
    if !diff.newly_lost.is_empty() {
        let _ = writeln!(out, "Lost matches:");
        for (url, model) in &diff.newly_lost {
            let _ = writeln!(out, "  - {} @ {}", model, url);
        }
    }
    if !diff.added_urls.is_empty() {
        let _ = writeln!(out, "New URLs:");
        for url in &diff.added_urls {
            let _ = writeln!(out, "  + {}", url);
        }
    }
    if !diff.removed_urls.is_empty() {
        let _ = writeln!(out, "Removed URLs:");
        for (url, label) in &diff.removed_urls {
            let _ = writeln!(out, "  - {} ({})", url, label);
        }
    }

    out
}

/// Compact view of the persisted snapshot for the `status` subcommand.
pub fn render_state(state: &LeaderboardState) -> String {
    let mut out = String::new();

    for (url, rec) in &state.urls {
        let checked = rec
            .last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let _ = writeln!(out, "{} ({}) | last checked {}", url, rec.label, checked);

        for (name, model) in &rec.models {
            let line = match (model.found, model.first_seen) {
                (true, Some(first)) => {
                    format!("found (first seen {})", first.format("%Y-%m-%d"))
                }
                (true, None) => "found".to_string(),
                (false, Some(_)) => "lost".to_string(),
                (false, None) => "not found".to_string(),
            };
            let _ = writeln!(out, "    {:<28} {}", name, line);
        }
    }

    let _ = writeln!(out, "\n{} URLs tracked", state.urls.len());
    out
}
