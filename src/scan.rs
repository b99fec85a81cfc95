use std::collections::BTreeMap;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::bookmarks::Bookmark;
use crate::fetch::{FetchOutcome, Fetcher, PageStatus};
use crate::pattern::ModelPattern;

/// Everything one run learned about one URL.
#[derive(Debug)]
pub struct UrlScan {
    pub url: String,
    pub label: String,
    pub status: PageStatus,
    pub error: Option<String>,
    /// Requested model name → found on this page. `true` only ever comes from
    /// an ok page; any other status means the page could not be checked.
    pub models: BTreeMap<String, bool>,
}

/// Fetch and scan every bookmark in order, one URL at a time. Per-URL
/// failures land in the scan result; nothing here aborts the run.
pub async fn scan_all(
    fetcher: &Fetcher,
    bookmarks: &[Bookmark],
    patterns: &[ModelPattern],
    force_dynamic: bool,
) -> Vec<UrlScan> {
    let pb = ProgressBar::new(bookmarks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=> "),
    );

    let mut scans = Vec::with_capacity(bookmarks.len());
    for bm in bookmarks {
        pb.set_message(bm.label.clone());
        let outcome = fetcher.fetch(&bm.url, force_dynamic).await;
        scans.push(scan_one(bm, outcome, patterns));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let ok = scans.iter().filter(|s| s.status == PageStatus::Ok).count();
    info!(
        "Scanned {} URLs ({} ok, {} not checkable)",
        scans.len(),
        ok,
        scans.len() - ok
    );
    scans
}

/// Pure matching step: every requested model gets an entry, but patterns only
/// run against pages that actually fetched.
fn scan_one(bm: &Bookmark, outcome: FetchOutcome, patterns: &[ModelPattern]) -> UrlScan {
    let models = patterns
        .iter()
        .map(|p| {
            let found = outcome.status == PageStatus::Ok && p.is_match(&outcome.text);
            (p.name.clone(), found)
        })
        .collect();

    UrlScan {
        url: bm.url.clone(),
        label: bm.label.clone(),
        status: outcome.status,
        error: outcome.error,
        models,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::build_patterns;

    fn bm() -> Bookmark {
        Bookmark {
            label: "Chatbot Arena".into(),
            url: "https://lmarena.ai/".into(),
        }
    }

    fn pats() -> Vec<ModelPattern> {
        build_patterns(&["Claude 4 Sonnet".into(), "GPT-5".into()]).unwrap()
    }

    fn outcome(status: PageStatus, text: &str) -> FetchOutcome {
        FetchOutcome {
            status,
            text: text.to_string(),
            error: None,
        }
    }

    #[test]
    fn matches_on_ok_page() {
        let scan = scan_one(
            &bm(),
            outcome(PageStatus::Ok, "1. claude-4-sonnet  2. gemini"),
            &pats(),
        );
        assert_eq!(scan.models["Claude 4 Sonnet"], true);
        assert_eq!(scan.models["GPT-5"], false);
    }

    #[test]
    fn every_requested_model_has_an_entry() {
        let scan = scan_one(&bm(), outcome(PageStatus::Ok, "nothing here"), &pats());
        assert_eq!(scan.models.len(), 2);
        assert!(scan.models.values().all(|&found| !found));
    }

    #[test]
    fn blocked_page_marks_nothing_found() {
        // Even when the challenge page happens to contain the name.
        let scan = scan_one(
            &bm(),
            outcome(PageStatus::Blocked, "rate limited; claude 4 sonnet"),
            &pats(),
        );
        assert_eq!(scan.status, PageStatus::Blocked);
        assert!(scan.models.values().all(|&found| !found));
    }

    #[test]
    fn fetch_error_propagates_status() {
        let mut o = outcome(PageStatus::FetchError, "");
        o.error = Some("HTTP 500".into());
        let scan = scan_one(&bm(), o, &pats());
        assert_eq!(scan.status, PageStatus::FetchError);
        assert_eq!(scan.error.as_deref(), Some("HTTP 500"));
        assert!(scan.models.values().all(|&found| !found));
    }
}
