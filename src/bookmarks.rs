use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::info;

pub const DEFAULT_FOLDER: &str = "Leaderboards";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub label: String,
    pub url: String,
}

/// Load the (label, URL) pairs of one bookmarks folder, in file order.
/// Any failure here is fatal for the run: without URLs there is nothing to scan.
pub fn load_folder(path: &Path, folder: &str) -> Result<Vec<Bookmark>> {
    let html = fs::read_to_string(path)
        .with_context(|| format!("Failed to read bookmarks file {}", path.display()))?;
    let bookmarks = parse_folder(&html, folder)
        .with_context(|| format!("Failed to parse bookmarks file {}", path.display()))?;
    info!("{} bookmarks in folder {:?}", bookmarks.len(), folder);
    Ok(bookmarks)
}

/// Netscape bookmark exports are malformed HTML (unclosed <DT> and <p> tags),
/// so this goes through a forgiving html5ever parse rather than an XML reader.
/// The folder is the <H3> heading with the given title; its links live in the
/// <DL> list that follows.
fn parse_folder(html: &str, folder: &str) -> Result<Vec<Bookmark>> {
    let doc = Html::parse_document(html);
    let h3 = Selector::parse("h3").unwrap();
    let anchors = Selector::parse("a[href]").unwrap();

    for heading in doc.select(&h3) {
        let title = heading.text().collect::<String>();
        if title.trim() != folder {
            continue;
        }
        let Some(list) = following_list(heading) else {
            continue;
        };
        let found = list
            .select(&anchors)
            .map(|a| Bookmark {
                label: a.text().collect::<String>().trim().to_string(),
                url: a.value().attr("href").unwrap_or_default().to_string(),
            })
            .filter(|b| !b.url.is_empty())
            .collect();
        return Ok(found);
    }

    bail!("No folder named {:?} in bookmarks file", folder);
}

/// The folder's <dl>: depending on how html5ever recovers the tree it ends up
/// either as a later sibling of the <h3> (inside the unclosed <dt>) or as a
/// sibling of the <dt> itself.
fn following_list(heading: ElementRef) -> Option<ElementRef> {
    first_dl(heading.next_siblings()).or_else(|| {
        heading
            .parent()
            .and_then(|dt| first_dl(dt.next_siblings()))
    })
}

fn first_dl<'a>(
    siblings: impl Iterator<Item = ego_tree::NodeRef<'a, scraper::Node>>,
) -> Option<ElementRef<'a>> {
    siblings
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "dl")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE NETSCAPE-Bookmark-file-1>
<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset=UTF-8">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks</H1>
<DL><p>
    <DT><H3 ADD_DATE="1716500000">Leaderboards</H3>
    <DL><p>
        <DT><A HREF="https://lmarena.ai/" ADD_DATE="1716500001">Chatbot Arena</A>
        <DT><A HREF="https://livebench.ai/" ADD_DATE="1716500002">LiveBench</A>
    </DL><p>
    <DT><H3 ADD_DATE="1716500003">Reading</H3>
    <DL><p>
        <DT><A HREF="https://example.com/blog">Some blog</A>
    </DL><p>
</DL>
"#;

    #[test]
    fn folder_urls_in_file_order() {
        let got = parse_folder(SAMPLE, "Leaderboards").unwrap();
        assert_eq!(
            got,
            vec![
                Bookmark {
                    label: "Chatbot Arena".into(),
                    url: "https://lmarena.ai/".into(),
                },
                Bookmark {
                    label: "LiveBench".into(),
                    url: "https://livebench.ai/".into(),
                },
            ]
        );
    }

    #[test]
    fn other_folders_are_not_included() {
        let got = parse_folder(SAMPLE, "Leaderboards").unwrap();
        assert!(got.iter().all(|b| !b.url.contains("example.com")));
    }

    #[test]
    fn folder_lookup_is_by_exact_title() {
        let got = parse_folder(SAMPLE, "Reading").unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].url, "https://example.com/blog");
    }

    #[test]
    fn missing_folder_is_an_error() {
        let err = parse_folder(SAMPLE, "Benchmarks").unwrap_err();
        assert!(err.to_string().contains("Benchmarks"));
    }

    #[test]
    fn closed_dt_variant_parses_too() {
        let html = "<DL><DT><H3>Leaderboards</H3></DT><DL>\
                    <DT><A HREF=\"https://ex.ai/\">Ex</A></DT></DL></DL>";
        let got = parse_folder(html, "Leaderboards").unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].label, "Ex");
    }
}
