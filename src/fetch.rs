use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::{debug, warn};

const TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("lb_watch/", env!("CARGO_PKG_VERSION"));

/// Below this many characters of body text, no model name is going to match;
/// treat the page as unrendered and try the next strategy.
const MIN_TEXT_LEN: usize = 200;

/// Final per-URL fetch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Ok,
    Blocked,
    FetchError,
    Empty,
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PageStatus::Ok => "ok",
            PageStatus::Blocked => "blocked",
            PageStatus::FetchError => "fetch-error",
            PageStatus::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// Anti-bot detection as data: sites rotate protection vendors independently
/// of this tool, so the signature set is caller-overridable config.
#[derive(Debug, Clone)]
pub struct BlockSignatures {
    pub status_codes: Vec<u16>,
    pub body_markers: Vec<String>,
}

impl Default for BlockSignatures {
    fn default() -> Self {
        Self {
            status_codes: vec![403, 429],
            body_markers: [
                "captcha",
                "cf-chl",
                "challenge-platform",
                "are you a human",
                "unusual traffic",
                "attention required",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl BlockSignatures {
    fn is_block(&self, status_code: Option<u16>, body: &str) -> bool {
        if status_code.is_some_and(|c| self.status_codes.contains(&c)) {
            return true;
        }
        let lower = body.to_lowercase();
        self.body_markers.iter().any(|m| lower.contains(m.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub min_text_len: usize,
    pub block: BlockSignatures,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(TIMEOUT_SECS),
            min_text_len: MIN_TEXT_LEN,
            block: BlockSignatures::default(),
        }
    }
}

/// Fetch strategies in fallback order. An explicit list rather than nested
/// branching, so adding a third strategy is a one-line change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Static,
    Dynamic,
}

fn plan(force_dynamic: bool) -> Vec<Strategy> {
    if force_dynamic {
        vec![Strategy::Dynamic]
    } else {
        vec![Strategy::Static, Strategy::Dynamic]
    }
}

/// What one strategy brought back before classification.
#[derive(Debug)]
struct RawPage {
    status_code: Option<u16>,
    text: String,
}

#[derive(Debug)]
enum Step {
    /// Usable page text.
    Use(String),
    /// Anti-bot response; terminal, no further strategies.
    Blocked(String),
    /// Well-formed response, but too little text to match anything.
    Thin(String),
    /// Non-blocking HTTP failure.
    Failed(String),
}

fn classify(raw: RawPage, cfg: &FetchConfig) -> Step {
    if cfg.block.is_block(raw.status_code, &raw.text) {
        return Step::Blocked(raw.text);
    }
    if let Some(code) = raw.status_code {
        if !(200..300).contains(&code) {
            return Step::Failed(format!("HTTP {}", code));
        }
    }
    if raw.text.trim().len() < cfg.min_text_len {
        return Step::Thin(raw.text);
    }
    Step::Use(raw.text)
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub status: PageStatus,
    pub text: String,
    pub error: Option<String>,
}

/// Folds classified attempts, in plan order, into a final outcome.
#[derive(Debug, Default)]
struct Attempts {
    thin: Option<String>,
    last_err: Option<String>,
}

impl Attempts {
    /// Returns `Some` when the attempt is terminal (usable text or a block);
    /// `None` means fall through to the next strategy.
    fn absorb(&mut self, attempt: Result<RawPage>, cfg: &FetchConfig) -> Option<FetchOutcome> {
        match attempt {
            Ok(raw) => match classify(raw, cfg) {
                Step::Use(text) => Some(FetchOutcome {
                    status: PageStatus::Ok,
                    text,
                    error: None,
                }),
                // A rendered fetch shares this network identity; a hard block
                // stays a block.
                Step::Blocked(text) => Some(FetchOutcome {
                    status: PageStatus::Blocked,
                    text,
                    error: None,
                }),
                Step::Thin(text) => {
                    self.thin = Some(text);
                    None
                }
                Step::Failed(msg) => {
                    self.last_err = Some(msg);
                    None
                }
            },
            Err(e) => {
                self.last_err = Some(format!("{:#}", e));
                None
            }
        }
    }

    /// A hard failure anywhere outranks thin text: a run that errored cannot
    /// claim the page was checked and empty.
    fn finish(self) -> FetchOutcome {
        match (self.thin, self.last_err) {
            (Some(text), None) => FetchOutcome {
                status: PageStatus::Empty,
                text,
                error: None,
            },
            (thin, err) => FetchOutcome {
                status: PageStatus::FetchError,
                text: thin.unwrap_or_default(),
                error: err.or_else(|| Some("every fetch strategy came back empty".into())),
            },
        }
    }
}

pub struct Fetcher {
    client: reqwest::Client,
    spider: Option<Spider>,
    cfg: FetchConfig,
}

impl Fetcher {
    pub fn new(cfg: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        // Rendered fetches go through spider.cloud; without a key the dynamic
        // strategy reports its own error instead of failing the whole run.
        let spider = match std::env::var("SPIDER_API_KEY") {
            Ok(key) => Some(
                Spider::new(Some(key)).map_err(|e| anyhow!("Failed to create Spider client: {}", e))?,
            ),
            Err(_) => None,
        };

        Ok(Self { client, spider, cfg })
    }

    /// Fetch page text for one URL: static GET first, one rendered-fetch
    /// fallback. Never returns an `Err`: per-URL failures are a status, not
    /// an abort.
    pub async fn fetch(&self, url: &str, force_dynamic: bool) -> FetchOutcome {
        let mut attempts = Attempts::default();
        for strategy in plan(force_dynamic) {
            let raw = match strategy {
                Strategy::Static => self.fetch_static(url).await,
                Strategy::Dynamic => self.fetch_dynamic(url).await,
            };
            if let Err(e) = &raw {
                debug!("{:?} fetch of {} failed: {:#}", strategy, url, e);
            }
            if let Some(done) = attempts.absorb(raw, &self.cfg) {
                return done;
            }
        }
        let outcome = attempts.finish();
        if let Some(err) = &outcome.error {
            warn!("{}: {} ({})", url, outcome.status, err);
        }
        outcome
    }

    async fn fetch_static(&self, url: &str) -> Result<RawPage> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("static fetch failed")?;
        let status_code = resp.status().as_u16();
        let text = resp.text().await.context("failed to read response body")?;
        Ok(RawPage {
            status_code: Some(status_code),
            text,
        })
    }

    async fn fetch_dynamic(&self, url: &str) -> Result<RawPage> {
        let spider = self
            .spider
            .as_ref()
            .ok_or_else(|| anyhow!("SPIDER_API_KEY not set; rendered fetch unavailable"))?;

        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Markdown)),
            ..Default::default()
        };

        let response = spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| anyhow!("rendered fetch failed: {}", e))?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };

        let first = parsed.as_array().and_then(|arr| arr.first());
        let text = first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        let status_code = first
            .and_then(|obj| obj.get("status"))
            .and_then(|s| s.as_i64())
            .map(|s| s as u16);

        Ok(RawPage { status_code, text })
    }
}
