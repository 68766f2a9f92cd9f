//! Source fetcher contract + job board listing adapters.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use careersync_core::{normalize, CanonicalRecord, RawEntry};
use careersync_storage::{FetchError, HttpFetcher};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info};

pub const CRATE_NAME: &str = "careersync-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("listing fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("invalid selector {selector}: {reason}")]
    Selector { selector: &'static str, reason: String },
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Produces the current set of postings for one job board.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn source_id(&self) -> &str;

    async fn fetch_records(&self) -> Result<Vec<CanonicalRecord>, AdapterError>;
}

const POSITION: &str = ".position";
const TITLE: &str = "h2";
const DEPARTMENT: &str = ".department";
const LOCATION: &str = ".location";
const ANCHOR: &str = "a";
const SALARY: &str = r#"[title="Salary"]"#;
const TYPE_TOKEN: &str = ".type span";

struct ListingSelectors {
    position: Selector,
    title: Selector,
    department: Selector,
    location: Selector,
    anchor: Selector,
    salary: Selector,
    type_token: Selector,
}

fn selector(css: &'static str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Selector {
        selector: css,
        reason: e.to_string(),
    })
}

impl ListingSelectors {
    fn new() -> Result<Self, AdapterError> {
        Ok(Self {
            position: selector(POSITION)?,
            title: selector(TITLE)?,
            department: selector(DEPARTMENT)?,
            location: selector(LOCATION)?,
            anchor: selector(ANCHOR)?,
            salary: selector(SALARY)?,
            type_token: selector(TYPE_TOKEN)?,
        })
    }
}

/// Concatenated text of every match under `element`, `None` when nothing matches.
fn text_within(element: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    let mut matched = false;
    let mut text = String::new();
    for node in element.select(sel) {
        matched = true;
        text.extend(node.text());
    }
    matched.then_some(text)
}

fn first_attr_within(element: &ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    element
        .select(sel)
        .next()
        .and_then(|n| n.value().attr(attr))
        .map(ToString::to_string)
}

/// Extracts one raw entry per `.position` block of a listing page.
pub fn parse_listing_html(html: &str) -> Result<Vec<RawEntry>, AdapterError> {
    let selectors = ListingSelectors::new()?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selectors.position)
        .map(|position| RawEntry {
            title: text_within(&position, &selectors.title),
            department: text_within(&position, &selectors.department),
            location: text_within(&position, &selectors.location),
            href: first_attr_within(&position, &selectors.anchor, "href"),
            compensation: text_within(&position, &selectors.salary),
            type_token: text_within(&position, &selectors.type_token),
        })
        .collect())
}

/// Parses and normalizes a listing page against the board's base URL.
pub fn records_from_listing(html: &str, base_url: &str) -> Result<Vec<CanonicalRecord>, AdapterError> {
    let entries = parse_listing_html(html)?;
    Ok(entries.iter().map(|entry| normalize(entry, base_url)).collect())
}

/// Live Breezy HR job board.
#[derive(Debug, Clone)]
pub struct BreezyListingFetcher {
    source_id: String,
    listing_url: String,
    base_url: String,
    http: HttpFetcher,
}

impl BreezyListingFetcher {
    pub fn new(
        source_id: impl Into<String>,
        listing_url: impl Into<String>,
        base_url: impl Into<String>,
        http: HttpFetcher,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            listing_url: listing_url.into(),
            base_url: base_url.into(),
            http,
        }
    }
}

#[async_trait]
impl SourceFetcher for BreezyListingFetcher {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_records(&self) -> Result<Vec<CanonicalRecord>, AdapterError> {
        let page = self.http.fetch_text(&self.source_id, &self.listing_url).await?;
        let records = records_from_listing(&page.body, &self.base_url)?;
        info!(
            source_id = %self.source_id,
            url = %page.final_url,
            status = page.status.as_u16(),
            postings = records.len(),
            "parsed job board listing"
        );
        Ok(records)
    }
}

/// Listing page captured on disk, re-read on every fetch.
#[derive(Debug, Clone)]
pub struct FixtureListingFetcher {
    source_id: String,
    path: PathBuf,
    base_url: String,
}

impl FixtureListingFetcher {
    pub fn new(source_id: impl Into<String>, path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            path: path.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for FixtureListingFetcher {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_records(&self) -> Result<Vec<CanonicalRecord>, AdapterError> {
        let html = load_listing_fixture(&self.path)?;
        debug!(source_id = %self.source_id, path = %self.path.display(), "loaded listing fixture");
        records_from_listing(&html, &self.base_url)
    }
}

/// Fixed answer, for tests and dry runs. Never touches the network.
#[derive(Debug, Clone)]
pub struct StaticSourceFetcher {
    source_id: String,
    outcome: std::result::Result<Vec<CanonicalRecord>, String>,
}

impl StaticSourceFetcher {
    pub fn new(source_id: impl Into<String>, records: Vec<CanonicalRecord>) -> Self {
        Self {
            source_id: source_id.into(),
            outcome: Ok(records),
        }
    }

    pub fn failing(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            outcome: Err(message.into()),
        }
    }
}

#[async_trait]
impl SourceFetcher for StaticSourceFetcher {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_records(&self) -> Result<Vec<CanonicalRecord>, AdapterError> {
        self.outcome.clone().map_err(AdapterError::Message)
    }
}

pub fn load_listing_fixture(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).with_context(|| format!("reading listing fixture {}", path.display()))
}
