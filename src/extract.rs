//! Feed-item and article-body extraction.
//!
//! The feed document is parsed leniently as markup, not as strict XML:
//! items are `item` elements with `title`, `description`, `guid` (the
//! article link) and `pubdate` children. The description field carries one
//! level of escaped markup; see [`unwrap_description`].

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// RFC-822 style timestamp used by the feed's `pubdate` field.
pub const PUBDATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid content selector {0:?}")]
    InvalidSelector(String),
    /// The content container is absent, usually an error page or a layout
    /// change. Permanent for the affected article; never retried.
    #[error("no element matches content selector {0:?}")]
    BodyMissing(String),
}

/// One item lifted from the feed document. Immutable once extracted; the
/// `(title, published)` pair identifies the article for dedup purposes.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub link: Url,
    pub published: DateTime<FixedOffset>,
}

/// Outcome of scanning one feed document.
#[derive(Debug)]
pub struct ExtractedItems {
    pub items: Vec<FeedItem>,
    /// Items dropped for a missing field, unparseable date, or invalid link.
    pub skipped: usize,
}

struct FieldSelectors {
    item: Selector,
    title: Selector,
    description: Selector,
    guid: Selector,
    pubdate: Selector,
    para: Selector,
}

fn fields() -> &'static FieldSelectors {
    static FIELDS: OnceLock<FieldSelectors> = OnceLock::new();
    FIELDS.get_or_init(|| {
        // Fixed selector strings, covered by tests
        let parse = |s| Selector::parse(s).expect("static selector");
        FieldSelectors {
            item: parse("item"),
            title: parse("title"),
            description: parse("description"),
            guid: parse("guid"),
            pubdate: parse("pubdate"),
            para: parse("p"),
        }
    })
}

/// Lifts every well-formed item out of a feed document. Malformed items are
/// counted and skipped, never fatal for the document.
pub fn extract_items(document: &Html) -> ExtractedItems {
    let f = fields();
    let mut items = Vec::new();
    let mut skipped = 0;
    for element in document.select(&f.item) {
        match extract_item(element, f) {
            Some(item) => items.push(item),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "malformed feed items dropped during extraction");
    }
    ExtractedItems { items, skipped }
}

fn extract_item(element: ElementRef<'_>, f: &FieldSelectors) -> Option<FeedItem> {
    let title = text_of(element, &f.title)?;
    let description = text_of(element, &f.description)?;
    let link_text = text_of(element, &f.guid)?;
    let pubdate_text = text_of(element, &f.pubdate)?;

    let link = match Url::parse(link_text.trim()) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(link = %link_text.trim(), error = %e, "feed item has invalid link");
            return None;
        }
    };
    let published = match DateTime::parse_from_str(pubdate_text.trim(), PUBDATE_FORMAT) {
        Ok(dt) => dt,
        Err(e) => {
            tracing::warn!(pubdate = %pubdate_text.trim(), error = %e, "feed item has unparseable publish date");
            return None;
        }
    };

    Some(FeedItem {
        title: title.trim().to_string(),
        description: unwrap_description(&description),
        link,
        published,
    })
}

fn text_of(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>())
}

/// The feed escapes the description's markup once: its text is itself a
/// fragment whose first paragraph holds the summary, followed by a link
/// farm the document parser chokes on. Unwrap exactly one level and keep
/// the paragraph text (a quirk of this source, not a general rule).
pub fn unwrap_description(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let text: String = match fragment.select(&fields().para).next() {
        Some(paragraph) => paragraph.text().collect(),
        None => fragment.root_element().text().collect(),
    };
    text.trim().to_string()
}

/// The article's content container, configured as a CSS selector and
/// validated once at startup.
#[derive(Debug, Clone)]
pub struct BodySelector {
    selector: Selector,
    source: String,
}

impl BodySelector {
    pub fn new(source: &str) -> Result<Self, ExtractError> {
        let selector = Selector::parse(source)
            .map_err(|_| ExtractError::InvalidSelector(source.to_string()))?;
        Ok(Self {
            selector,
            source: source.to_string(),
        })
    }
}

/// Pulls the article body out of a detail page.
pub fn extract_body(document: &Html, body: &BodySelector) -> Result<String, ExtractError> {
    let node = document
        .select(&body.selector)
        .next()
        .ok_or_else(|| ExtractError::BodyMissing(body.source.clone()))?;
    Ok(node.text().collect::<String>().trim().to_string())
}
