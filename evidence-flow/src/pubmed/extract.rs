//! Lenient extraction of article records from an efetch XML response.
//!
//! The response is treated as text with recognisable elements, not as a
//! document that must validate. Each field is pulled out with its own
//! pattern: first match wins for scalar fields, every match counts for
//! repeated ones, and nested markup inside a captured field is removed
//! outright (no space substituted) so `H<sub>2</sub>O` reads `H2O`.
//!
//! A block that lacks fields still yields a record. Missing PMID becomes an
//! empty string, a missing title becomes [`NO_TITLE`].

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::PaperSummary;

pub const NO_TITLE: &str = "No title";

/// Pattern for `<tag ...>content</tag>` that tolerates attributes, rejects
/// self-closing tags and does not confuse `Author` with `AuthorList`.
fn element(tag: &str) -> Regex {
    Regex::new(&format!(
        r"(?s)<{tag}(?:\s+|\s[^>]*[^/>])?>(.*?)</{tag}\s*>"
    ))
    .expect("element pattern is valid")
}

static ARTICLE: LazyLock<Regex> = LazyLock::new(|| element("PubmedArticle"));
static PMID: LazyLock<Regex> = LazyLock::new(|| element("PMID"));
static ARTICLE_TITLE: LazyLock<Regex> = LazyLock::new(|| element("ArticleTitle"));
static AUTHOR: LazyLock<Regex> = LazyLock::new(|| element("Author"));
static LAST_NAME: LazyLock<Regex> = LazyLock::new(|| element("LastName"));
static FORE_NAME: LazyLock<Regex> = LazyLock::new(|| element("ForeName"));
static ABSTRACT: LazyLock<Regex> = LazyLock::new(|| element("Abstract"));
static ABSTRACT_TEXT: LazyLock<Regex> = LazyLock::new(|| element("AbstractText"));
static PUB_DATE: LazyLock<Regex> = LazyLock::new(|| element("PubDate"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| element("Year"));
static MONTH: LazyLock<Regex> = LazyLock::new(|| element("Month"));
static DAY: LazyLock<Regex> = LazyLock::new(|| element("Day"));
static DOI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<ArticleId\s[^>]*\bIdType\s*=\s*["'](?i:doi)["'][^>]*>(.*?)</ArticleId\s*>"#)
        .expect("doi pattern is valid")
});
static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("markup pattern is valid"));

/// Extract every article block of `xml`, in document order.
pub fn parse_article_set(xml: &str) -> Vec<PaperSummary> {
    let papers: Vec<PaperSummary> = ARTICLE
        .captures_iter(xml)
        .map(|caps| parse_article(&caps[1]))
        .collect();

    debug!(count = papers.len(), "Extracted article records");
    papers
}

/// Build one record from the inside of an article block.
pub fn parse_article(block: &str) -> PaperSummary {
    let pmid = first_text(&PMID, block).unwrap_or_default();
    if pmid.is_empty() {
        warn!("Article block without PMID, keeping partial record");
    }

    PaperSummary {
        pmid,
        title: first_text(&ARTICLE_TITLE, block).unwrap_or_else(|| NO_TITLE.to_string()),
        authors: authors(block),
        abstract_text: abstract_text(block),
        published_date: published_date(block),
        doi: first_text(&DOI, block),
    }
}

fn authors(block: &str) -> Vec<String> {
    AUTHOR
        .captures_iter(block)
        .filter_map(|caps| {
            let author = &caps[1];
            let last_name = first_text(&LAST_NAME, author)?;
            let fore_name = first_text(&FORE_NAME, author).unwrap_or_default();
            Some(format!("{} {}", last_name, fore_name).trim_end().to_string())
        })
        .collect()
}

fn abstract_text(block: &str) -> String {
    let Some(caps) = ABSTRACT.captures(block) else {
        return String::new();
    };

    ABSTRACT_TEXT
        .captures_iter(&caps[1])
        .map(|section| clean_text(&section[1]))
        .filter(|section| !section.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn published_date(block: &str) -> String {
    let Some(caps) = PUB_DATE.captures(block) else {
        return String::new();
    };
    let date = &caps[1];

    [&*YEAR, &*MONTH, &*DAY]
        .into_iter()
        .filter_map(|part| first_text(part, date))
        .collect::<Vec<_>>()
        .join("-")
}

/// Cleaned text of the first match, `None` when absent or blank.
fn first_text(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .map(|caps| clean_text(&caps[1]))
        .filter(|text| !text.is_empty())
}

fn clean_text(raw: &str) -> String {
    let stripped = MARKUP.replace_all(raw, "");
    decode_entities(stripped.trim())
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
