//! Text and markup helpers shared by the source strategies
//!
//! - Whitespace cleanup and date parsing
//! - Resolving links against a site's base URL
//! - Reading text out of elements the way the sites lay it out
//! - Finding law and regulation names in answers

use crate::record::Reference;
use crate::{ParseError, ParseResult};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Date layouts seen on the sources, tried in order
pub const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];

/// Link text that marks an anchor as a law or regulation
const LAW_KEYWORDS: [&str; 5] = ["法", "辦法", "規則", "條例", "細則"];

/// Collapses runs of whitespace into single spaces and trims the ends
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a date in any of [`DATE_FORMATS`]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Finds the date following `label` (e.g. `更新日期：2025-09-10`)
pub fn labelled_date(text: &str, label: &str) -> Option<NaiveDate> {
    let pattern = format!(
        r"{}\s*[：:]?\s*(\d{{4}}[-/.]\d{{1,2}}[-/.]\d{{1,2}})",
        regex::escape(label)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_date(m.as_str()))
}

/// Finds the first date anywhere in `text`
pub fn first_date(text: &str) -> Option<NaiveDate> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"\d{4}[-/]\d{2}[-/]\d{2}").ok())
        .as_ref()?;
    re.find(text).and_then(|m| parse_date(m.as_str()))
}

/// Resolves an href against `base`
///
/// Returns None if the link should be ignored:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel: and data: links
/// - hrefs that do not resolve to an HTTP(S) URL
pub fn resolve_url(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}

/// Compiles a CSS selector
pub fn selector(css: &str) -> ParseResult<Selector> {
    Selector::parse(css).map_err(|e| ParseError::Selector(format!("{}: {:?}", css, e)))
}

/// The first element matching any of `candidates`, tried in order
pub fn select_first<'a>(document: &'a Html, candidates: &[&str]) -> ParseResult<Option<ElementRef<'a>>> {
    for css in candidates {
        if let Some(element) = document.select(&selector(css)?).next() {
            return Ok(Some(element));
        }
    }
    Ok(None)
}

/// Cleaned text of the first element matching any of `candidates` that has some
pub fn first_text(document: &Html, candidates: &[&str]) -> ParseResult<Option<String>> {
    for css in candidates {
        if let Some(element) = document.select(&selector(css)?).next() {
            let text = clean_text(&element.text().collect::<String>());
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }
    Ok(None)
}

/// Element text, one trimmed line per text node
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// All text of a document, concatenated as-is
pub fn document_text(document: &Html) -> String {
    document.root_element().text().collect()
}

/// Direct element children of `element`
pub fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

/// First direct child element named `name`
pub fn child_named<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    child_elements(element).find(|child| child.value().name() == name)
}

/// Closest ancestor of `element` (below `body`) that contains a `marker`
pub fn enclosing_block<'a>(element: ElementRef<'a>, marker: &Selector) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|ancestor| !matches!(ancestor.value().name(), "body" | "html"))
        .find(|ancestor| ancestor.select(marker).next().is_some())
}

/// Removes the first occurrence of the question from answer text
pub fn strip_question(answer: &str, question: &str) -> String {
    if question.is_empty() {
        return answer.trim().to_string();
    }
    answer.replacen(question, "", 1).trim().to_string()
}

fn law_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // `…法` only counts when not followed by 律 or 規
            r"([^。，\n]{2,30}法)(?:[^律規]|$)",
            r"([^。，\n]{2,30}辦法)",
            r"([^。，\n]{2,30}規則)",
            r"([^。，\n]{2,30}條例)",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Names of laws and regulations mentioned in `text`, in order of discovery
///
/// Names of three characters or fewer are ignored.
pub fn extract_related_laws(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for re in law_patterns() {
        let mut start = 0;
        while let Some(caps) = re.captures_at(text, start) {
            let Some(name) = caps.get(1) else { break };
            start = name.end();

            let cleaned = name.as_str().trim();
            if cleaned.chars().count() > 3 && !names.iter().any(|n| n == cleaned) {
                names.push(cleaned.to_string());
            }
        }
    }

    names
}

/// Anchors inside `content` whose text looks like a law name
pub fn link_references(content: ElementRef<'_>, base: &Url) -> ParseResult<Vec<Reference>> {
    let anchors = selector("a[href]")?;
    let mut references = Vec::new();

    for anchor in content.select(&anchors) {
        let name = clean_text(&anchor.text().collect::<String>());
        if name.is_empty() || !LAW_KEYWORDS.iter().any(|keyword| name.contains(keyword)) {
            continue;
        }
        let url = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve_url(href, base))
            .unwrap_or_default();
        references.push(Reference::linked(name, url));
    }

    Ok(references)
}

/// Linked references first, then named-only ones, one entry per name
pub fn merge_references(linked: Vec<Reference>, names: Vec<String>) -> Vec<Reference> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for reference in linked {
        if seen.insert(reference.name.clone()) {
            merged.push(reference);
        }
    }
    for name in names {
        if seen.insert(name.clone()) {
            merged.push(Reference::named(name));
        }
    }

    merged
}

/// References found in a content block: its law links plus law names in `answer`
pub fn collect_references(content: ElementRef<'_>, answer: &str, base: &Url) -> ParseResult<Vec<Reference>> {
    Ok(merge_references(
        link_references(content, base)?,
        extract_related_laws(answer),
    ))
}

/// Drops an update date that precedes the publish date
pub fn ordered_dates(
    published: Option<NaiveDate>,
    updated: Option<NaiveDate>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match (published, updated) {
        (Some(p), Some(u)) if u < p => {
            tracing::debug!("Ignoring update date {} before publish date {}", u, p);
            (published, None)
        }
        _ => (published, updated),
    }
}
