//! Ministry of Labor FAQ (flat, paged table)
//!
//! List pages are a table with six cells per row: index, linked title,
//! subcategory, publishing department, published date, updated date.

use super::text::{
    clean_text, collect_references, element_text, enclosing_block, parse_date,
    resolve_url, select_first, selector, strip_question,
};
use crate::config::PAGE_PLACEHOLDER;
use crate::crawler::{Cursor, ListItem, ListPage, Navigation, PageRequest, SourceStrategy};
use crate::record::{Answer, RecordDraft, Source};
use crate::{ParseError, ParseResult};
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

/// Breadcrumb label that names the FAQ section itself, not a category
const SECTION_LABEL: &str = "常見問答";

/// Header text of the answer cell on detail pages
const ANSWER_HEADER: &str = "答案";

#[derive(Debug, Clone)]
pub struct MolStrategy {
    list_url: String,
    base: Url,
    max_pages: Option<u32>,
}

impl MolStrategy {
    /// # Arguments
    ///
    /// * `list_url` - List page URL, with `{page}` where the page number goes
    /// * `base` - Base for resolving relative links
    pub fn new(list_url: impl Into<String>, base: Url) -> Self {
        Self {
            list_url: list_url.into(),
            base,
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn parse_row(&self, row: ElementRef<'_>) -> ParseResult<Option<ListItem>> {
        let cells: Vec<ElementRef<'_>> = row.select(&selector("td")?).collect();
        if cells.is_empty() {
            // Header row
            return Ok(None);
        }
        if cells.len() < 6 {
            return Err(ParseError::Malformed(format!(
                "list row has {} cells, expected 6",
                cells.len()
            )));
        }

        let link = cells[1]
            .select(&selector("a[href]")?)
            .next()
            .ok_or(ParseError::MissingField("title link"))?;
        let href = link.value().attr("href").unwrap_or_default();
        let detail_url = resolve_url(href, &self.base).ok_or_else(|| ParseError::InvalidUrl {
            url: href.to_string(),
            reason: "not an http(s) link".to_string(),
        })?;

        let cell_text = |i: usize| clean_text(&cells[i].text().collect::<String>());

        let mut item = ListItem::new(clean_text(&link.text().collect::<String>()), detail_url);
        let subcategory = cell_text(2);
        if !subcategory.is_empty() {
            item.category_path.push(subcategory);
        }
        let department = cell_text(3);
        item.department = (!department.is_empty()).then_some(department);
        item.published_date = parse_date(&cell_text(4));
        item.updated_date = parse_date(&cell_text(5));

        Ok(Some(item))
    }
}

impl SourceStrategy for MolStrategy {
    fn source(&self) -> Source {
        Source::Mol
    }

    fn navigation(&self) -> Navigation {
        Navigation::Flat {
            first_page: 1,
            max_pages: self.max_pages,
        }
    }

    fn list_page_request(&self, cursor: &Cursor) -> ParseResult<PageRequest> {
        match cursor {
            Cursor::Page(page) => Ok(PageRequest::get(
                self.list_url.replace(PAGE_PLACEHOLDER, &page.to_string()),
            )),
            Cursor::Node(_) => Err(ParseError::UnsupportedCursor(cursor.to_string())),
        }
    }

    fn parse_list_page(&self, body: &str, _cursor: &Cursor) -> ParseResult<ListPage> {
        let document = Html::parse_document(body);
        let table = document
            .select(&selector("table")?)
            .next()
            .ok_or(ParseError::MissingField("list table"))?;

        let mut items = Vec::new();
        let mut warnings = 0;
        for row in table.select(&selector("tr")?) {
            match self.parse_row(row) {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(e) => {
                    debug!("Skipping list row: {}", e);
                    warnings += 1;
                }
            }
        }

        let has_more = !items.is_empty();
        Ok(ListPage::flat(items, has_more).with_warnings(warnings))
    }

    fn parse_detail_page(&self, body: &str, item: &ListItem) -> ParseResult<RecordDraft> {
        let document = Html::parse_document(body);

        let heading = document.select(&selector("h2")?).next();
        let question = heading
            .map(|h| clean_text(&h.text().collect::<String>()))
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| item.title.clone());

        let mut content = select_first(&document, &["article"])?;
        if let (None, Some(heading)) = (content, heading) {
            content = enclosing_block(heading, &selector("p")?);
        }
        if content.is_none() {
            content = select_first(&document, &["main"])?;
        }
        let content = content.ok_or(ParseError::MissingField("content area"))?;

        let answer = match answer_cell(content)? {
            Some(cell) => Answer::new(element_text(cell), cell.html()),
            None => Answer::new(
                strip_question(&element_text(content), &question),
                content.html(),
            ),
        };
        let references = collect_references(content, &answer.text, &self.base)?;

        let subcategory = item.category().to_string();
        let category = breadcrumb_category(&document)?.unwrap_or_else(|| subcategory.clone());

        let mut draft = RecordDraft::new(Source::Mol, question, item.detail_url.clone());
        draft.category = category;
        draft.subcategory = subcategory;
        draft.answer = answer;
        draft.related_references = references;
        draft.published_date = item.published_date;
        draft.updated_date = item.updated_date;
        draft.department = item.department.clone();

        Ok(draft)
    }
}

/// The cell following the `答案` header, if the content has one
fn answer_cell<'a>(content: ElementRef<'a>) -> ParseResult<Option<ElementRef<'a>>> {
    let mut after_header = false;
    for cell in content.select(&selector("th, td")?) {
        match cell.value().name() {
            "th" if cell.text().collect::<String>().contains(ANSWER_HEADER) => {
                after_header = true;
            }
            "td" if after_header => return Ok(Some(cell)),
            _ => {}
        }
    }
    Ok(None)
}

/// The second to last breadcrumb, unless it is the FAQ section itself
fn breadcrumb_category(document: &Html) -> ParseResult<Option<String>> {
    let crumbs: Vec<String> = document
        .select(&selector(".breadcrumb a, nav a")?)
        .map(|a| clean_text(&a.text().collect::<String>()))
        .collect();

    if crumbs.len() < 2 {
        return Ok(None);
    }
    let label = &crumbs[crumbs.len() - 2];
    if label.is_empty() || label == SECTION_LABEL {
        return Ok(None);
    }
    Ok(Some(label.clone()))
}
