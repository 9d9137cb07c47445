//! Bureau of Labor Insurance FAQ (one page, nested category tree)
//!
//! The whole FAQ sits in a nested `ul > li` list. An `li` whose link goes
//! nowhere (`javascript:void(0)` or no href) is a category; its nested `ul`
//! holds the next level. Any other link is a question.

use super::text::{
    child_elements, child_named, clean_text, collect_references, document_text, element_text,
    first_date, first_text, labelled_date, ordered_dates, resolve_url, select_first, strip_question,
};
use crate::crawler::{Cursor, ListItem, ListPage, Navigation, PageRequest, SourceStrategy, TreeNode};
use crate::record::{Answer, RecordDraft, Source};
use crate::{ParseError, ParseResult};
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

const TREE_SELECTORS: [&str; 2] = ["div.content ul.multilevel-list", "div.content ul"];
const CONTENT_SELECTORS: [&str; 4] = ["div.main", "div.content", "article", "main"];

/// Items keep this many category levels (category, subcategory)
const CATEGORY_LEVELS: usize = 2;

#[derive(Debug, Clone)]
pub struct BliStrategy {
    list_url: String,
    base: Url,
    max_depth: u32,
}

impl BliStrategy {
    pub fn new(list_url: impl Into<String>, base: Url, max_depth: u32) -> Self {
        Self {
            list_url: list_url.into(),
            base,
            max_depth,
        }
    }

    fn walk(
        &self,
        list: ElementRef<'_>,
        path: &[String],
        items: &mut Vec<ListItem>,
        warnings: &mut u64,
    ) {
        for li in child_elements(list).filter(|el| el.value().name() == "li") {
            let Some(link) = child_named(li, "a") else {
                continue;
            };
            let label = clean_text(&link.text().collect::<String>());
            if label.is_empty() {
                continue;
            }

            let href = link.value().attr("href").unwrap_or_default().trim();
            if href.is_empty() || href.contains("javascript:void(0)") {
                if let Some(nested) = child_named(li, "ul") {
                    let mut nested_path = path.to_vec();
                    nested_path.push(label);
                    self.walk(nested, &nested_path, items, warnings);
                }
                continue;
            }

            match resolve_url(href, &self.base) {
                Some(detail_url) => {
                    let mut item = ListItem::new(label, detail_url);
                    item.category_path = path.iter().take(CATEGORY_LEVELS).cloned().collect();
                    items.push(item);
                }
                None => {
                    debug!("Skipping '{}' with unusable link {}", label, href);
                    *warnings += 1;
                }
            }
        }
    }
}

impl SourceStrategy for BliStrategy {
    fn source(&self) -> Source {
        Source::Bli
    }

    fn navigation(&self) -> Navigation {
        Navigation::Tree {
            root: TreeNode::root(self.list_url.clone()),
            max_depth: self.max_depth,
        }
    }

    fn list_page_request(&self, cursor: &Cursor) -> ParseResult<PageRequest> {
        match cursor {
            Cursor::Node(node) => Ok(PageRequest::get(node.url.clone())),
            Cursor::Page(_) => Err(ParseError::UnsupportedCursor(cursor.to_string())),
        }
    }

    fn parse_list_page(&self, body: &str, cursor: &Cursor) -> ParseResult<ListPage> {
        let document = Html::parse_document(body);
        let tree = select_first(&document, &TREE_SELECTORS)?
            .ok_or(ParseError::MissingField("FAQ tree"))?;

        let path = match cursor {
            Cursor::Node(node) => node.path.clone(),
            Cursor::Page(_) => Vec::new(),
        };

        let mut items = Vec::new();
        let mut warnings = 0;
        self.walk(tree, &path, &mut items, &mut warnings);

        // The tree lives on a single page
        Ok(ListPage::tree(items, Vec::new()).with_warnings(warnings))
    }

    fn parse_detail_page(&self, body: &str, item: &ListItem) -> ParseResult<RecordDraft> {
        let document = Html::parse_document(body);

        let question = first_text(&document, &["h1", "h2"])?.unwrap_or_else(|| item.title.clone());
        let content = select_first(&document, &CONTENT_SELECTORS)?
            .ok_or(ParseError::MissingField("content area"))?;

        let answer_text = strip_question(&element_text(content), &question);
        let references = collect_references(content, &answer_text, &self.base)?;

        let page_text = document_text(&document);
        let published = labelled_date(&page_text, "發布日期");
        let mut updated = labelled_date(&page_text, "更新日期");
        if published.is_none() && updated.is_none() {
            updated = first_date(&page_text);
        }
        let (published, updated) = ordered_dates(published, updated);

        let mut draft = RecordDraft::new(Source::Bli, question, item.detail_url.clone());
        draft.category = item.category().to_string();
        draft.subcategory = item.subcategory().to_string();
        draft.answer = Answer::new(answer_text, content.html());
        draft.related_references = references;
        draft.published_date = published.or(item.published_date);
        draft.updated_date = updated.or(item.updated_date);

        Ok(draft)
    }
}
