//! Occupational Safety and Health Administration FAQ (multi-page tree)
//!
//! Category pages (`nodelist`) and list pages (`lpsimplelist`) are tree
//! nodes; links ending in `/post` are questions. Publishing unit and dates
//! sit in the block around each question link.

use super::text::{
    clean_text, collect_references, document_text, element_text, enclosing_block, first_text,
    labelled_date, ordered_dates, resolve_url, select_first, selector, strip_question,
};
use crate::crawler::{Cursor, ListItem, ListPage, Navigation, PageRequest, SourceStrategy, TreeNode};
use crate::record::{Answer, RecordDraft, Source};
use crate::{ParseError, ParseResult};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Link labels that belong to page chrome rather than the FAQ
const CHROME_LABELS: [&str; 11] = [
    "回上", "列印", "轉寄", "分享", "首頁", "導覽", "English", "搜尋", "進階", "上一頁", "下一頁",
];

const NODE_MARKERS: [&str; 2] = ["nodelist", "lpsimplelist"];

#[derive(Debug, Clone)]
pub struct OshaStrategy {
    list_url: String,
    base: Url,
    path_filter: Option<String>,
    max_depth: u32,
}

/// Metadata read from the block around a question link
#[derive(Debug, Default, PartialEq, Eq)]
struct ItemMeta {
    department: Option<String>,
    published: Option<chrono::NaiveDate>,
    updated: Option<chrono::NaiveDate>,
}

impl OshaStrategy {
    pub fn new(list_url: impl Into<String>, base: Url, max_depth: u32) -> Self {
        Self {
            list_url: list_url.into(),
            base,
            path_filter: None,
            max_depth,
        }
    }

    /// Only follow links whose href contains `filter`
    pub fn with_path_filter(mut self, filter: Option<String>) -> Self {
        self.path_filter = filter.filter(|f| !f.is_empty());
        self
    }

    fn in_scope(&self, href: &str) -> bool {
        self.path_filter
            .as_deref()
            .map_or(true, |filter| href.contains(filter))
    }
}

fn is_chrome(label: &str) -> bool {
    label.chars().count() <= 1 || CHROME_LABELS.iter().any(|chrome| label.contains(chrome))
}

fn is_node_link(href: &str) -> bool {
    NODE_MARKERS.iter().any(|marker| href.contains(marker))
}

fn is_post_link(href: &str) -> bool {
    href.trim_end_matches('/').ends_with("/post")
}

fn department_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"發布單位\s*[：:]\s*(\S+)").ok())
        .as_ref()
}

fn item_meta(link: ElementRef<'_>) -> ItemMeta {
    let Some(block) = link
        .parent()
        .and_then(|parent| parent.parent())
        .and_then(ElementRef::wrap)
    else {
        return ItemMeta::default();
    };
    let text = block.text().collect::<String>();

    ItemMeta {
        department: department_pattern()
            .and_then(|re| re.captures(&text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
        published: labelled_date(&text, "發布日期"),
        updated: labelled_date(&text, "更新日期"),
    }
}

impl SourceStrategy for OshaStrategy {
    fn source(&self) -> Source {
        Source::Osha
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
        let Cursor::Node(node) = cursor else {
            return Err(ParseError::UnsupportedCursor(cursor.to_string()));
        };
        let document = Html::parse_document(body);

        let mut items = Vec::new();
        let mut children = Vec::new();
        let mut seen = HashSet::new();

        for link in document.select(&selector("a[href]")?) {
            let href = link.value().attr("href").unwrap_or_default();
            let label = clean_text(&link.text().collect::<String>());
            if label.is_empty() || is_chrome(&label) || !self.in_scope(href) {
                continue;
            }
            let Some(url) = resolve_url(href, &self.base) else {
                continue;
            };
            if url == node.url || !seen.insert(url.clone()) {
                continue;
            }

            if is_node_link(href) {
                children.push(node.child(url, label));
            } else if is_post_link(href) {
                let meta = item_meta(link);
                let mut item = ListItem::new(label, url);
                item.category_path = node.path.clone();
                item.department = meta.department;
                item.published_date = meta.published;
                item.updated_date = meta.updated;
                items.push(item);
            }
        }

        Ok(ListPage::tree(items, children))
    }

    fn parse_detail_page(&self, body: &str, item: &ListItem) -> ParseResult<RecordDraft> {
        let document = Html::parse_document(body);

        let question = first_text(&document, &["h2", "h1"])?.unwrap_or_else(|| item.title.clone());
        let heading = select_first(&document, &["h2", "h1"])?;

        let mut content = select_first(&document, &["article"])?;
        if let (None, Some(heading)) = (content, heading) {
            content = enclosing_block(heading, &selector("p, ol, ul")?);
        }
        if content.is_none() {
            content = select_first(&document, &["main"])?;
        }
        let content = content.ok_or(ParseError::MissingField("content area"))?;

        let section = content.select(&selector("ol, ul, div")?).next();
        let (text, html) = match section {
            Some(section) => (element_text(section), section.html()),
            None => (element_text(content), content.html()),
        };
        let answer_text = strip_question(&text, &question);
        let references = collect_references(content, &answer_text, &self.base)?;

        // Dates on the detail page take precedence over the list's
        let page_text = document_text(&document);
        let (published, updated) = ordered_dates(
            labelled_date(&page_text, "發布日期").or(item.published_date),
            labelled_date(&page_text, "更新日期").or(item.updated_date),
        );

        let mut draft = RecordDraft::new(Source::Osha, question, item.detail_url.clone());
        draft.category = item.category().to_string();
        draft.subcategory = item.subcategory().to_string();
        draft.answer = Answer::new(answer_text, html);
        draft.related_references = references;
        draft.published_date = published;
        draft.updated_date = updated;
        draft.department = item.department.clone();

        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const FILTER: &str = "/48110/48461/48463/";

    const CATEGORY_PAGE: &str = r##"
        <html><body>
          <nav><a href="/">首頁</a><a href="/en">English</a><a href="#">A</a></nav>
          <div class="page_content">
            <a href="/48110/48461/48463/48470/nodelist">危害預防</a>
            <a href="/48110/48461/48463/48480/lpsimplelist">職業病</a>
            <a href="/48110/48461/48463/48480/lpsimplelist">職業病</a>
            <a href="/99999/nodelist">其他單位</a>
            <div class="item">
              <div class="title"><a href="/48110/48461/48463/48490/post">何謂職業災害?</a></div>
              <div class="meta">發布單位：綜合規劃組 發布日期：2024-03-01 更新日期：2025-09-10</div>
            </div>
          </div>
        </body></html>
    "##;

    fn strategy() -> OshaStrategy {
        OshaStrategy::new(
            "https://www.osha.gov.tw/48110/48461/48463/nodelist",
            Url::parse("https://www.osha.gov.tw").unwrap(),
            5,
        )
        .with_path_filter(Some(FILTER.to_string()))
    }

    fn root_node() -> TreeNode {
        TreeNode::root("https://www.osha.gov.tw/48110/48461/48463/nodelist")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_category_page() {
        let root = root_node();
        let page = strategy()
            .parse_list_page(CATEGORY_PAGE, &Cursor::Node(root.clone()))
            .unwrap();

        assert_eq!(
            page.children,
            vec![
                root.child("https://www.osha.gov.tw/48110/48461/48463/48470/nodelist", "危害預防"),
                root.child("https://www.osha.gov.tw/48110/48461/48463/48480/lpsimplelist", "職業病"),
            ]
        );

        assert_eq!(page.items.len(), 1);
        let item = &page.items[0];
        assert_eq!(item.title, "何謂職業災害?");
        assert_eq!(item.department.as_deref(), Some("綜合規劃組"));
        assert_eq!(item.published_date, Some(date(2024, 3, 1)));
        assert_eq!(item.updated_date, Some(date(2025, 9, 10)));
    }

    #[test]
    fn test_items_carry_node_path() {
        let node = root_node().child("https://www.osha.gov.tw/48110/48461/48463/48480/lpsimplelist", "職業病");
        let page = strategy()
            .parse_list_page(CATEGORY_PAGE, &Cursor::Node(node))
            .unwrap();
        assert_eq!(page.items[0].category(), "職業病");
    }

    #[test]
    fn test_chrome_labels() {
        assert!(is_chrome("回上一頁"));
        assert!(is_chrome("小"));
        assert!(is_chrome("English"));
        assert!(!is_chrome("危害預防"));
    }

    #[test]
    fn test_parse_detail_page() {
        let html = r#"
            <html><body><main>
              <h2>何謂職業災害?</h2>
              <ol><li>依職業安全衛生法第2條定義。</li><li>包含職業病。</li></ol>
              <p>更新日期：2025-09-12</p>
            </main></body></html>
        "#;
        let mut item = ListItem::new("何謂職業災害?", "https://www.osha.gov.tw/48110/48461/48463/48490/post");
        item.category_path = vec!["職業病".to_string()];
        item.published_date = Some(date(2024, 3, 1));
        item.updated_date = Some(date(2025, 9, 10));

        let draft = strategy().parse_detail_page(html, &item).unwrap();

        assert_eq!(draft.question, "何謂職業災害?");
        assert_eq!(draft.answer.text, "依職業安全衛生法第2條定義。\n包含職業病。");
        assert!(draft.answer.html.starts_with("<ol>"));
        assert_eq!(draft.category, "職業病");
        assert_eq!(draft.published_date, Some(date(2024, 3, 1)));
        assert_eq!(draft.updated_date, Some(date(2025, 9, 12)));
        assert!(draft
            .related_references
            .iter()
            .any(|r| r.name.ends_with("職業安全衛生法")));
    }
}
