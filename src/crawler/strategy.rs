//! The source strategy interface
//!
//! A strategy knows one site's page layout: how to address its list pages,
//! how to read items (and, for category trees, child nodes) from them, and
//! how to turn a detail page into a [`RecordDraft`]. Everything else about a
//! crawl is shared and lives in the orchestrator.

use crate::record::{RecordDraft, Source};
use crate::ParseResult;
use chrono::NaiveDate;
use std::fmt;

/// How a source's list pages are navigated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Numbered pages starting at `first_page`
    Flat {
        first_page: u32,
        max_pages: Option<u32>,
    },
    /// A category tree walked depth-first from `root`
    Tree { root: TreeNode, max_depth: u32 },
}

/// A node of a category tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeNode {
    pub url: String,
    /// Category labels from the root down to this node
    pub path: Vec<String>,
    /// 0 for the root
    pub depth: u32,
}

impl TreeNode {
    pub fn root(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: Vec::new(),
            depth: 0,
        }
    }

    /// A child node one level below this one
    pub fn child(&self, url: impl Into<String>, label: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(label.into());
        Self {
            url: url.into(),
            path,
            depth: self.depth + 1,
        }
    }
}

/// A position in the navigation frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Page(u32),
    Node(TreeNode),
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Page(page) => write!(f, "page {}", page),
            Cursor::Node(node) if node.path.is_empty() => write!(f, "root node {}", node.url),
            Cursor::Node(node) => write!(f, "node '{}' ({})", node.path.join(" > "), node.url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// What to send to fetch a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub method: HttpMethod,
    /// Form fields sent with POST requests
    pub form: Vec<(String, String)>,
}

impl PageRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            form: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            form,
        }
    }
}

/// A reference to a detail page found on a list page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub title: String,
    pub detail_url: String,
    /// Category labels, outermost first
    pub category_path: Vec<String>,
    pub published_date: Option<NaiveDate>,
    pub updated_date: Option<NaiveDate>,
    pub department: Option<String>,
}

impl ListItem {
    pub fn new(title: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail_url: detail_url.into(),
            category_path: Vec::new(),
            published_date: None,
            updated_date: None,
            department: None,
        }
    }

    /// Outermost category label
    pub fn category(&self) -> &str {
        self.category_path.first().map(String::as_str).unwrap_or("")
    }

    /// Innermost category label, when the path has more than one level
    pub fn subcategory(&self) -> &str {
        if self.category_path.len() > 1 {
            self.category_path.last().map(String::as_str).unwrap_or("")
        } else {
            ""
        }
    }
}

/// Everything read from one list page or tree node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<ListItem>,
    /// Flat navigation: whether a following page may exist
    pub has_more: bool,
    /// Tree navigation: child nodes to visit
    pub children: Vec<TreeNode>,
    /// Malformed entries that were skipped
    pub warnings: u64,
}

impl ListPage {
    pub fn flat(items: Vec<ListItem>, has_more: bool) -> Self {
        Self {
            items,
            has_more,
            ..Self::default()
        }
    }

    pub fn tree(items: Vec<ListItem>, children: Vec<TreeNode>) -> Self {
        Self {
            items,
            children,
            ..Self::default()
        }
    }

    pub fn with_warnings(mut self, warnings: u64) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Site-specific knowledge plugged into the orchestrator
pub trait SourceStrategy {
    /// The source this strategy harvests
    fn source(&self) -> Source;

    /// Where navigation starts and how far it may go
    fn navigation(&self) -> Navigation;

    /// The request that fetches the list page at `cursor`
    fn list_page_request(&self, cursor: &Cursor) -> ParseResult<PageRequest>;

    /// Reads items (and child nodes) from a fetched list page
    fn parse_list_page(&self, body: &str, cursor: &Cursor) -> ParseResult<ListPage>;

    /// Turns a fetched detail page into a record draft
    fn parse_detail_page(&self, body: &str, item: &ListItem) -> ParseResult<RecordDraft>;
}
