//! Navigation frontier
//!
//! Holds the list pages (flat sources) or tree nodes (tree sources) that are
//! still to be visited. Tree nodes are visited depth-first in document order,
//! each URL at most once, and never below the configured depth.

use super::strategy::{Cursor, ListPage, Navigation};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

#[derive(Debug)]
pub struct Frontier {
    pending: VecDeque<Cursor>,
    visited: HashSet<String>,
    first_page: u32,
    max_pages: Option<u32>,
    max_depth: u32,
}

impl Frontier {
    /// Creates a frontier holding only the navigation's starting point
    pub fn new(navigation: &Navigation) -> Self {
        let mut frontier = Self {
            pending: VecDeque::new(),
            visited: HashSet::new(),
            first_page: 1,
            max_pages: None,
            max_depth: 0,
        };

        match navigation {
            Navigation::Flat {
                first_page,
                max_pages,
            } => {
                frontier.first_page = *first_page;
                frontier.max_pages = *max_pages;
                frontier.pending.push_back(Cursor::Page(*first_page));
            }
            Navigation::Tree { root, max_depth } => {
                frontier.max_depth = *max_depth;
                frontier.visited.insert(root.url.clone());
                frontier.pending.push_back(Cursor::Node(root.clone()));
            }
        }

        frontier
    }

    /// Takes the next cursor to visit
    pub fn next(&mut self) -> Option<Cursor> {
        self.pending.pop_front()
    }

    /// Queues whatever `page` (read at `cursor`) leads to
    ///
    /// Returns the number of cursors added.
    pub fn advance(&mut self, cursor: &Cursor, page: &ListPage) -> usize {
        match cursor {
            Cursor::Page(current) => {
                if !page.has_more || page.items.is_empty() {
                    return 0;
                }
                let visited_pages = current.saturating_sub(self.first_page) + 1;
                if let Some(max) = self.max_pages {
                    if visited_pages >= max {
                        debug!("Reached the {} page limit", max);
                        return 0;
                    }
                }
                self.pending.push_back(Cursor::Page(current + 1));
                1
            }
            Cursor::Node(_) => {
                let mut added = 0;
                // Reverse so the first child ends up at the front
                for child in page.children.iter().rev() {
                    if child.depth > self.max_depth {
                        debug!("Not descending into {} (depth {})", child.url, child.depth);
                        continue;
                    }
                    if !self.visited.insert(child.url.clone()) {
                        continue;
                    }
                    self.pending.push_front(Cursor::Node(child.clone()));
                    added += 1;
                }
                added
            }
        }
    }

    /// Drops every pending cursor
    pub fn exhaust(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
