//! Forward-only keyset cursors over a [`GraphStore`].
//!
//! The cursors hold only the last key they returned, not a borrow of the
//! store, so a phase can read a page, write through `&mut` store, and then
//! ask for the next page. [`NodeCursor::reset`] restarts from the beginning.

use super::GraphStore;
use crate::error::Result;
use crate::model::{Edge, EdgeKey, Node};

#[derive(Debug, Clone)]
pub struct NodeCursor {
    page_size: usize,
    after: Option<String>,
    done: bool,
}

impl NodeCursor {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            after: None,
            done: false,
        }
    }

    /// Next page of nodes, or `None` once the store is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn next_page<S: GraphStore + ?Sized>(&mut self, store: &S) -> Result<Option<Vec<Node>>> {
        if self.done {
            return Ok(None);
        }
        let page = store.node_page(self.after.as_deref(), self.page_size)?;
        if page.len() < self.page_size {
            self.done = true;
        }
        match page.last() {
            Some(last) => {
                self.after = Some(last.id.clone());
                Ok(Some(page))
            }
            None => Ok(None),
        }
    }

    pub fn reset(&mut self) {
        self.after = None;
        self.done = false;
    }
}

/// Pages through all edges of one relation at one exact depth.
#[derive(Debug, Clone)]
pub struct EdgeCursor {
    relation: String,
    depth: u32,
    page_size: usize,
    after: Option<EdgeKey>,
    done: bool,
}

impl EdgeCursor {
    #[must_use]
    pub fn new(relation: &str, depth: u32, page_size: usize) -> Self {
        Self {
            relation: relation.to_string(),
            depth,
            page_size: page_size.max(1),
            after: None,
            done: false,
        }
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub fn next_page<S: GraphStore + ?Sized>(&mut self, store: &S) -> Result<Option<Vec<Edge>>> {
        if self.done {
            return Ok(None);
        }
        let page = store.edges_at_depth(
            &self.relation,
            self.depth,
            self.after.as_ref(),
            self.page_size,
        )?;
        if page.len() < self.page_size {
            self.done = true;
        }
        match page.last() {
            Some(last) => {
                self.after = Some(last.key());
                Ok(Some(page))
            }
            None => Ok(None),
        }
    }
}
