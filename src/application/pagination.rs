//! Offset pagination shared by the persistence collaborator and the view cache.

use serde::{Deserialize, Serialize};

/// One page of a listing plus the counts needed to render pagination.
///
/// `total_pages` is always `ceil(total / page_size)`, and 0 when `total` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub rows: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> PagedResult<T> {
    pub fn new(rows: Vec<T>, page: u32, page_size: u32, total: u64) -> Self {
        Self {
            rows,
            page,
            page_size,
            total,
            total_pages: total_pages_for(total, page_size),
        }
    }

    pub fn empty(page: u32, page_size: u32) -> Self {
        Self::new(Vec::new(), page, page_size, 0)
    }

    /// Insert a row at the front, dropping the last row when the page overflows.
    ///
    /// Returns the dropped row, if any.
    pub fn insert_front(&mut self, row: T) -> Option<T> {
        self.rows.insert(0, row);
        let dropped = if self.rows.len() > self.page_size as usize {
            self.rows.pop()
        } else {
            None
        };
        self.total = self.total.saturating_add(1);
        self.recount();
        dropped
    }

    /// Remove the row at `index`, decrementing `total` without going below zero.
    pub fn remove_at(&mut self, index: usize) -> T {
        let row = self.rows.remove(index);
        self.total = self.total.saturating_sub(1);
        self.recount();
        row
    }

    /// Replace the row at `index`; counts are unchanged.
    pub fn replace_at(&mut self, index: usize, row: T) -> T {
        std::mem::replace(&mut self.rows[index], row)
    }

    pub fn recount(&mut self) {
        self.total_pages = total_pages_for(self.total, self.page_size);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `ceil(total / page_size)`; a zero page size yields zero pages.
pub fn total_pages_for(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}
