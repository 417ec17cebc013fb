//! Page bookkeeping for the filtered view.

use std::ops::Range;

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Current page (1-based) and page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    page: usize,
    page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    /// Start on the first page. A zero size is raised to 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages needed for `len` records.
    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size)
    }

    /// Positions in the view covered by the current page.
    pub fn range(&self, len: usize) -> Range<usize> {
        let start = ((self.page - 1) * self.page_size).min(len);
        let end = (start + self.page_size).min(len);
        start..end
    }

    /// Move to `page` if it exists for `len` records. Returns whether it moved.
    pub fn set_page(&mut self, page: usize, len: usize) -> bool {
        if page >= 1 && page <= self.total_pages(len) {
            self.page = page;
            true
        } else {
            false
        }
    }

    /// Change the page size and go back to the first page. Zero is refused.
    pub fn set_page_size(&mut self, page_size: usize) -> bool {
        if page_size == 0 {
            return false;
        }
        self.page_size = page_size;
        self.page = 1;
        true
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }
}
