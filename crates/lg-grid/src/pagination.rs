//! Page state and the offset/limit it implies

use crate::GridError;

/// Current page, page size and total record count.
///
/// The paginator never fetches; the grid reads [`Paginator::range`] after
/// every change and issues the request itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    current_page: usize,
    page_size: usize,
    total_records: usize,
    options: Vec<usize>,
}

impl Paginator {
    /// A paginator on page 1. `page_size` must be one of `options`, and no
    /// option may be zero.
    pub fn new(page_size: usize, options: Vec<usize>) -> Result<Self, GridError> {
        if options.contains(&0) {
            return Err(GridError::UnsupportedPageSize(0, options));
        }
        if !options.contains(&page_size) {
            return Err(GridError::UnsupportedPageSize(page_size, options));
        }
        Ok(Self {
            current_page: 1,
            page_size,
            total_records: 0,
            options,
        })
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn page_size_options(&self) -> &[usize] {
        &self.options
    }

    pub fn total_pages(&self) -> usize {
        self.total_records.div_ceil(self.page_size).max(1)
    }

    /// Change the page size and go back to page 1
    pub fn set_page_size(&mut self, size: usize) -> Result<(), GridError> {
        if size == 0 || !self.options.contains(&size) {
            return Err(GridError::UnsupportedPageSize(size, self.options.clone()));
        }
        self.page_size = size;
        self.current_page = 1;
        Ok(())
    }

    /// Jump to a page, clamped to `[1, total_pages]`. Returns the page
    /// actually selected.
    pub fn set_page(&mut self, page: usize) -> usize {
        self.current_page = page.clamp(1, self.total_pages());
        self.current_page
    }

    pub fn next(&mut self) -> usize {
        self.set_page(self.current_page + 1)
    }

    pub fn previous(&mut self) -> usize {
        self.set_page(self.current_page.saturating_sub(1))
    }

    /// Record the total reported by a fetch. Returns true when the current
    /// page no longer exists and was clamped.
    pub fn set_total(&mut self, total: usize) -> bool {
        self.total_records = total;
        let last = self.total_pages();
        if self.current_page > last {
            self.current_page = last;
            return true;
        }
        false
    }

    pub fn offset(&self) -> usize {
        (self.current_page - 1) * self.page_size
    }

    /// `(offset, limit)` for the current page
    pub fn range(&self) -> (usize, usize) {
        (self.offset(), self.page_size)
    }

    /// `"{from}-{to} of {total}"`, 1-based and inclusive
    pub fn label(&self) -> String {
        if self.total_records == 0 {
            return "0-0 of 0".to_string();
        }
        let from = self.offset() + 1;
        let to = (self.offset() + self.page_size).min(self.total_records);
        format!("{}-{} of {}", from, to, self.total_records)
    }
}
