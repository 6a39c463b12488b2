//! Page-number arithmetic for gallery listings.
//!
//! The store speaks in offsets (`start`, `end`); handlers speak in page
//! numbers starting at 1. These helpers translate between the two and work
//! out the previous/next links of a rendered page.

/// A requested page of a gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_number: u64,
    page_size: u64,
}

impl PageRequest {
    /// Page numbers start at 1; 0 is read as 1.
    pub fn new(page_number: u64, page_size: u64) -> Self {
        Self {
            page_number: page_number.max(1),
            page_size,
        }
    }

    pub fn page_number(&self) -> u64 {
        self.page_number
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// `(start, end)` offsets to pass to `get_images`.
    pub fn window(&self) -> (u64, u64) {
        let start = (self.page_number - 1).saturating_mul(self.page_size);
        (start, start.saturating_add(self.page_size))
    }
}

/// Navigation state of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page_number: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageInfo {
    /// `end` is the window end the page was fetched with; `total` the
    /// gallery total returned alongside it.
    pub fn new(page_number: u64, end: u64, total: u64) -> Self {
        let page_number = page_number.max(1);
        Self {
            page_number,
            has_previous: page_number > 1,
            has_next: end < total,
        }
    }

    pub fn previous_page(&self) -> Option<u64> {
        self.has_previous.then(|| self.page_number - 1)
    }

    pub fn next_page(&self) -> Option<u64> {
        self.has_next.then(|| self.page_number + 1)
    }
}
