//! Pagination state for the entry/exit table.
//!
//! Pure state machine -- the controller issues a request only when a
//! transition actually changes the page or size.

/// Selectable page sizes, in cycling order.
pub const PAGE_SIZES: [u32; 4] = [10, 25, 50, 100];

/// Tracks the current page, page size, and the server-reported totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntriesPager {
    page: u32,
    page_size: u32,
    total_pages: u32,
    total_records: u64,
}

impl EntriesPager {
    pub fn new() -> Self {
        Self {
            page: 1,
            page_size: 25,
            total_pages: 0,
            total_records: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Record the totals from a server response. Clamps the current
    /// page down if the result set shrank underneath it.
    pub fn apply_totals(&mut self, page_number: u32, total_pages: u32, total_records: u64) {
        self.page = page_number.max(1);
        self.total_pages = total_pages;
        self.total_records = total_records;
        if total_pages > 0 && self.page > total_pages {
            self.page = total_pages;
        }
    }

    /// Jump to `page`. Returns `true` when a request should be issued;
    /// out-of-range targets (0, or past the last known page) are
    /// rejected without touching state. Until totals are known
    /// (`total_pages == 0`) only page 1 is navigable.
    pub fn goto_page(&mut self, page: u32) -> bool {
        if page == 0 || page > self.total_pages.max(1) {
            return false;
        }
        if page == self.page {
            return false;
        }
        self.page = page;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.goto_page(self.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.goto_page(self.page.saturating_sub(1))
    }

    /// Change the page size. Any change resets to page 1. Returns
    /// `true` when a request should be issued.
    pub fn set_page_size(&mut self, size: u32) -> bool {
        if !PAGE_SIZES.contains(&size) || size == self.page_size {
            return false;
        }
        self.page_size = size;
        self.page = 1;
        true
    }

    /// Advance to the next size in [`PAGE_SIZES`], wrapping around.
    pub fn cycle_page_size(&mut self) -> bool {
        let idx = PAGE_SIZES
            .iter()
            .position(|&s| s == self.page_size)
            .unwrap_or(0);
        let next = PAGE_SIZES[(idx + 1) % PAGE_SIZES.len()];
        self.set_page_size(next)
    }

    /// Reset to the first page (site or range changed).
    pub fn reset(&mut self) {
        self.page = 1;
        self.total_pages = 0;
        self.total_records = 0;
    }
}

impl Default for EntriesPager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pager_with_totals(total_pages: u32) -> EntriesPager {
        let mut p = EntriesPager::new();
        p.apply_totals(1, total_pages, u64::from(total_pages) * 25);
        p
    }

    #[test]
    fn starts_on_page_one_size_25() {
        let p = EntriesPager::new();
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), 25);
    }

    #[test]
    fn goto_valid_page_issues_request() {
        let mut p = pager_with_totals(8);
        assert!(p.goto_page(3));
        assert_eq!(p.page(), 3);
    }

    #[test]
    fn goto_page_zero_is_rejected() {
        let mut p = pager_with_totals(8);
        assert!(!p.goto_page(0));
        assert_eq!(p.page(), 1);
    }

    #[test]
    fn goto_past_last_page_is_rejected() {
        let mut p = pager_with_totals(8);
        assert!(!p.goto_page(9));
        assert_eq!(p.page(), 1);
    }

    #[test]
    fn next_before_totals_known_is_rejected() {
        let mut p = EntriesPager::new();
        assert!(!p.next_page());
        assert!(!p.goto_page(2));
        assert_eq!(p.page(), 1);
    }

    #[test]
    fn empty_result_set_pins_to_page_one() {
        let mut p = EntriesPager::new();
        p.apply_totals(1, 0, 0);
        assert!(!p.next_page());
        assert_eq!(p.page(), 1);
    }

    #[test]
    fn goto_current_page_issues_nothing() {
        let mut p = pager_with_totals(8);
        assert!(!p.goto_page(1));
    }

    #[test]
    fn prev_from_first_page_is_rejected() {
        let mut p = pager_with_totals(8);
        assert!(!p.prev_page());
        assert_eq!(p.page(), 1);
    }

    #[test]
    fn next_from_last_page_is_rejected() {
        let mut p = pager_with_totals(3);
        assert!(p.goto_page(3));
        assert!(!p.next_page());
        assert_eq!(p.page(), 3);
    }

    #[test]
    fn size_change_resets_to_page_one() {
        let mut p = pager_with_totals(8);
        assert!(p.goto_page(5));
        assert!(p.set_page_size(50));
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), 50);
    }

    #[test]
    fn same_size_is_a_noop() {
        let mut p = pager_with_totals(8);
        assert!(p.goto_page(5));
        assert!(!p.set_page_size(25));
        assert_eq!(p.page(), 5);
    }

    #[test]
    fn unknown_size_is_rejected() {
        let mut p = pager_with_totals(8);
        assert!(!p.set_page_size(33));
        assert_eq!(p.page_size(), 25);
    }

    #[test]
    fn cycle_wraps_through_all_sizes() {
        let mut p = EntriesPager::new();
        assert_eq!(p.page_size(), 25);
        assert!(p.cycle_page_size());
        assert_eq!(p.page_size(), 50);
        assert!(p.cycle_page_size());
        assert_eq!(p.page_size(), 100);
        assert!(p.cycle_page_size());
        assert_eq!(p.page_size(), 10);
        assert!(p.cycle_page_size());
        assert_eq!(p.page_size(), 25);
    }

    #[test]
    fn shrunk_result_set_clamps_current_page() {
        let mut p = pager_with_totals(8);
        assert!(p.goto_page(8));
        p.apply_totals(8, 4, 100);
        assert_eq!(p.page(), 4);
    }
}
