//! Page cursor for account discovery

use keyring_core::Address;
use serde::Serialize;
use std::ops::Range;

/// One discovered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAccount {
    /// Account address
    pub address: Address,
    /// Balance, filled in by callers that look it up
    pub balance: Option<String>,
    /// Derivation index
    pub index: u32,
}

/// Page cursor. Page numbers start at 1; 0 means no page shown yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    per_page: usize,
}

impl Pagination {
    /// Cursor before the first page
    pub fn new(per_page: usize) -> Self {
        Self {
            page: 0,
            per_page: per_page.max(1),
        }
    }

    /// Current page number
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Accounts per page
    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Forget the position
    pub fn reset(&mut self) {
        self.page = 0;
    }

    /// Move to page 1
    pub fn first(&mut self) -> Range<u32> {
        self.page = 0;
        self.advance(1)
    }

    /// Move forward one page
    pub fn next(&mut self) -> Range<u32> {
        self.advance(1)
    }

    /// Move back one page, never before page 1
    pub fn previous(&mut self) -> Range<u32> {
        self.advance(-1)
    }

    fn advance(&mut self, increment: i64) -> Range<u32> {
        let page = (i64::from(self.page) + increment).max(1);
        self.page = u32::try_from(page).unwrap_or(u32::MAX);

        let per_page = u32::try_from(self.per_page).unwrap_or(u32::MAX);
        let from = (self.page - 1).saturating_mul(per_page);
        from..from.saturating_add(per_page)
    }
}
