//! Domain models.
//!
//! These are the validated types handlers and services work with. Database
//! row types live next to their queries in [`crate::db`] and convert into
//! these via `TryFrom`.

pub mod analytics;
pub mod campaign;
pub mod cost;
pub mod customer;
pub mod email_log;
pub mod order;
pub mod product;
pub mod profit;
pub mod settings;
pub mod shipping;
pub mod tracking;
pub mod user;
pub mod webshop;

use serde::{Deserialize, Serialize};

pub use analytics::*;
pub use campaign::*;
pub use cost::*;
pub use customer::*;
pub use email_log::*;
pub use order::*;
pub use product::*;
pub use profit::*;
pub use settings::*;
pub use shipping::*;
pub use tracking::*;
pub use user::*;
pub use webshop::*;

/// Upper bound for `limit` on list endpoints.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page request taken from `?page=&limit=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamp raw query values: page starts at 1, limit is 1..=100.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Pagination block for a response, given the total row count.
    #[must_use]
    pub const fn paginate(&self, total: i64) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            pages: total.saturating_add(self.limit - 1) / self.limit,
        }
    }
}

/// Pagination metadata returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults_and_clamps() {
        let page = PageRequest::new(None, None, 20);
        assert_eq!(page, PageRequest { page: 1, limit: 20 });

        let page = PageRequest::new(Some(0), Some(1000), 20);
        assert_eq!(page, PageRequest { page: 1, limit: MAX_PAGE_SIZE });
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(Some(3), Some(10), 20).offset(), 20);
    }

    #[test]
    fn test_huge_page_saturates() {
        let page = PageRequest::new(Some(i64::MAX), Some(20), 20);
        assert_eq!(page.offset(), i64::MAX);
        assert_eq!(page.paginate(i64::MAX).pages, i64::MAX / 20);
    }

    #[test]
    fn test_pages_round_up() {
        let page = PageRequest::new(Some(1), Some(20), 20);
        assert_eq!(page.paginate(0).pages, 0);
        assert_eq!(page.paginate(20).pages, 1);
        assert_eq!(page.paginate(21).pages, 2);
    }
}
