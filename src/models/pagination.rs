use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?page=&limit=` query parameters, 1-based pages.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self { page, limit }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Default 20, clamped to 1..=100.
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Saturates instead of overflowing on absurd page numbers.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Paginated list envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, params: PageParams, total: i64) -> Self {
        Self {
            items,
            page: params.page(),
            limit: params.limit(),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, 1, 20, 0)]
    #[case(Some(3), Some(10), 3, 10, 20)]
    #[case(Some(0), Some(500), 1, 100, 0)]
    #[case(Some(-4), Some(0), 1, 1, 0)]
    #[case(Some(i64::MAX), Some(100), i64::MAX, 100, i64::MAX)]
    fn page_params_are_clamped(
        #[case] page: Option<i64>,
        #[case] limit: Option<i64>,
        #[case] expected_page: i64,
        #[case] expected_limit: i64,
        #[case] expected_offset: i64,
    ) {
        let params = PageParams::new(page, limit);
        assert_eq!(params.page(), expected_page);
        assert_eq!(params.limit(), expected_limit);
        assert_eq!(params.offset(), expected_offset);
    }
}
